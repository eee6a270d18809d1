//! Call trace decoding into internal messages
//!
//! Both trace vendors are first normalized into a flat, pre-ordered list of
//! [`TraceEntry`] values. Everything after that point is vendor-agnostic:
//!
//! - The first entry is the transaction's own outer call and is skipped.
//! - An error on any entry marks the whole trace as failed; internal
//!   transfers of a failed execution are not reported.
//! - Self-destruct entries are dropped, and so are zero-value entries that
//!   did not create a contract.
//! - Survivors get a dense, zero-based message index in traversal order.

use crate::types::{CallTrace, ParityTrace, TraceTree};
use alloy_primitives::{Address, B256, U256};
use serde::Serialize;

/// Protocol-level kind of a trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Call,
    Create,
    Suicide,
    Other,
}

/// One vendor-independent trace entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    /// Lower-case call flavour (`call`, `delegatecall`, ...); None for creates
    pub call_type: Option<String>,
    pub kind: EntryKind,
    /// Non-empty when this frame failed
    pub error: Option<String>,
    /// Address of the contract created by this frame, if any
    pub result_address: Option<Address>,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub value: U256,
    pub depth: u32,
}

impl TraceEntry {
    fn failed(&self) -> bool {
        self.error.as_deref().map_or(false, |e| !e.is_empty())
    }
}

/// Classification of an internal message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain value transfer via `call` / `delegatecall`
    Transfer,
    /// Contract creation
    Creation,
    /// Any other internal call carrying value
    Transaction,
}

/// Value movement made by a transaction's execution below the top-level call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InternalMessage {
    pub transaction_hash: B256,
    pub depth: u32,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    /// Dense, zero-based position among the transaction's decoded messages
    pub index: u32,
    pub kind: MessageKind,
}

/// Decoded result of one transaction trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceOutcome {
    /// Some frame failed; internal transfers are unreliable and omitted.
    Failed,
    Succeeded(Vec<InternalMessage>),
}

impl TraceOutcome {
    pub fn has_error(&self) -> bool {
        matches!(self, TraceOutcome::Failed)
    }

    /// Internal messages; empty for a failed trace.
    pub fn messages(&self) -> &[InternalMessage] {
        match self {
            TraceOutcome::Failed => &[],
            TraceOutcome::Succeeded(messages) => messages,
        }
    }
}

enum Class {
    Message(MessageKind),
    SelfDestruct,
}

/// Decode a raw trace tree into internal messages.
pub fn decode_trace(transaction_hash: B256, tree: &TraceTree) -> TraceOutcome {
    decode_entries(transaction_hash, &flatten(tree))
}

/// Normalize either vendor format into a flat, pre-ordered entry list.
pub fn flatten(tree: &TraceTree) -> Vec<TraceEntry> {
    match tree {
        TraceTree::Parity(traces) => traces.iter().map(parity_entry).collect(),
        TraceTree::Geth(root) => {
            let mut out = Vec::new();
            walk_geth(root, 0, &mut out);
            out
        }
    }
}

fn parity_entry(trace: &ParityTrace) -> TraceEntry {
    let kind = match trace.r#type.as_str() {
        "call" => EntryKind::Call,
        "create" => EntryKind::Create,
        "suicide" => EntryKind::Suicide,
        _ => EntryKind::Other,
    };
    TraceEntry {
        call_type: trace.action.call_type.as_ref().map(|t| t.to_ascii_lowercase()),
        kind,
        error: trace.error.clone(),
        result_address: trace.result.as_ref().and_then(|r| r.address),
        from: trace.action.from,
        to: trace.action.to,
        value: trace.action.value,
        depth: trace.trace_address.len() as u32,
    }
}

fn walk_geth(node: &CallTrace, depth: u32, out: &mut Vec<TraceEntry>) {
    let node_type = node.r#type.as_deref().unwrap_or("").to_ascii_lowercase();
    let entry = match node_type.as_str() {
        // callTracer reports the created contract in `to`
        "create" | "create2" => TraceEntry {
            call_type: None,
            kind: EntryKind::Create,
            error: node.error.clone(),
            result_address: node.to,
            from: node.from,
            to: None,
            value: node.value,
            depth,
        },
        "selfdestruct" | "suicide" => TraceEntry {
            call_type: None,
            kind: EntryKind::Suicide,
            error: node.error.clone(),
            result_address: None,
            from: node.from,
            to: node.to,
            value: node.value,
            depth,
        },
        "" => TraceEntry {
            call_type: None,
            kind: EntryKind::Other,
            error: node.error.clone(),
            result_address: None,
            from: node.from,
            to: node.to,
            value: node.value,
            depth,
        },
        _ => TraceEntry {
            call_type: Some(node_type.clone()),
            kind: EntryKind::Call,
            error: node.error.clone(),
            result_address: None,
            from: node.from,
            to: node.to,
            value: node.value,
            depth,
        },
    };
    out.push(entry);

    if let Some(children) = &node.calls {
        for child in children {
            walk_geth(child, depth + 1, out);
        }
    }
}

fn classify(entry: &TraceEntry) -> Class {
    match entry.call_type.as_deref() {
        Some("call") | Some("delegatecall") => return Class::Message(MessageKind::Transfer),
        Some("suicide") => return Class::SelfDestruct,
        _ => {}
    }
    match entry.kind {
        EntryKind::Suicide => Class::SelfDestruct,
        EntryKind::Create if entry.result_address.is_some() => {
            Class::Message(MessageKind::Creation)
        }
        _ => Class::Message(MessageKind::Transaction),
    }
}

/// Decode an already-flattened entry list.
pub fn decode_entries(transaction_hash: B256, entries: &[TraceEntry]) -> TraceOutcome {
    if entries.iter().any(TraceEntry::failed) {
        return TraceOutcome::Failed;
    }

    let mut messages = Vec::new();
    for entry in entries.iter().skip(1) {
        let kind = match classify(entry) {
            Class::SelfDestruct => continue,
            Class::Message(kind) => kind,
        };
        if entry.value.is_zero() && kind != MessageKind::Creation {
            continue;
        }

        let to = match kind {
            MessageKind::Creation => entry.to.or(entry.result_address),
            _ => entry.to,
        };
        let (Some(from), Some(to)) = (entry.from, to) else {
            tracing::debug!(
                tx = %transaction_hash,
                depth = entry.depth,
                "Skipping trace entry without both endpoints"
            );
            continue;
        };

        messages.push(InternalMessage {
            transaction_hash,
            depth: entry.depth,
            from,
            to,
            value: entry.value,
            index: messages.len() as u32,
            kind,
        });
    }

    TraceOutcome::Succeeded(messages)
}
