//! ERC20 Transfer log decoding
//!
//! Decodes `Transfer(address indexed from, address indexed to, uint256 value)`
//! logs fetched for a single block and indexes them by transaction hash.
//! Only the three-topic shape is supported; anything else is dropped.

use crate::types::{decode_hex, Log};
use alloy_primitives::{Address, B256, U256};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_TOPIC: B256 = B256::new([
    0xdd, 0xf2, 0x52, 0xad, 0x1b, 0xe2, 0xc8, 0x9b, 0x69, 0xc2, 0xb0, 0x68, 0xfc, 0x37, 0x8d,
    0xaa, 0x95, 0x2b, 0xa7, 0xf1, 0x63, 0xc4, 0xa1, 0x16, 0x28, 0xf5, 0x5a, 0x4d, 0xf5, 0x23,
    0xb3, 0xef,
]);

/// One decoded token transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenTransfer {
    pub block_hash: B256,
    pub block_number: u64,
    pub block_timestamp: u64,
    /// Token contract that emitted the log
    pub contract: Address,
    pub from: Address,
    pub to: Address,
    /// Unique within the block
    pub log_index: u64,
    pub transaction_hash: B256,
    pub transaction_index: u64,
    /// Raw amount, not scaled by the token's decimals
    pub amount: U256,
}

/// Block context stamped onto every decoded transfer.
#[derive(Debug, Clone, Copy)]
pub struct BlockRef {
    pub hash: B256,
    pub number: u64,
    pub timestamp: u64,
}

/// Decoded transfers of one block, grouped per transaction.
#[derive(Debug, Default, Clone)]
pub struct TransferIndex {
    by_transaction: HashMap<B256, Vec<TokenTransfer>>,
}

impl TransferIndex {
    /// Transfers of one transaction in ascending log-index order.
    pub fn for_transaction(&self, tx_hash: &B256) -> &[TokenTransfer] {
        self.by_transaction
            .get(tx_hash)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_transaction.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_transaction.is_empty()
    }
}

/// Decode all supported Transfer logs of a block.
pub fn decode_transfer_logs(block: BlockRef, logs: &[Log]) -> TransferIndex {
    let mut by_transaction: HashMap<B256, Vec<TokenTransfer>> = HashMap::new();

    for log in logs {
        if log.removed {
            continue;
        }
        if log.topics.len() != 3 {
            debug!(
                contract = %log.address,
                topics = log.topics.len(),
                "Skipping Transfer log with unsupported topic count"
            );
            continue;
        }
        match parse_transfer_log(block, log) {
            Ok(Some(transfer)) => by_transaction
                .entry(transfer.transaction_hash)
                .or_default()
                .push(transfer),
            Ok(None) => {}
            Err(e) => debug!("Skipping malformed Transfer log: {:#}", e),
        }
    }

    for transfers in by_transaction.values_mut() {
        transfers.sort_by_key(|t| t.log_index);
    }

    TransferIndex { by_transaction }
}

/// Parse one three-topic log. `Ok(None)` for logs of another event.
fn parse_transfer_log(block: BlockRef, log: &Log) -> Result<Option<TokenTransfer>> {
    let signature = parse_topic(&log.topics[0])?;
    if signature != TRANSFER_TOPIC {
        return Ok(None);
    }
    let from = parse_address_from_topic(&log.topics[1])?;
    let to = parse_address_from_topic(&log.topics[2])?;
    let amount = U256::try_from_be_slice(&log.data)
        .context("Transfer amount does not fit in 256 bits")?;

    let transaction_hash = log.transaction_hash.context("Log missing transactionHash")?;
    let log_index = log.log_index.context("Log missing logIndex")?;

    Ok(Some(TokenTransfer {
        block_hash: log.block_hash.unwrap_or(block.hash),
        block_number: log.block_number.unwrap_or(block.number),
        block_timestamp: block.timestamp,
        contract: log.address,
        from,
        to,
        log_index,
        transaction_hash,
        transaction_index: log.transaction_index.unwrap_or_default(),
        amount,
    }))
}

fn parse_topic(topic: &str) -> Result<B256> {
    let bytes = decode_hex(topic).context("Invalid hex in topic")?;
    if bytes.len() != 32 {
        anyhow::bail!("Topic must be 32 bytes, got {}", bytes.len());
    }
    Ok(B256::from_slice(&bytes))
}

/// Parse a 32-byte hex topic into an Address (last 20 bytes).
fn parse_address_from_topic(topic: &str) -> Result<Address> {
    let word = parse_topic(topic)?;
    Ok(Address::from_slice(&word[12..]))
}
