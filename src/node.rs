//! Collaborator interfaces
//!
//! The block reader only talks to the chain through these traits. `RpcClient`
//! implements all of them against a live node; tests use in-memory mocks.

use crate::types::{Log, RawBlock, Receipt, TraceTree};
use alloy_primitives::{Address, Bytes, B256};
use anyhow::Result;
use async_trait::async_trait;

/// Server-side filter for `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub from_height: u64,
    pub to_height: u64,
    /// Topic0 alternatives
    pub topics: Vec<B256>,
}

/// Block, receipt and log queries against a node.
#[async_trait]
pub trait ChainNode: Send + Sync {
    /// Height of the current chain head.
    async fn chain_head(&self) -> Result<u64>;

    /// Fetch a block by height. `Ok(None)` when the node has no such block yet.
    async fn block_by_height(&self, height: u64, full_transactions: bool)
        -> Result<Option<RawBlock>>;

    /// Fetch a receipt. `Ok(None)` when the node does not know the transaction.
    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>>;

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>>;
}

/// Call-trace endpoint.
#[async_trait]
pub trait TraceSource: Send + Sync {
    /// Trace one transaction. `Ok(None)` means the node has no trace for it.
    async fn trace(&self, tx_hash: B256) -> Result<Option<TraceTree>>;
}

/// Read-only contract calls for argument-less view functions.
#[async_trait]
pub trait ContractCaller: Send + Sync {
    /// Call `function()` on `contract` and return the ABI-encoded output.
    async fn call(&self, contract: Address, function: &str) -> Result<Bytes>;
}
