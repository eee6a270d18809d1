//! Block reader
//!
//! Sequences one block read: fetch the block, enrich every transaction with
//! its receipt and trace, decode the block's Transfer logs, then reconcile
//! each transaction in block order. Any failure aborts the read; there is no
//! partial block.

use crate::cache::AssetCache;
use crate::config::ReaderConfig;
use crate::erc20::{decode_transfer_logs, BlockRef, TransferIndex, TRANSFER_TOPIC};
use crate::error::{ReadStage, ReaderError};
use crate::events::{BlockContent, BlockHeader, BlockOutcome, IrreversibleBlock};
use crate::fee::calculate_effective_gas_price;
use crate::node::{ChainNode, ContractCaller, LogFilter, TraceSource};
use crate::reconcile::{reconcile, TransactionRecord};
use crate::retry::with_retries;
use crate::trace::{decode_trace, TraceOutcome};
use crate::types::{Block, Transaction};
use alloy_primitives::{Bytes, U256};
use futures::{stream, StreamExt, TryStreamExt};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Marker for a receipt the node does not (yet) return.
#[derive(Debug, Error)]
#[error("receipt not available")]
struct ReceiptUnavailable;

/// A transaction after receipt and trace enrichment.
struct Enriched {
    record: TransactionRecord,
    trace: TraceOutcome,
}

pub struct BlockReader<N, T, C> {
    node: Arc<N>,
    tracer: Arc<T>,
    assets: Arc<AssetCache<C>>,
    config: ReaderConfig,
}

impl<N, T, C> BlockReader<N, T, C>
where
    N: ChainNode,
    T: TraceSource,
    C: ContractCaller,
{
    /// Create a reader. The asset cache may be shared with other readers.
    pub fn new(
        node: Arc<N>,
        tracer: Arc<T>,
        assets: Arc<AssetCache<C>>,
        config: ReaderConfig,
    ) -> Self {
        Self {
            node,
            tracer,
            assets,
            config,
        }
    }

    /// Read and reconcile the block at `height`.
    ///
    /// Returns `BlockOutcome::NotFound` when the node has no block there yet.
    pub async fn read_block(&self, height: u64) -> Result<BlockOutcome, ReaderError> {
        debug!(height, stage = %ReadStage::Fetching, "Reading block");
        let raw = match self
            .node
            .block_by_height(height, true)
            .await
            .map_err(|e| ReaderError::rpc(ReadStage::Fetching, e))?
        {
            Some(raw) => raw,
            None => {
                info!(height, "Block not found");
                return Ok(BlockOutcome::NotFound(height));
            }
        };

        let block = &raw.block;
        let transactions = block
            .decode_transactions()
            .map_err(|e| ReaderError::malformed(height, e))?;
        let block_ref = BlockRef {
            hash: block.hash,
            number: block.number,
            timestamp: block.timestamp,
        };

        // Transfer logs do not depend on enrichment, fetch them alongside
        let (enriched, transfers) = futures::try_join!(
            self.enrich_all(block, &transactions),
            self.extract_logs(height, block_ref),
        )?;

        debug!(height, stage = %ReadStage::Reconciling, "Reconciling transactions");
        let mut events = Vec::with_capacity(enriched.len());
        for tx in &enriched {
            let event = reconcile(
                &tx.record,
                tx.trace.messages(),
                transfers.for_transaction(&tx.record.hash),
                &self.assets,
                &self.config.failure,
            )
            .await;
            events.push(event);
        }

        let failed = enriched.iter().filter(|tx| tx.record.errored).count();
        info!(
            height,
            hash = %block.hash,
            transactions = transactions.len(),
            failed,
            token_transfers = transfers.len(),
            "Block read"
        );
        debug!(height, stage = %ReadStage::Done, "Block read complete");

        let header = BlockHeader {
            number: block.number,
            hash: block.hash,
            parent_hash: block.parent_hash,
            timestamp: block.timestamp,
            size: block.size.unwrap_or(raw.bytes.len() as u64),
            transaction_count: transactions.len(),
        };
        let raw_transactions: Vec<Bytes> = transactions.into_iter().map(|(_, raw)| raw).collect();

        Ok(BlockOutcome::Read(BlockContent {
            header,
            raw_transactions,
            events,
            raw_block: raw.bytes.clone(),
        }))
    }

    /// Height and hash of the newest block considered irreversible.
    pub async fn last_irreversible(&self) -> Result<IrreversibleBlock, ReaderError> {
        let head = self
            .node
            .chain_head()
            .await
            .map_err(|e| ReaderError::rpc(ReadStage::Fetching, e))?;
        let height = head.saturating_sub(self.config.confirmation_depth);

        let raw = self
            .node
            .block_by_height(height, false)
            .await
            .map_err(|e| ReaderError::rpc(ReadStage::Fetching, e))?
            .ok_or(ReaderError::IrreversibleBlockMissing(height))?;

        debug!(head, height, hash = %raw.block.hash, "Irreversible block");
        Ok(IrreversibleBlock {
            height,
            block_id: raw.block.hash,
        })
    }

    /// Enrich all transactions with bounded concurrency, back in block order.
    async fn enrich_all(
        &self,
        block: &Block,
        transactions: &[(Transaction, Bytes)],
    ) -> Result<Vec<Enriched>, ReaderError> {
        debug!(
            height = block.number,
            stage = %ReadStage::EnrichingTransactions,
            count = transactions.len(),
            "Enriching transactions"
        );

        let mut enriched: Vec<Enriched> = stream::iter(transactions.iter().enumerate())
            .map(|(index, (tx, _))| self.enrich(block.number, index as u32, tx, block.base_fee_per_gas))
            .buffer_unordered(self.config.enrichment_concurrency.max(1))
            .try_collect()
            .await?;

        enriched.sort_by_key(|tx| tx.record.index);
        Ok(enriched)
    }

    /// Fetch receipt and trace of one transaction concurrently.
    async fn enrich(
        &self,
        height: u64,
        index: u32,
        tx: &Transaction,
        base_fee_per_gas: Option<U256>,
    ) -> Result<Enriched, ReaderError> {
        let attempts = self.config.retry_attempts;
        let hash = tx.hash;

        let receipt = with_retries(attempts, "eth_getTransactionReceipt", || async move {
            self.node
                .transaction_receipt(hash)
                .await?
                .ok_or_else(|| anyhow::Error::new(ReceiptUnavailable))
        });
        let trace = with_retries(attempts, "trace", || self.tracer.trace(hash));

        let (receipt, trace) = futures::try_join!(receipt, trace).map_err(|e| {
            if e.is::<ReceiptUnavailable>() {
                ReaderError::MissingReceipt(hash)
            } else {
                ReaderError::rpc(ReadStage::EnrichingTransactions, e.context(format!("transaction {}", hash)))
            }
        })?;

        let trace = match trace {
            Some(tree) => decode_trace(hash, &tree),
            None => TraceOutcome::Succeeded(Vec::new()),
        };
        let gas_price = calculate_effective_gas_price(tx, &receipt, base_fee_per_gas)
            .map_err(|e| ReaderError::malformed(height, e.context(format!("transaction {}", hash))))?;

        let errored = receipt.is_failure() || trace.has_error();
        if errored {
            debug!(tx = %hash, receipt_failed = receipt.is_failure(), trace_failed = trace.has_error(), "Transaction errored");
        }

        Ok(Enriched {
            record: TransactionRecord {
                hash,
                from: tx.from,
                to: tx.to,
                value: tx.value,
                gas_price,
                gas_used: receipt.gas_used,
                index,
                errored,
            },
            trace,
        })
    }

    /// Fetch and decode the block's Transfer logs.
    async fn extract_logs(&self, height: u64, block: BlockRef) -> Result<TransferIndex, ReaderError> {
        debug!(height, stage = %ReadStage::ExtractingLogs, "Fetching Transfer logs");
        let filter = LogFilter {
            from_height: height,
            to_height: height,
            topics: vec![TRANSFER_TOPIC],
        };
        let logs = with_retries(self.config.retry_attempts, "eth_getLogs", || {
            self.node.logs(&filter)
        })
        .await
        .map_err(|e| ReaderError::rpc(ReadStage::ExtractingLogs, e))?;

        Ok(decode_transfer_logs(block, &logs))
    }
}
