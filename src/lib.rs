//! ethreader - Ethereum block ingestion core
//!
//! Reads a block from a node, enriches its transactions with receipts and
//! call traces, decodes ERC20 Transfer logs, and reconciles everything into
//! one ordered list of balance changes per transaction.

pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod node;
pub mod reader;
pub mod reconcile;
pub mod retry;
pub mod rpc;
pub mod types;

// Decoders and metadata
pub mod asset;
pub mod cache;
pub mod erc20;
pub mod fee;
pub mod trace;

// Re-export the main types for convenience
pub use config::{ReaderConfig, TraceFlavor};
pub use error::{ReadStage, ReaderError};
pub use events::{
    BalanceChange, BlockContent, BlockHeader, BlockOutcome, FailedEvent, Fee, IrreversibleBlock,
    Money, TransactionErrorKind, TransactionEvent, TransferEvent,
};
pub use node::{ChainNode, ContractCaller, TraceSource};
pub use reader::BlockReader;
