//! Errors surfaced by a block read.
//!
//! Anything here aborts the whole read; callers retry the block later.

use alloy_primitives::B256;
use std::fmt;
use thiserror::Error;

/// Stage of a block read, used to tag failures and stage transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStage {
    Fetching,
    EnrichingTransactions,
    ExtractingLogs,
    Reconciling,
    Done,
}

impl fmt::Display for ReadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadStage::Fetching => "fetching",
            ReadStage::EnrichingTransactions => "enriching transactions",
            ReadStage::ExtractingLogs => "extracting logs",
            ReadStage::Reconciling => "reconciling",
            ReadStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ReaderError {
    /// A node call failed, after retries where the call site retries
    #[error("rpc failure while {stage}: {message}")]
    Rpc { stage: ReadStage, message: String },

    #[error("receipt for transaction {0} not available")]
    MissingReceipt(B256),

    #[error("malformed data in block {height}: {message}")]
    Malformed { height: u64, message: String },

    #[error("irreversible block {0} not found")]
    IrreversibleBlockMissing(u64),
}

impl ReaderError {
    pub(crate) fn rpc(stage: ReadStage, err: anyhow::Error) -> Self {
        ReaderError::Rpc {
            stage,
            message: format!("{:#}", err),
        }
    }

    pub(crate) fn malformed(height: u64, err: anyhow::Error) -> Self {
        ReaderError::Malformed {
            height,
            message: format!("{:#}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ReaderError::rpc(
            ReadStage::EnrichingTransactions,
            anyhow::anyhow!("connection refused").context("trace fetch"),
        );
        assert_eq!(
            err.to_string(),
            "rpc failure while enriching transactions: trace fetch: connection refused"
        );

        let err = ReaderError::IrreversibleBlockMissing(970);
        assert_eq!(err.to_string(), "irreversible block 970 not found");
    }
}
