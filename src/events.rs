//! Produced domain events
//!
//! These structs are the output of a block read: one terminal event per
//! transaction plus the block header and raw payloads. They serialize to
//! JSON for downstream publishing.

use crate::asset::Asset;
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Serialize, Serializer};
use std::fmt;

/// Signed amount of an asset in its decimal scale.
///
/// `amount` is the raw integer (wei, token base units); the decimal point sits
/// `scale` digits from the right. Zero is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Money {
    pub amount: U256,
    pub scale: u8,
    pub negative: bool,
}

impl Money {
    /// Non-negative amount.
    pub fn new(amount: U256, scale: u8) -> Self {
        Self {
            amount,
            scale,
            negative: false,
        }
    }

    pub fn credit(amount: U256, scale: u8) -> Self {
        Self::new(amount, scale)
    }

    pub fn debit(amount: U256, scale: u8) -> Self {
        Self {
            amount,
            scale,
            negative: !amount.is_zero(),
        }
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.amount.to_string();
        let scale = self.scale as usize;
        let sign = if self.negative { "-" } else { "" };

        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        if digits.len() > scale {
            let (int, frac) = digits.split_at(digits.len() - scale);
            write!(f, "{sign}{int}.{frac}")
        } else {
            write!(f, "{sign}0.{digits:0>scale$}")
        }
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One leg of a value movement inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceChange {
    /// `<txhash>:<source>:<leg>`, unique within the transaction
    pub id: String,
    pub asset: Asset,
    pub amount: Money,
    pub address: Address,
}

/// Fee paid by the transaction sender, outside the zero-sum legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fee {
    pub asset: Asset,
    pub amount: Money,
}

/// Classification attached to failed transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionErrorKind {
    #[default]
    Unknown,
    Reverted,
    OutOfGas,
    InvalidTransaction,
}

impl fmt::Display for TransactionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionErrorKind::Unknown => "unknown",
            TransactionErrorKind::Reverted => "reverted",
            TransactionErrorKind::OutOfGas => "out_of_gas",
            TransactionErrorKind::InvalidTransaction => "invalid_transaction",
        };
        f.write_str(name)
    }
}

/// A transaction that executed: ordered balance changes plus its fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferEvent {
    pub transaction_index: u32,
    pub transaction_id: B256,
    pub balance_changes: Vec<BalanceChange>,
    pub fees: Vec<Fee>,
}

/// A transaction whose execution failed: only the fee is charged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEvent {
    pub transaction_index: u32,
    pub transaction_id: B256,
    pub error_kind: TransactionErrorKind,
    pub error_message: String,
    pub fees: Vec<Fee>,
}

/// Terminal result for one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransactionEvent {
    Executed(TransferEvent),
    Failed(FailedEvent),
}

impl TransactionEvent {
    pub fn transaction_index(&self) -> u32 {
        match self {
            TransactionEvent::Executed(e) => e.transaction_index,
            TransactionEvent::Failed(e) => e.transaction_index,
        }
    }

    pub fn transaction_id(&self) -> B256 {
        match self {
            TransactionEvent::Executed(e) => e.transaction_id,
            TransactionEvent::Failed(e) => e.transaction_id,
        }
    }

    pub fn fees(&self) -> &[Fee] {
        match self {
            TransactionEvent::Executed(e) => &e.fees,
            TransactionEvent::Failed(e) => &e.fees,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    pub timestamp: u64,
    /// Byte size of the raw block payload when the node did not report one
    pub size: u64,
    pub transaction_count: usize,
}

/// Everything produced for one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockContent {
    pub header: BlockHeader,
    /// Transaction payloads exactly as received, in block order
    pub raw_transactions: Vec<Bytes>,
    /// One event per transaction, in block order
    pub events: Vec<TransactionEvent>,
    /// Block payload exactly as received
    pub raw_block: Bytes,
}

/// Result of reading one height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "block", rename_all = "snake_case")]
pub enum BlockOutcome {
    NotFound(u64),
    Read(BlockContent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IrreversibleBlock {
    pub height: u64,
    pub block_id: B256,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_display() {
        assert_eq!(Money::credit(U256::from(100u64), 6).to_string(), "0.000100");
        assert_eq!(Money::debit(U256::from(100u64), 6).to_string(), "-0.000100");
        assert_eq!(
            Money::credit(U256::from(1_500_000u64), 6).to_string(),
            "1.500000"
        );
        assert_eq!(Money::debit(U256::from(42u64), 0).to_string(), "-42");
        assert_eq!(
            Money::credit(U256::from(42000u64), 18).to_string(),
            "0.000000000000042000"
        );
    }

    #[test]
    fn test_zero_debit_is_not_negative() {
        let zero = Money::debit(U256::ZERO, 18);
        assert!(!zero.is_negative());
        assert_eq!(zero, Money::credit(U256::ZERO, 18));
    }

    #[test]
    fn test_money_serializes_as_decimal_string() {
        let json = serde_json::to_string(&Money::debit(U256::from(5u64), 2)).unwrap();
        assert_eq!(json, "\"-0.05\"");
    }

    #[test]
    fn test_transaction_event_accessors() {
        let event = TransactionEvent::Failed(FailedEvent {
            transaction_index: 3,
            transaction_id: B256::with_last_byte(9),
            error_kind: TransactionErrorKind::Unknown,
            error_message: "transaction failed".to_string(),
            fees: vec![],
        });
        assert_eq!(event.transaction_index(), 3);
        assert_eq!(event.transaction_id(), B256::with_last_byte(9));
        assert!(event.fees().is_empty());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error_kind"], "unknown");
    }
}
