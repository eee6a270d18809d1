//! Balance-change reconciliation
//!
//! Merges the three value sources of one transaction (native value, internal
//! messages from the trace, token Transfer logs) into an ordered list of
//! debit/credit legs, and classifies the transaction as executed or failed.
//!
//! Emission order is fixed: native value, then internal messages by index,
//! then token transfers by log index. Each source yields one debit and one
//! credit of the same amount, so every asset nets to zero. The gas fee is
//! reported separately.

use crate::asset::{AssetInfo, NATIVE_SCALE};
use crate::cache::AssetCache;
use crate::erc20::TokenTransfer;
use crate::events::{
    BalanceChange, FailedEvent, Fee, Money, TransactionErrorKind, TransactionEvent, TransferEvent,
};
use crate::fee::calculate_fee;
use crate::node::ContractCaller;
use crate::trace::InternalMessage;
use alloy_primitives::{Address, B256, U256};
use serde::Deserialize;
use std::fmt::Display;
use tracing::debug;

/// Transaction fields needed for reconciliation, after receipt enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub hash: B256,
    pub from: Address,
    /// None for contract creation
    pub to: Option<Address>,
    pub value: U256,
    /// Effective gas price
    pub gas_price: U256,
    pub gas_used: U256,
    pub index: u32,
    /// Receipt status failed or the trace carried an error
    pub errored: bool,
}

/// Classification attached to every failed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FailurePolicy {
    pub kind: TransactionErrorKind,
    pub message: String,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            kind: TransactionErrorKind::Unknown,
            message: "transaction failed".to_string(),
        }
    }
}

/// Reconcile one transaction into its terminal event.
///
/// Token metadata comes from `assets` and may suspend on a cache miss.
pub async fn reconcile<C: ContractCaller>(
    record: &TransactionRecord,
    messages: &[InternalMessage],
    transfers: &[TokenTransfer],
    assets: &AssetCache<C>,
    policy: &FailurePolicy,
) -> TransactionEvent {
    let native = AssetInfo::native();
    let fees = vec![Fee {
        asset: native.asset.clone(),
        amount: Money::new(calculate_fee(record.gas_used, record.gas_price), NATIVE_SCALE),
    }];

    if record.errored {
        debug!(tx = %record.hash, index = record.index, "Transaction failed, fee only");
        return TransactionEvent::Failed(FailedEvent {
            transaction_index: record.index,
            transaction_id: record.hash,
            error_kind: policy.kind,
            error_message: policy.message.clone(),
            fees,
        });
    }

    let mut ledger = Ledger::new(record.hash);

    if let Some(to) = record.to {
        ledger.transfer("value", &native, record.from, to, record.value);
    }

    for message in messages {
        ledger.transfer(message.index, &native, message.from, message.to, message.value);
    }

    for transfer in transfers {
        let info = assets.get(transfer.contract).await;
        ledger.transfer(
            format_args!("log:{}", transfer.log_index),
            &info,
            transfer.from,
            transfer.to,
            transfer.amount,
        );
    }

    TransactionEvent::Executed(TransferEvent {
        transaction_index: record.index,
        transaction_id: record.hash,
        balance_changes: ledger.changes,
        fees,
    })
}

/// Ordered debit/credit legs of one transaction.
struct Ledger {
    transaction: B256,
    changes: Vec<BalanceChange>,
}

impl Ledger {
    fn new(transaction: B256) -> Self {
        Self {
            transaction,
            changes: Vec::new(),
        }
    }

    /// Debit `from` and credit `to` by `amount`, both tagged with `source`.
    fn transfer(
        &mut self,
        source: impl Display,
        info: &AssetInfo,
        from: Address,
        to: Address,
        amount: U256,
    ) {
        let prefix = format!("0x{:x}:{}", self.transaction, source);
        self.changes.push(BalanceChange {
            id: format!("{}:debit", prefix),
            asset: info.asset.clone(),
            amount: Money::debit(amount, info.scale),
            address: from,
        });
        self.changes.push(BalanceChange {
            id: format!("{}:credit", prefix),
            asset: info.asset.clone(),
            amount: Money::credit(amount, info.scale),
            address: to,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::tests::{abi_string, abi_uint};
    use crate::asset::Asset;
    use crate::node::mock::MockCaller;
    use crate::trace::MessageKind;
    use alloy_primitives::address;
    use proptest::prelude::*;
    use std::collections::{HashMap, HashSet};
    use std::num::NonZeroUsize;
    use std::sync::Arc;

    fn sender() -> Address {
        address!("0000000000000000000000000000000000000001")
    }
    fn recipient() -> Address {
        address!("0000000000000000000000000000000000000002")
    }
    fn token() -> Address {
        address!("00000000000000000000000000000000000000cc")
    }
    fn tx_hash() -> B256 {
        B256::with_last_byte(0xaa)
    }

    fn record(errored: bool) -> TransactionRecord {
        TransactionRecord {
            hash: tx_hash(),
            from: sender(),
            to: Some(recipient()),
            value: U256::from(100u64),
            gas_price: U256::from(2u64),
            gas_used: U256::from(21000u64),
            index: 0,
            errored,
        }
    }

    fn cache(caller: MockCaller) -> AssetCache<MockCaller> {
        AssetCache::new(Arc::new(caller), NonZeroUsize::new(16).unwrap())
    }

    fn tkn_cache() -> AssetCache<MockCaller> {
        cache(
            MockCaller::default()
                .with_output(token(), "symbol", abi_string("TKN"))
                .with_output(token(), "decimals", abi_uint(6)),
        )
    }

    fn message(index: u32, from: Address, to: Address, value: u64) -> InternalMessage {
        InternalMessage {
            transaction_hash: tx_hash(),
            depth: 1,
            from,
            to,
            value: U256::from(value),
            index,
            kind: MessageKind::Transfer,
        }
    }

    fn token_transfer(log_index: u64, from: Address, to: Address, amount: u64) -> TokenTransfer {
        TokenTransfer {
            block_hash: B256::ZERO,
            block_number: 1000,
            block_timestamp: 0,
            contract: token(),
            from,
            to,
            log_index,
            transaction_hash: tx_hash(),
            transaction_index: 0,
            amount: U256::from(amount),
        }
    }

    fn executed(event: TransactionEvent) -> TransferEvent {
        match event {
            TransactionEvent::Executed(e) => e,
            TransactionEvent::Failed(e) => panic!("expected executed event, got {:?}", e),
        }
    }

    /// Assert every asset's debits equal its credits and ids are unique.
    fn assert_balanced(event: &TransferEvent) {
        let mut net: HashMap<Asset, (U256, U256)> = HashMap::new();
        for change in &event.balance_changes {
            let entry = net.entry(change.asset.clone()).or_default();
            if change.amount.is_negative() {
                entry.0 += change.amount.amount;
            } else {
                entry.1 += change.amount.amount;
            }
        }
        for (asset, (debits, credits)) in net {
            assert_eq!(debits, credits, "asset {} does not net to zero", asset.id);
        }

        let ids: HashSet<_> = event.balance_changes.iter().map(|c| &c.id).collect();
        assert_eq!(ids.len(), event.balance_changes.len(), "duplicate balance change id");
    }

    #[tokio::test]
    async fn test_native_transfer() {
        let assets = cache(MockCaller::default());
        let event = reconcile(&record(false), &[], &[], &assets, &FailurePolicy::default()).await;
        let event = executed(event);

        assert_eq!(event.transaction_id, tx_hash());
        assert_eq!(event.balance_changes.len(), 2);

        let debit = &event.balance_changes[0];
        assert_eq!(debit.address, sender());
        assert_eq!(debit.amount, Money::debit(U256::from(100u64), 18));
        assert_eq!(debit.asset, Asset::native());

        let credit = &event.balance_changes[1];
        assert_eq!(credit.address, recipient());
        assert_eq!(credit.amount, Money::credit(U256::from(100u64), 18));

        assert_eq!(event.fees.len(), 1);
        assert_eq!(event.fees[0].asset, Asset::native());
        assert_eq!(event.fees[0].amount, Money::new(U256::from(42000u64), 18));
        assert_balanced(&event);
    }

    #[tokio::test]
    async fn test_errored_transaction_is_fee_only() {
        let assets = tkn_cache();
        let transfers = [token_transfer(0, sender(), recipient(), 100)];
        let messages = [message(0, recipient(), sender(), 5)];
        let event = reconcile(
            &record(true),
            &messages,
            &transfers,
            &assets,
            &FailurePolicy::default(),
        )
        .await;

        match event {
            TransactionEvent::Failed(failed) => {
                assert_eq!(failed.error_kind, TransactionErrorKind::Unknown);
                assert_eq!(failed.error_message, "transaction failed");
                assert_eq!(failed.fees[0].amount, Money::new(U256::from(42000u64), 18));
            }
            other => panic!("expected failed event, got {:?}", other),
        }
        // no metadata lookups for a failed transaction
        assert!(assets.is_empty());
    }

    #[tokio::test]
    async fn test_failure_policy_is_applied() {
        let assets = cache(MockCaller::default());
        let policy = FailurePolicy {
            kind: TransactionErrorKind::Reverted,
            message: "execution reverted".to_string(),
        };
        let event = reconcile(&record(true), &[], &[], &assets, &policy).await;
        let TransactionEvent::Failed(failed) = event else {
            panic!("expected failed event");
        };
        assert_eq!(failed.error_kind, TransactionErrorKind::Reverted);
        assert_eq!(failed.error_message, "execution reverted");
    }

    #[tokio::test]
    async fn test_token_transfer_is_scaled() {
        let assets = tkn_cache();
        let mut tx = record(false);
        tx.value = U256::ZERO;
        tx.to = Some(token());
        let transfers = [token_transfer(4, sender(), recipient(), 100)];

        let event = executed(
            reconcile(&tx, &[], &transfers, &assets, &FailurePolicy::default()).await,
        );

        // zero-value native legs, then the token pair
        assert_eq!(event.balance_changes.len(), 4);
        let debit = &event.balance_changes[2];
        let credit = &event.balance_changes[3];
        assert_eq!(debit.asset.id, "TKN");
        assert_eq!(debit.asset.address, Some(token()));
        assert_eq!(debit.address, sender());
        assert_eq!(debit.amount.to_string(), "-0.000100");
        assert_eq!(credit.address, recipient());
        assert_eq!(credit.amount.to_string(), "0.000100");
        assert!(debit.id.ends_with(":log:4:debit"));
        assert_balanced(&event);
    }

    #[tokio::test]
    async fn test_contract_creation_has_no_value_legs() {
        let assets = cache(MockCaller::default());
        let mut tx = record(false);
        tx.to = None;
        let event = executed(
            reconcile(&tx, &[], &[], &assets, &FailurePolicy::default()).await,
        );
        assert!(event.balance_changes.is_empty());
        assert_eq!(event.fees.len(), 1);
    }

    #[tokio::test]
    async fn test_emission_order() {
        let assets = tkn_cache();
        let third = address!("0000000000000000000000000000000000000003");
        let messages = [
            message(0, recipient(), third, 40),
            message(1, third, sender(), 10),
        ];
        let transfers = [
            token_transfer(2, sender(), third, 7),
            token_transfer(9, third, recipient(), 7),
        ];
        let event = executed(
            reconcile(
                &record(false),
                &messages,
                &transfers,
                &assets,
                &FailurePolicy::default(),
            )
            .await,
        );

        let prefix = format!("0x{:x}", tx_hash());
        let ids: Vec<_> = event
            .balance_changes
            .iter()
            .map(|c| c.id.strip_prefix(&prefix).unwrap().to_string())
            .collect();
        assert_eq!(
            ids,
            vec![
                ":value:debit",
                ":value:credit",
                ":0:debit",
                ":0:credit",
                ":1:debit",
                ":1:credit",
                ":log:2:debit",
                ":log:2:credit",
                ":log:9:debit",
                ":log:9:credit",
            ]
        );
        assert_balanced(&event);
    }

    fn party() -> impl Strategy<Value = Address> {
        (1..=4u8).prop_map(Address::with_last_byte)
    }

    proptest! {
        #[test]
        fn test_arbitrary_inputs_balance_with_unique_ids(
            value in any::<u64>(),
            message_legs in prop::collection::vec((party(), party(), 1..1_000u64), 0..6),
            transfer_legs in prop::collection::vec((1..4u64, party(), party(), any::<u64>()), 0..6),
        ) {
            let messages: Vec<_> = message_legs
                .iter()
                .enumerate()
                .map(|(i, (from, to, value))| message(i as u32, *from, *to, *value))
                .collect();

            let mut log_index = 0;
            let transfers: Vec<_> = transfer_legs
                .iter()
                .map(|(gap, from, to, amount)| {
                    log_index += gap;
                    token_transfer(log_index, *from, *to, *amount)
                })
                .collect();

            let mut tx = record(false);
            tx.value = U256::from(value);

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let assets = tkn_cache();
            let event = executed(runtime.block_on(reconcile(
                &tx,
                &messages,
                &transfers,
                &assets,
                &FailurePolicy::default(),
            )));

            prop_assert_eq!(
                event.balance_changes.len(),
                2 * (1 + messages.len() + transfers.len())
            );
            assert_balanced(&event);
        }
    }
}
