//! Transaction fee in wei

use crate::types::{Receipt, Transaction};
use alloy_primitives::U256;
use anyhow::{Context, Result};

/// Price paid per unit of gas.
///
/// The receipt's `effectiveGasPrice` wins when present. Otherwise a
/// dynamic-fee transaction pays `min(maxFeePerGas, baseFee + tip)` and a
/// legacy one pays its `gasPrice`.
pub fn calculate_effective_gas_price(
    tx: &Transaction,
    receipt: &Receipt,
    base_fee_per_gas: Option<U256>,
) -> Result<U256> {
    if let Some(price) = receipt.effective_gas_price {
        return Ok(price);
    }

    match (tx.max_fee_per_gas, tx.gas_price) {
        (Some(max_fee), _) => {
            let base_fee = base_fee_per_gas
                .context("Dynamic-fee transaction in a block without baseFeePerGas")?;
            let tip = tx.max_priority_fee_per_gas.unwrap_or_default();
            Ok(base_fee.saturating_add(tip).min(max_fee))
        }
        (None, Some(price)) => Ok(price),
        (None, None) => anyhow::bail!("Transaction {:x} carries no gas price", tx.hash),
    }
}

/// `gas_used * price`, saturating.
pub fn calculate_fee(gas_used: U256, effective_gas_price: U256) -> U256 {
    gas_used.saturating_mul(effective_gas_price)
}
