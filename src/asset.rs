//! Asset identity and on-chain metadata resolution
//!
//! Token identity is the contract's `symbol()` when it answers with something
//! readable, otherwise the contract address. Scale is `decimals()`, or 0.
//! Resolution never fails; failed calls degrade to those fallbacks.

use crate::node::ContractCaller;
use alloy_primitives::{Address, U256};
use serde::Serialize;
use tracing::debug;

/// Identity of the chain's native currency.
pub const NATIVE_ASSET_ID: &str = "ETH";

/// Decimal scale of the native currency (wei).
pub const NATIVE_SCALE: u8 = 18;

/// An asset as reported downstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Asset {
    /// Symbol, or the contract address when no symbol could be read
    pub id: String,
    /// Token contract; None for the native currency
    pub address: Option<Address>,
}

impl Asset {
    pub fn native() -> Self {
        Self {
            id: NATIVE_ASSET_ID.to_string(),
            address: None,
        }
    }
}

/// Resolved asset plus its decimal scale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AssetInfo {
    pub asset: Asset,
    pub scale: u8,
}

impl AssetInfo {
    pub fn native() -> Self {
        Self {
            asset: Asset::native(),
            scale: NATIVE_SCALE,
        }
    }
}

/// Resolve identity and scale of a token contract.
pub async fn resolve_asset_info<C>(caller: &C, contract: Address) -> AssetInfo
where
    C: ContractCaller + ?Sized,
{
    let symbol = match caller.call(contract, "symbol").await {
        Ok(output) => decode_symbol(&output),
        Err(e) => {
            debug!(%contract, "symbol() failed: {:#}", e);
            None
        }
    };
    let decimals = match caller.call(contract, "decimals").await {
        Ok(output) => decode_decimals(&output),
        Err(e) => {
            debug!(%contract, "decimals() failed: {:#}", e);
            None
        }
    };

    AssetInfo {
        asset: Asset {
            id: symbol.unwrap_or_else(|| format!("0x{:x}", contract)),
            address: Some(contract),
        },
        scale: decimals.unwrap_or(0),
    }
}

/// Decode a `symbol()` return value.
///
/// Accepts the ABI `string` encoding and the older fixed `bytes32` form.
pub fn decode_symbol(output: &[u8]) -> Option<String> {
    let raw = if output.len() == 32 {
        let end = output.iter().position(|b| *b == 0).unwrap_or(32);
        &output[..end]
    } else {
        let offset = read_usize(output, 0)?;
        let len = read_usize(output, offset)?;
        let start = offset.checked_add(32)?;
        output.get(start..start.checked_add(len)?)?
    };

    let symbol = std::str::from_utf8(raw).ok()?.trim();
    if symbol.is_empty() || symbol.chars().any(char::is_control) {
        return None;
    }
    Some(symbol.to_string())
}

/// Decode a `decimals()` return value; None when it cannot be a uint8.
pub fn decode_decimals(output: &[u8]) -> Option<u8> {
    let word = output.get(..32)?;
    let value = U256::from_be_slice(word);
    if value > U256::from(u8::MAX) {
        return None;
    }
    Some(value.as_limbs()[0] as u8)
}

/// Read the 32-byte word at `at` as a small unsigned integer.
fn read_usize(data: &[u8], at: usize) -> Option<usize> {
    let word = data.get(at..at.checked_add(32)?)?;
    let value = U256::from_be_slice(word);
    if value > U256::from(u32::MAX) {
        return None;
    }
    Some(value.as_limbs()[0] as usize)
}
