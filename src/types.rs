//! Ethereum JSON-RPC types
//!
//! Type definitions for blocks, transactions, receipts, logs and call traces
//! returned from Ethereum JSON-RPC endpoints.

use alloy_primitives::{Address, Bytes, B256, U256};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;

/// Ethereum block as returned by `eth_getBlockByNumber`.
///
/// Transactions are kept as raw JSON so that each one can be passed through
/// byte-for-byte next to its decoded form.
#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    /// Block number (hex string in JSON, parsed to u64)
    #[serde(rename = "number", deserialize_with = "deserialize_hex_u64")]
    pub number: u64,

    /// Block hash (hex string in JSON)
    #[serde(rename = "hash", deserialize_with = "deserialize_hex_b256")]
    pub hash: B256,

    /// Parent block hash (hex string in JSON)
    #[serde(rename = "parentHash", deserialize_with = "deserialize_hex_b256")]
    pub parent_hash: B256,

    /// Unix timestamp in seconds (hex string in JSON)
    #[serde(rename = "timestamp", deserialize_with = "deserialize_hex_u64")]
    pub timestamp: u64,

    /// Block size in bytes (missing on some dev nodes)
    #[serde(rename = "size", default, deserialize_with = "deserialize_hex_u64_opt")]
    pub size: Option<u64>,

    /// Base fee per gas (EIP-1559, hex string in JSON)
    #[serde(rename = "baseFeePerGas", default, deserialize_with = "deserialize_hex_u256_opt")]
    pub base_fee_per_gas: Option<U256>,

    /// Transactions: full objects or bare hashes, depending on the request
    #[serde(rename = "transactions", default)]
    pub transactions: Vec<Box<RawValue>>,
}

impl Block {
    /// Decode the full transaction objects, each paired with its raw JSON.
    ///
    /// Only valid for blocks fetched with full transaction bodies.
    pub fn decode_transactions(&self) -> Result<Vec<(Transaction, Bytes)>> {
        self.transactions
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                let tx: Transaction = serde_json::from_str(raw.get())
                    .with_context(|| format!("Failed to deserialize transaction #{}", index))?;
                Ok((tx, Bytes::from(raw.get().as_bytes().to_vec())))
            })
            .collect()
    }
}

/// A block together with the exact bytes the node sent for it.
#[derive(Debug, Clone)]
pub struct RawBlock {
    pub block: Block,
    pub bytes: Bytes,
}

impl RawBlock {
    /// Parse a block from the raw `result` JSON of `eth_getBlockByNumber`.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let block: Block = serde_json::from_slice(bytes).context("Failed to deserialize block")?;
        Ok(Self {
            block,
            bytes: Bytes::from(bytes.to_vec()),
        })
    }
}

/// Ethereum transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    /// Transaction hash (hex string in JSON)
    #[serde(rename = "hash", deserialize_with = "deserialize_hex_b256")]
    pub hash: B256,

    /// Sender address (hex string in JSON)
    #[serde(rename = "from", deserialize_with = "deserialize_hex_address")]
    pub from: Address,

    /// Recipient address (None for contract creation, hex string in JSON)
    #[serde(rename = "to", default, deserialize_with = "deserialize_hex_address_opt")]
    pub to: Option<Address>,

    /// Value transferred in wei (hex string in JSON)
    #[serde(rename = "value", deserialize_with = "deserialize_hex_u256")]
    pub value: U256,

    /// Gas price (legacy transactions, hex string in JSON)
    #[serde(rename = "gasPrice", default, deserialize_with = "deserialize_hex_u256_opt")]
    pub gas_price: Option<U256>,

    /// Max fee per gas (EIP-1559, hex string in JSON)
    #[serde(rename = "maxFeePerGas", default, deserialize_with = "deserialize_hex_u256_opt")]
    pub max_fee_per_gas: Option<U256>,

    /// Max priority fee per gas (EIP-1559, hex string in JSON)
    #[serde(
        rename = "maxPriorityFeePerGas",
        default,
        deserialize_with = "deserialize_hex_u256_opt"
    )]
    pub max_priority_fee_per_gas: Option<U256>,
}

/// Log entry as returned by `eth_getLogs`.
#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    /// Address of the contract that emitted the log
    #[serde(rename = "address", deserialize_with = "deserialize_hex_address")]
    pub address: Address,

    /// Indexed topics (topic0 = event signature, topics[1..] = indexed params)
    #[serde(rename = "topics", default)]
    pub topics: Vec<String>,

    /// Non-indexed event data (hex string)
    #[serde(rename = "data", default, deserialize_with = "deserialize_hex_bytes")]
    pub data: Vec<u8>,

    #[serde(rename = "blockHash", default, deserialize_with = "deserialize_hex_b256_opt")]
    pub block_hash: Option<B256>,

    #[serde(rename = "blockNumber", default, deserialize_with = "deserialize_hex_u64_opt")]
    pub block_number: Option<u64>,

    #[serde(rename = "transactionHash", default, deserialize_with = "deserialize_hex_b256_opt")]
    pub transaction_hash: Option<B256>,

    #[serde(rename = "transactionIndex", default, deserialize_with = "deserialize_hex_u64_opt")]
    pub transaction_index: Option<u64>,

    #[serde(rename = "logIndex", default, deserialize_with = "deserialize_hex_u64_opt")]
    pub log_index: Option<u64>,

    /// True when the log was dropped by a reorg (only seen on filters)
    #[serde(rename = "removed", default)]
    pub removed: bool,
}

/// Transaction receipt.
#[derive(Debug, Clone, Deserialize)]
pub struct Receipt {
    /// Transaction status: 1 = success, 0 = failure. Absent before Byzantium.
    #[serde(rename = "status", default, deserialize_with = "deserialize_hex_u64_opt")]
    pub status: Option<u64>,

    /// Gas used (hex string in JSON)
    #[serde(rename = "gasUsed", deserialize_with = "deserialize_hex_u256")]
    pub gas_used: U256,

    /// Effective gas price (post-London, hex string in JSON)
    #[serde(rename = "effectiveGasPrice", default, deserialize_with = "deserialize_hex_u256_opt")]
    pub effective_gas_price: Option<U256>,
}

impl Receipt {
    /// Check if the receipt reports an execution failure.
    pub fn is_failure(&self) -> bool {
        self.status == Some(0)
    }
}

/// Raw call trace of one transaction, in whichever shape the node speaks.
#[derive(Debug, Clone)]
pub enum TraceTree {
    /// Flat, pre-ordered list from Parity/OpenEthereum `trace_transaction`.
    Parity(Vec<ParityTrace>),
    /// Nested root frame from Geth `debug_traceTransaction` with `callTracer`.
    Geth(CallTrace),
}

/// One entry of a Parity `trace_transaction` result.
#[derive(Debug, Clone, Deserialize)]
pub struct ParityTrace {
    pub action: ParityAction,

    /// Absent or null when the call failed
    #[serde(default)]
    pub result: Option<ParityResult>,

    /// Path of this entry in the call tree; empty for the outer call
    #[serde(rename = "traceAddress", default)]
    pub trace_address: Vec<u64>,

    /// `call`, `create`, `suicide` or `reward`
    #[serde(rename = "type", default)]
    pub r#type: String,

    #[serde(default)]
    pub error: Option<String>,
}

/// Action part of a Parity trace entry.
///
/// The shape differs per entry type (a `suicide` action has no `from`/`to`),
/// so every field is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct ParityAction {
    /// `call`, `delegatecall`, `staticcall`, `callcode`; absent for creates
    #[serde(rename = "callType", default)]
    pub call_type: Option<String>,

    #[serde(default, deserialize_with = "deserialize_hex_address_opt")]
    pub from: Option<Address>,

    #[serde(default, deserialize_with = "deserialize_hex_address_opt")]
    pub to: Option<Address>,

    #[serde(default, deserialize_with = "deserialize_hex_u256_trace")]
    pub value: U256,
}

/// Result part of a Parity trace entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ParityResult {
    /// Created contract address, set for successful `create` entries
    #[serde(default, deserialize_with = "deserialize_hex_address_opt")]
    pub address: Option<Address>,
}

/// Call trace node produced by `debug_traceTransaction` with `callTracer`.
///
/// We keep this struct intentionally liberal (many optional fields) so it
/// can handle slightly different implementations across clients.
#[derive(Debug, Clone, Deserialize)]
pub struct CallTrace {
    /// Call type: CALL / STATICCALL / DELEGATECALL / CALLCODE / CREATE / CREATE2 / SELFDESTRUCT
    #[serde(rename = "type")]
    pub r#type: Option<String>,

    /// Sender address (hex string in JSON, may be omitted in some edge cases).
    #[serde(default, deserialize_with = "deserialize_hex_address_opt")]
    pub from: Option<Address>,

    /// Recipient address; for CREATE-like nodes this is the new contract.
    #[serde(default, deserialize_with = "deserialize_hex_address_opt")]
    pub to: Option<Address>,

    /// Value transferred in wei (hex string in JSON).
    ///
    /// Missing or empty values are treated as zero for robustness.
    #[serde(default, deserialize_with = "deserialize_hex_u256_trace")]
    pub value: U256,

    /// Nested child calls.
    #[serde(default)]
    pub calls: Option<Vec<CallTrace>>,

    /// Optional error / revert reason field used by some clients.
    #[serde(default)]
    pub error: Option<String>,
}

// Hex parsing helpers

/// Pad an odd-length hex string with a leading zero.
/// This handles cases where RPC returns hex strings without leading zeros.
fn pad_hex_string(s: &str) -> String {
    if s.len() % 2 == 1 {
        format!("0{}", s)
    } else {
        s.to_string()
    }
}

/// Decode a hex string with or without `0x` prefix, tolerating odd length.
pub(crate) fn decode_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(pad_hex_string(s))
}

fn u256_from_hex<E: serde::de::Error>(s: &str) -> Result<U256, E> {
    let bytes = decode_hex(s).map_err(E::custom)?;
    U256::try_from_be_slice(&bytes)
        .ok_or_else(|| E::custom(format!("Quantity does not fit in 256 bits: {}", s)))
}

fn b256_from_hex<E: serde::de::Error>(s: &str) -> Result<B256, E> {
    let bytes = decode_hex(s).map_err(E::custom)?;
    if bytes.len() != 32 {
        return Err(E::custom(format!(
            "Expected 32 bytes for hash, got {}",
            bytes.len()
        )));
    }
    Ok(B256::from_slice(&bytes))
}

fn address_from_hex<E: serde::de::Error>(s: &str) -> Result<Address, E> {
    let bytes = decode_hex(s).map_err(E::custom)?;
    if bytes.len() != 20 {
        return Err(E::custom(format!(
            "Expected 20 bytes for address, got {}",
            bytes.len()
        )));
    }
    Ok(Address::from_slice(&bytes))
}

fn u64_from_hex<E: serde::de::Error>(s: &str) -> Result<u64, E> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).map_err(E::custom)
}

/// Deserialize a hex string to u64.
fn deserialize_hex_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    u64_from_hex(&s)
}

/// Deserialize an optional hex string to u64.
fn deserialize_hex_u64_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|s| u64_from_hex(&s))
        .transpose()
}

/// Deserialize a hex string to U256.
fn deserialize_hex_u256<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    u256_from_hex(&s)
}

/// Deserialize an optional hex string to U256.
fn deserialize_hex_u256_opt<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|s| u256_from_hex(&s))
        .transpose()
}

/// Deserialize a hex string to B256.
fn deserialize_hex_b256<'de, D>(deserializer: D) -> Result<B256, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    b256_from_hex(&s)
}

/// Deserialize an optional hex string to B256.
fn deserialize_hex_b256_opt<'de, D>(deserializer: D) -> Result<Option<B256>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|s| b256_from_hex(&s))
        .transpose()
}

/// Deserialize a hex string to Address.
fn deserialize_hex_address<'de, D>(deserializer: D) -> Result<Address, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    address_from_hex(&s)
}

/// Deserialize an optional hex string to Address. Empty strings map to None.
fn deserialize_hex_address_opt<'de, D>(deserializer: D) -> Result<Option<Address>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if !s.strip_prefix("0x").unwrap_or(&s).is_empty() => {
            address_from_hex(&s).map(Some)
        }
        _ => Ok(None),
    }
}

/// Deserialize a hex string to bytes.
fn deserialize_hex_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    decode_hex(&s).map_err(serde::de::Error::custom)
}

/// Deserialize a hex string (or null / missing) to U256 for trace values.
///
/// This variant is a bit more forgiving than `deserialize_hex_u256`:
/// - null / missing ⇒ 0
/// - empty string  ⇒ 0
fn deserialize_hex_u256_trace<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) => u256_from_hex(&s),
        None => Ok(U256::ZERO),
    }
}
