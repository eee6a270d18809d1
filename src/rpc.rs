//! JSON-RPC client for Ethereum nodes
//!
//! Implements the collaborator traits against a node's JSON-RPC endpoint.
//! Results are kept as raw JSON until decoded, so block payloads can be
//! passed through byte-for-byte.

use crate::config::TraceFlavor;
use crate::node::{ChainNode, ContractCaller, LogFilter, TraceSource};
use crate::types::{decode_hex, CallTrace, Log, ParityTrace, RawBlock, Receipt, TraceTree};
use alloy_primitives::{keccak256, Address, Bytes, B256};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::{json, Value};
use tracing::debug;

/// JSON-RPC client for Ethereum nodes.
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
    trace_flavor: TraceFlavor,
}

#[derive(Deserialize)]
struct RpcResponse<'a> {
    #[serde(borrow, default)]
    result: Option<&'a RawValue>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcClient {
    /// Create a new RPC client.
    pub fn new(url: String, trace_flavor: TraceFlavor) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            trace_flavor,
        }
    }

    /// Make a JSON-RPC call. `Ok(None)` when the result is `null`.
    async fn request(&self, method: &str, params: Value) -> Result<Option<Box<RawValue>>> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?;

        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read {} response", method))?;

        parse_response(&body).with_context(|| format!("{} failed", method))
    }

    /// Request and decode a non-null result.
    async fn request_decoded<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        match self.request(method, params).await? {
            Some(raw) => serde_json::from_str(raw.get())
                .map(Some)
                .with_context(|| format!("Failed to deserialize {} result", method)),
            None => Ok(None),
        }
    }
}

/// Extract the `result` of a JSON-RPC response body.
fn parse_response(body: &[u8]) -> Result<Option<Box<RawValue>>> {
    let response: RpcResponse = serde_json::from_slice(body).context("Failed to parse RPC response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error {}: {}", error.code, error.message);
    }

    Ok(response.result.map(ToOwned::to_owned))
}

/// 4-byte selector of an argument-less function.
fn selector(function: &str) -> [u8; 4] {
    let hash = keccak256(format!("{}()", function));
    [hash[0], hash[1], hash[2], hash[3]]
}

fn parse_hex_quantity(s: &str) -> Result<u64> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        anyhow::bail!("Empty hex quantity");
    }
    u64::from_str_radix(digits, 16).with_context(|| format!("Invalid hex quantity: {}", s))
}

#[async_trait]
impl ChainNode for RpcClient {
    async fn chain_head(&self) -> Result<u64> {
        let head: String = self
            .request_decoded("eth_blockNumber", json!([]))
            .await?
            .context("eth_blockNumber returned null")?;
        parse_hex_quantity(&head)
    }

    async fn block_by_height(
        &self,
        height: u64,
        full_transactions: bool,
    ) -> Result<Option<RawBlock>> {
        let params = json!([format!("0x{:x}", height), full_transactions]);
        match self.request("eth_getBlockByNumber", params).await? {
            Some(raw) => RawBlock::from_json(raw.get().as_bytes()).map(Some),
            None => {
                debug!(height, "Node has no block at height");
                Ok(None)
            }
        }
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>> {
        let params = json!([format!("0x{:x}", tx_hash)]);
        self.request_decoded("eth_getTransactionReceipt", params).await
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        let topics: Vec<String> = filter.topics.iter().map(|t| format!("0x{:x}", t)).collect();
        let params = json!([{
            "fromBlock": format!("0x{:x}", filter.from_height),
            "toBlock": format!("0x{:x}", filter.to_height),
            "topics": [topics],
        }]);
        Ok(self
            .request_decoded("eth_getLogs", params)
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl TraceSource for RpcClient {
    async fn trace(&self, tx_hash: B256) -> Result<Option<TraceTree>> {
        let hash = format!("0x{:x}", tx_hash);
        match self.trace_flavor {
            TraceFlavor::Parity => Ok(self
                .request_decoded::<Vec<ParityTrace>>("trace_transaction", json!([hash]))
                .await?
                .map(TraceTree::Parity)),
            TraceFlavor::Geth => Ok(self
                .request_decoded::<CallTrace>(
                    "debug_traceTransaction",
                    json!([hash, { "tracer": "callTracer" }]),
                )
                .await?
                .map(TraceTree::Geth)),
        }
    }
}

#[async_trait]
impl ContractCaller for RpcClient {
    async fn call(&self, contract: Address, function: &str) -> Result<Bytes> {
        let params = json!([
            {
                "to": format!("0x{:x}", contract),
                "data": format!("0x{}", hex::encode(selector(function))),
            },
            "latest"
        ]);
        let output: String = self
            .request_decoded("eth_call", params)
            .await?
            .with_context(|| format!("{}() returned null", function))?;
        let bytes = decode_hex(&output).context("Failed to decode eth_call output")?;
        if bytes.is_empty() {
            anyhow::bail!("{}() returned no data", function);
        }
        Ok(Bytes::from(bytes))
    }
}
