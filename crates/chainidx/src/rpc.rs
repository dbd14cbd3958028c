//! JSON-RPC client for the node's HTTP interface. Batches requests into a
//! single HTTP POST and matches responses back up by numeric `id`.

use std::time::Duration;

use chainidx_common::error::{IndexError, Result};
use serde_json::{json, Value};

const RETRY_DELAYS: &[u64] = &[2, 5, 10, 20, 30];
const MAX_RETRIES: usize = 10;

pub struct RpcClient {
    http: reqwest::Client,
    url: String,
}

impl RpcClient {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }

    /// Posts a batch of `(method, params)` requests as one JSON array and
    /// returns the `result` values in the same order as the inputs,
    /// matched up by the numeric id assigned here rather than by response
    /// array position (the node is not required to preserve order).
    pub async fn call_batch(&self, requests: &[(&str, Value)]) -> Result<Vec<Value>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let body: Vec<Value> = requests
            .iter()
            .enumerate()
            .map(|(id, (method, params))| {
                json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "method": method,
                    "params": params,
                })
            })
            .collect();

        let mut last_err = None;
        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = RETRY_DELAYS[(attempt - 1).min(RETRY_DELAYS.len() - 1)];
                tracing::warn!(attempt, "retrying json-rpc batch after error: {:?}", last_err);
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }
            match self.send_once(&body).await {
                Ok(responses) => return reorder(responses, requests.len()),
                Err(e) => last_err = Some(e),
            }
        }
        Err(IndexError::UpstreamUnavailable(format!(
            "json-rpc batch failed after {MAX_RETRIES} attempts: {:?}",
            last_err
        )))
    }

    async fn send_once(&self, body: &[Value]) -> Result<Vec<Value>> {
        let resp = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| IndexError::UpstreamUnavailable(e.to_string()))?;
        let parsed: Vec<Value> = resp
            .json()
            .await
            .map_err(|e| IndexError::UpstreamUnavailable(e.to_string()))?;
        Ok(parsed)
    }

    /// Unbatched `eth_blockNumber` call, used for head-height polling.
    pub async fn block_number(&self) -> Result<u64> {
        let results = self.call_batch(&[("eth_blockNumber", json!([]))]).await?;
        let hex = results[0]
            .as_str()
            .ok_or_else(|| IndexError::UpstreamUnavailable("eth_blockNumber: missing result".to_string()))?;
        parse_hex_u64(hex)
    }

    pub async fn get_balances(&self, addresses: &[String]) -> Result<Vec<Option<String>>> {
        let requests: Vec<(&str, Value)> = addresses
            .iter()
            .map(|addr| ("eth_getBalance", json!([addr, "latest"])))
            .collect();
        let results = self.call_batch(&requests).await?;
        Ok(results
            .into_iter()
            .map(|v| v.as_str().and_then(|hex| parse_hex_decimal(hex).ok()))
            .collect())
    }

    pub async fn get_blocks_by_number(&self, numbers: &[u64]) -> Result<Vec<Value>> {
        let requests: Vec<(&str, Value)> = numbers
            .iter()
            .map(|n| ("eth_getBlockByNumber", json!([format!("0x{n:x}"), true])))
            .collect();
        self.call_batch(&requests).await
    }

    pub async fn get_block_receipts(&self, numbers: &[u64]) -> Result<Vec<Value>> {
        let requests: Vec<(&str, Value)> = numbers
            .iter()
            .map(|n| ("eth_getBlockReceipts", json!([format!("0x{n:x}")])))
            .collect();
        self.call_batch(&requests).await
    }

    /// `debug_traceBlockByNumber` with `callTracer`, per the external
    /// interfaces note limiting batches to a few hundred to avoid node
    /// timeouts; chunking to that size is the caller's responsibility.
    pub async fn trace_blocks(&self, numbers: &[u64]) -> Result<Vec<Value>> {
        let requests: Vec<(&str, Value)> = numbers
            .iter()
            .map(|n| {
                (
                    "debug_traceBlockByNumber",
                    json!([format!("0x{n:x}"), {"tracer": "callTracer"}]),
                )
            })
            .collect();
        self.call_batch(&requests).await
    }
}

/// Reorders `responses` (each carrying its own `id`) back into request
/// order and extracts each `result` field.
fn reorder(responses: Vec<Value>, expected: usize) -> Result<Vec<Value>> {
    let mut by_id: std::collections::BTreeMap<u64, Value> = std::collections::BTreeMap::new();
    for resp in responses {
        let id = resp
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| IndexError::UpstreamUnavailable("json-rpc response missing id".to_string()))?;
        let result = resp.get("result").cloned().unwrap_or(Value::Null);
        by_id.insert(id, result);
    }
    (0..expected as u64)
        .map(|id| {
            by_id
                .get(&id)
                .cloned()
                .ok_or_else(|| IndexError::UpstreamUnavailable(format!("missing response for id {id}")))
        })
        .collect()
}

fn parse_hex_u64(hex: &str) -> Result<u64> {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    u64::from_str_radix(hex, 16).map_err(|_| IndexError::UpstreamUnavailable(format!("bad hex u64: {hex}")))
}

/// Converts a `0x`-prefixed hex quantity into a decimal string, preserving
/// full precision for values that do not fit in a native integer.
fn parse_hex_decimal(hex: &str) -> Result<String> {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let value = num_bigint::BigUint::parse_bytes(hex.as_bytes(), 16)
        .ok_or_else(|| IndexError::UpstreamUnavailable(format!("bad hex quantity: {hex}")))?;
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_decimal_preserves_256_bit_values() {
        let hex = "0xffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";
        let decimal = parse_hex_decimal(hex).unwrap();
        assert_eq!(
            decimal,
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
    }

    #[test]
    fn reorder_restores_request_order_from_shuffled_responses() {
        let responses = vec![
            json!({"id": 2, "result": "c"}),
            json!({"id": 0, "result": "a"}),
            json!({"id": 1, "result": "b"}),
        ];
        let ordered = reorder(responses, 3).unwrap();
        assert_eq!(ordered, vec![json!("a"), json!("b"), json!("c")]);
    }
}
