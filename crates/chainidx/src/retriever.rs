//! Data Retriever: produces the tabular rows the Indexer consumes for one
//! half-open block window `[first, last)`.
//!
//! Two implementations are exposed behind the same [`ExtractedWindow`]
//! output shape: [`CsvRetriever`] drives an external extractor subprocess
//! (the mandatory path for large backfills, since it keeps memory bounded
//! at one batch) and [`RpcRetriever`] drives the node's JSON-RPC interface
//! directly, for callers that would rather not shell out. Neither is a
//! replacement for the other; CSV staging remains the default.

use std::path::{Path, PathBuf};
use std::process::Command;

use chainidx_common::error::{IndexError, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct BlockRow {
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    pub nonce: String,
    pub logs_bloom: String,
    pub miner: String,
    pub difficulty: String,
    pub total_difficulty: String,
    pub extra_data: String,
    pub size: String,
    pub gas_limit: String,
    pub gas_used: String,
    pub timestamp: u64,
    pub sha3_uncles: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRow {
    pub block_hash: String,
    pub block_number: u64,
    pub from_address: String,
    pub to_address: String,
    pub gas: String,
    pub gas_price: String,
    pub hash: String,
    pub input: String,
    pub nonce: String,
    pub value: String,
    pub transaction_index: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptRow {
    pub transaction_hash: String,
    pub cumulative_gas_used: String,
    pub gas_used: String,
    pub contract_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogRow {
    pub transaction_hash: String,
    pub data: String,
    /// Comma-joined in-cell, per the column contract.
    pub topics: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractRow {
    pub address: String,
    pub bytecode: String,
    pub is_erc20: bool,
    pub is_erc721: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenRow {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: String,
    pub total_supply: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenTransferRow {
    pub token_address: String,
    pub from_address: String,
    pub to_address: String,
    pub value: String,
    pub transaction_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraceRow {
    pub block_number: u64,
    pub transaction_index: u64,
    pub from_address: String,
    pub to_address: String,
    pub value: String,
    pub input: String,
    pub output: String,
    pub trace_type: String,
    pub call_type: String,
    pub reward_type: String,
    pub gas: String,
    pub gas_used: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractedWindow {
    pub blocks: Vec<BlockRow>,
    pub transactions: Vec<TransactionRow>,
    pub receipts: Vec<ReceiptRow>,
    pub logs: Vec<LogRow>,
    pub contracts: Vec<ContractRow>,
    pub tokens: Vec<TokenRow>,
    pub token_transfers: Vec<TokenTransferRow>,
    pub traces: Vec<TraceRow>,
}

impl ExtractedWindow {
    /// Re-sorts transactions by `(block_number, transaction_index)`
    /// ascending, giving the indexer a deterministic intra-batch order to
    /// assign further downstream.
    pub fn resort_transactions(&mut self) {
        self.transactions
            .sort_by_key(|t| (t.block_number, t.transaction_index));
    }
}

/// Drives the external extractor subprocess. The command template has
/// `{start}`, `{end}`, `{out_dir}` substituted and is otherwise opaque —
/// the core only understands the CSV files it leaves behind.
pub struct CsvRetriever {
    command_template: String,
    data_dir: PathBuf,
}

impl CsvRetriever {
    pub fn new(command_template: String, data_dir: PathBuf) -> Self {
        Self {
            command_template,
            data_dir,
        }
    }

    pub fn extract(&self, first: u64, last: u64) -> Result<ExtractedWindow> {
        std::fs::create_dir_all(&self.data_dir)?;
        let out_dir = self.data_dir.display().to_string();
        let command = self
            .command_template
            .replace("{start}", &first.to_string())
            .replace("{end}", &last.to_string())
            .replace("{out_dir}", &out_dir);

        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| IndexError::InvalidInput("empty ETL command template".to_string()))?;
        let status = Command::new(program)
            .args(parts)
            .status()
            .map_err(|e| IndexError::UpstreamUnavailable(format!("failed to spawn extractor: {e}")))?;
        if !status.success() {
            return Err(IndexError::UpstreamUnavailable(format!(
                "extractor exited with status {status}"
            )));
        }

        let mut window = ExtractedWindow {
            blocks: read_csv(&self.data_dir.join("blocks.csv"))?,
            transactions: read_csv(&self.data_dir.join("transactions.csv"))?,
            receipts: read_csv(&self.data_dir.join("receipts.csv"))?,
            logs: read_csv(&self.data_dir.join("logs.csv"))?,
            contracts: read_csv(&self.data_dir.join("contracts.csv"))?,
            tokens: read_csv(&self.data_dir.join("tokens.csv"))?,
            token_transfers: read_csv(&self.data_dir.join("token_transfers.csv"))?,
            traces: read_csv_optional(&self.data_dir.join("traces.csv"))?,
        };
        window.resort_transactions();
        Ok(window)
    }
}

fn read_csv<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| IndexError::UpstreamUnavailable(format!("reading {}: {e}", path.display())))?;
    reader
        .deserialize()
        .map(|row| {
            row.map_err(|e| IndexError::CorruptRecord(format!("malformed row in {}: {e}", path.display())))
        })
        .collect()
}

/// Like [`read_csv`] but treats a missing file as an empty table — traces
/// are only produced when the config enables internal-transaction gathering.
fn read_csv_optional<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    read_csv(path)
}

/// Drives the node's JSON-RPC interface directly, batching requests the
/// same way the CSV extractor's upstream source would, so the core has an
/// end-to-end-testable path that doesn't depend on an external process.
pub struct RpcRetriever<'a> {
    rpc: &'a crate::rpc::RpcClient,
}

impl<'a> RpcRetriever<'a> {
    pub fn new(rpc: &'a crate::rpc::RpcClient) -> Self {
        Self { rpc }
    }

    pub async fn extract(&self, first: u64, last: u64, gather_traces: bool) -> Result<ExtractedWindow> {
        let numbers: Vec<u64> = (first..last).collect();
        let blocks_json = self.rpc.get_blocks_by_number(&numbers).await?;
        let receipts_json = self.rpc.get_block_receipts(&numbers).await?;

        let mut blocks = Vec::new();
        let mut transactions = Vec::new();

        for (number, block) in numbers.iter().zip(blocks_json.iter()) {
            if block.is_null() {
                continue;
            }
            let hash = field_str(block, "hash")?;
            blocks.push(BlockRow {
                number: *number,
                hash: hash.clone(),
                parent_hash: field_str(block, "parentHash")?,
                nonce: field_str(block, "nonce")?,
                logs_bloom: field_str(block, "logsBloom")?,
                miner: field_str(block, "miner")?,
                difficulty: field_decimal(block, "difficulty")?,
                total_difficulty: field_decimal(block, "totalDifficulty")?,
                extra_data: field_str(block, "extraData")?,
                size: field_decimal(block, "size")?,
                gas_limit: field_decimal(block, "gasLimit")?,
                gas_used: field_decimal(block, "gasUsed")?,
                timestamp: field_hex_u64(block, "timestamp")?,
                sha3_uncles: field_str(block, "sha3Uncles")?,
            });

            if let Some(txs) = block.get("transactions").and_then(|v| v.as_array()) {
                for (index, tx) in txs.iter().enumerate() {
                    transactions.push(TransactionRow {
                        block_hash: hash.clone(),
                        block_number: *number,
                        from_address: field_str(tx, "from")?,
                        to_address: tx
                            .get("to")
                            .and_then(|v| v.as_str())
                            .unwrap_or("")
                            .to_string(),
                        gas: field_decimal(tx, "gas")?,
                        gas_price: field_decimal(tx, "gasPrice")?,
                        hash: field_str(tx, "hash")?,
                        input: field_str(tx, "input")?,
                        nonce: field_decimal(tx, "nonce")?,
                        value: field_decimal(tx, "value")?,
                        transaction_index: index as u64,
                    });
                }
            }
        }

        let mut receipts = Vec::new();
        let mut logs = Vec::new();
        for receipt_list in receipts_json.iter() {
            let Some(list) = receipt_list.as_array() else { continue };
            for receipt in list {
                let tx_hash = field_str(receipt, "transactionHash")?;
                receipts.push(ReceiptRow {
                    transaction_hash: tx_hash.clone(),
                    cumulative_gas_used: field_decimal(receipt, "cumulativeGasUsed")?,
                    gas_used: field_decimal(receipt, "gasUsed")?,
                    contract_address: receipt
                        .get("contractAddress")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                });
                if let Some(receipt_logs) = receipt.get("logs").and_then(|v| v.as_array()) {
                    for log in receipt_logs {
                        let topics: Vec<String> = log
                            .get("topics")
                            .and_then(|v| v.as_array())
                            .map(|arr| {
                                arr.iter()
                                    .filter_map(|t| t.as_str().map(str::to_string))
                                    .collect()
                            })
                            .unwrap_or_default();
                        logs.push(LogRow {
                            transaction_hash: tx_hash.clone(),
                            data: field_str(log, "data")?,
                            topics: topics.join(","),
                        });
                    }
                }
            }
        }

        let mut traces = Vec::new();
        if gather_traces {
            let traces_json = self.rpc.trace_blocks(&numbers).await?;
            for (number, trace_root) in numbers.iter().zip(traces_json.iter()) {
                flatten_traces(trace_root, *number, &mut traces);
            }
        }

        let mut window = ExtractedWindow {
            blocks,
            transactions,
            receipts,
            logs,
            contracts: Vec::new(),
            tokens: Vec::new(),
            token_transfers: Vec::new(),
            traces,
        };
        window.resort_transactions();
        Ok(window)
    }
}

fn flatten_traces(node: &serde_json::Value, block_number: u64, out: &mut Vec<TraceRow>) {
    if node.is_null() {
        return;
    }
    let transaction_index = node
        .get("transactionPosition")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    out.push(TraceRow {
        block_number,
        transaction_index,
        from_address: node.get("from").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        to_address: node.get("to").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        value: node.get("value").and_then(|v| v.as_str()).unwrap_or("0").to_string(),
        input: node.get("input").and_then(|v| v.as_str()).unwrap_or("0x").to_string(),
        output: node.get("output").and_then(|v| v.as_str()).unwrap_or("0x").to_string(),
        trace_type: node.get("type").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        call_type: node.get("callType").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        reward_type: node.get("rewardType").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        gas: node.get("gas").and_then(|v| v.as_str()).unwrap_or("0").to_string(),
        gas_used: node.get("gasUsed").and_then(|v| v.as_str()).unwrap_or("0").to_string(),
        error: node.get("error").and_then(|v| v.as_str()).unwrap_or("").to_string(),
    });
    if let Some(calls) = node.get("calls").and_then(|v| v.as_array()) {
        for call in calls {
            flatten_traces(call, block_number, out);
        }
    }
}

fn field_str(v: &serde_json::Value, name: &str) -> Result<String> {
    v.get(name)
        .and_then(|f| f.as_str())
        .map(str::to_string)
        .ok_or_else(|| IndexError::UpstreamUnavailable(format!("missing field {name}")))
}

fn field_hex_u64(v: &serde_json::Value, name: &str) -> Result<u64> {
    let s = field_str(v, name)?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|_| IndexError::UpstreamUnavailable(format!("bad hex field {name}: {s}")))
}

fn field_decimal(v: &serde_json::Value, name: &str) -> Result<String> {
    let s = field_str(v, name)?;
    let hex = s.trim_start_matches("0x");
    let value = num_bigint::BigUint::parse_bytes(hex.as_bytes(), 16)
        .ok_or_else(|| IndexError::UpstreamUnavailable(format!("bad hex quantity {name}: {s}")))?;
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_traces_walks_nested_calls() {
        let root = serde_json::json!({
            "transactionPosition": 2,
            "from": "0xa",
            "to": "0xb",
            "value": "0x1",
            "type": "CALL",
            "calls": [
                {
                    "transactionPosition": 2,
                    "from": "0xb",
                    "to": "0xc",
                    "value": "0x0",
                    "type": "CALL",
                    "calls": [
                        {
                            "transactionPosition": 2,
                            "from": "0xc",
                            "to": "0xd",
                            "value": "0x0",
                            "type": "DELEGATECALL"
                        }
                    ]
                }
            ]
        });
        let mut out = Vec::new();
        flatten_traces(&root, 50, &mut out);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|row| row.block_number == 50 && row.transaction_index == 2));
        assert_eq!(out[0].to_address, "0xb");
        assert_eq!(out[1].to_address, "0xc");
        assert_eq!(out[2].to_address, "0xd");
        assert_eq!(out[2].trace_type, "DELEGATECALL");
    }

    #[test]
    fn flatten_traces_ignores_null_node() {
        let mut out = Vec::new();
        flatten_traces(&serde_json::Value::Null, 1, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn resort_transactions_orders_by_block_then_index() {
        let mut window = ExtractedWindow {
            transactions: vec![
                TransactionRow {
                    block_hash: "".into(),
                    block_number: 2,
                    from_address: "".into(),
                    to_address: "".into(),
                    gas: "0".into(),
                    gas_price: "0".into(),
                    hash: "tx-2-0".into(),
                    input: "0x".into(),
                    nonce: "0".into(),
                    value: "0".into(),
                    transaction_index: 0,
                },
                TransactionRow {
                    block_hash: "".into(),
                    block_number: 1,
                    from_address: "".into(),
                    to_address: "".into(),
                    gas: "0".into(),
                    gas_price: "0".into(),
                    hash: "tx-1-1".into(),
                    input: "0x".into(),
                    nonce: "0".into(),
                    value: "0".into(),
                    transaction_index: 1,
                },
                TransactionRow {
                    block_hash: "".into(),
                    block_number: 1,
                    from_address: "".into(),
                    to_address: "".into(),
                    gas: "0".into(),
                    gas_price: "0".into(),
                    hash: "tx-1-0".into(),
                    input: "0x".into(),
                    nonce: "0".into(),
                    value: "0".into(),
                    transaction_index: 0,
                },
            ],
            ..Default::default()
        };
        window.resort_transactions();
        let hashes: Vec<&str> = window.transactions.iter().map(|t| t.hash.as_str()).collect();
        assert_eq!(hashes, vec!["tx-1-0", "tx-1-1", "tx-2-0"]);
    }
}
