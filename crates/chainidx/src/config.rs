use anyhow::{Context, Result};
use std::env;

/// Process configuration, read once at startup.
///
/// Required variables fail fast with a descriptive error; everything else
/// falls back to the documented default.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP(S) endpoint of the node's JSON-RPC interface.
    pub node_rpc_url: String,
    /// Directory the RocksDB store lives in.
    pub store_path: String,
    /// Scratch directory for the spill file and ETL-produced CSVs.
    pub data_dir: String,
    /// Blocks to stay behind the node's reported head, to tolerate shallow
    /// reorgs without a rollback mechanism.
    pub confirmations: u64,
    /// Target number of blocks per ingest window / commit batch.
    pub bulk_size: u64,
    /// Sleep between iterations once the window is empty (no new blocks).
    pub refresh_interval_secs: u64,
    /// Whether to collect internal (trace) transactions.
    pub gather_internal_transactions: bool,
    /// Whether to resolve and store ERC-20/721 token contract metadata.
    pub gather_token_info: bool,
    /// Concurrency for batched JSON-RPC fallback requests.
    pub rpc_workers: u32,
    /// Shell command template invoked to run the external CSV extractor;
    /// `{start}` and `{end}` are substituted with the window bounds and
    /// `{out_dir}` with the directory the CSVs should be written to.
    pub etl_command_template: String,
    /// Use the in-process JSON-RPC retriever instead of shelling out to the
    /// CSV extractor. CSV staging remains the default, since it's the only
    /// path with bounded memory for large backfills; this is an opt-in
    /// alternative for callers that would rather not run an external
    /// extractor process at all.
    pub use_rpc_retriever: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            node_rpc_url: env::var("NODE_RPC_URL").context("NODE_RPC_URL must be set")?,
            store_path: env::var("STORE_PATH").context("STORE_PATH must be set")?,
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            confirmations: env::var("CONFIRMATIONS")
                .unwrap_or_else(|_| "12".to_string())
                .parse()
                .context("Invalid CONFIRMATIONS")?,
            bulk_size: env::var("BULK_SIZE")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .context("Invalid BULK_SIZE")?,
            refresh_interval_secs: env::var("REFRESH_INTERVAL_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .context("Invalid REFRESH_INTERVAL_SECS")?,
            gather_internal_transactions: env::var("GATHER_INTERNAL_TRANSACTIONS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .context("Invalid GATHER_INTERNAL_TRANSACTIONS")?,
            gather_token_info: env::var("GATHER_TOKEN_INFO")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .context("Invalid GATHER_TOKEN_INFO")?,
            rpc_workers: env::var("RPC_WORKERS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid RPC_WORKERS")?,
            etl_command_template: env::var("ETL_COMMAND_TEMPLATE").unwrap_or_else(|_| {
                "extractor --start {start} --end {end} --out {out_dir}".to_string()
            }),
            use_rpc_retriever: env::var("USE_RPC_RETRIEVER")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("Invalid USE_RPC_RETRIEVER")?,
        })
    }
}
