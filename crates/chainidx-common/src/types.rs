use serde::{Deserialize, Serialize};

/// A canonical block as stored under `block-<number>`.
///
/// `number` and `timestamp` are kept as native `u64` because the engine
/// uses them as control identifiers (window math, range-scan bounds);
/// every other numeric field is an opaque decimal string pass-through,
/// per the "no arbitrary-precision computation" non-goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
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
    /// Ordered transaction hashes. Empty for an empty block.
    pub transactions: Vec<String>,
}

/// A single decoded log entry, nested inside [`Transaction::logs`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub data: String,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub block_hash: String,
    pub block_number: u64,
    pub from: String,
    pub to: String,
    pub gas: String,
    pub gas_price: String,
    pub hash: String,
    pub input: String,
    pub nonce: String,
    pub value: String,
    pub cumulative_gas_used: String,
    pub gas_used: String,
    pub logs: Vec<LogEntry>,
    /// Empty string when this transaction did not create a contract.
    pub contract_address: String,
    pub timestamp: u64,
    /// Count of internal transactions attached to this transaction so far.
    pub internal_tx_index: u64,
}

/// Whether an address has been classified as a token contract, and which
/// standard. `Unknown` is the initial state for freshly-seen addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenContractKind {
    Unknown,
    Erc20,
    Erc721,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressCode {
    /// Externally-owned account: no code.
    None,
    /// Out-of-line bytecode reference, `address-contract-<n>`.
    Contract(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// `None` means balance resolution is still pending (`null` in the wire form).
    pub balance: Option<String>,
    pub code: AddressCode,
    pub token_contract: TokenContractKind,
    pub input_tx_index: u64,
    pub output_tx_index: u64,
    pub input_token_tx_index: u64,
    pub output_token_tx_index: u64,
    pub input_int_tx_index: u64,
    pub output_int_tx_index: u64,
    pub mined_index: u64,
}

impl Address {
    /// A freshly-discovered address: no balance yet, no code, no history.
    pub fn new_empty() -> Self {
        Self {
            balance: None,
            code: AddressCode::None,
            token_contract: TokenContractKind::Unknown,
            input_tx_index: 0,
            output_tx_index: 0,
            input_token_tx_index: 0,
            output_token_tx_index: 0,
            input_int_tx_index: 0,
            output_int_tx_index: 0,
            mined_index: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Erc20,
    Erc721,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub name: String,
    pub decimals: String,
    pub total_supply: String,
    pub kind: TokenKind,
    pub tx_index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub token_address: String,
    pub address_from: String,
    pub address_to: String,
    pub value: String,
    pub transaction_hash: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalTransaction {
    pub from: String,
    pub to: String,
    pub value: String,
    pub input: String,
    pub output: String,
    pub trace_type: String,
    pub call_type: String,
    pub reward_type: String,
    pub gas: String,
    pub gas_used: String,
    pub transaction_hash: String,
    pub timestamp: u64,
    pub error: String,
}

/// The four durable counters persisted to `progress.txt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub highest_block: u64,
    pub highest_token_tx: u64,
    pub highest_contract_code: u64,
    pub highest_internal_tx: u64,
}
