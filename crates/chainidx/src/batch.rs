//! In-memory accumulator for one ingest batch. Everything collected here
//! lives only in memory until the final commit; nothing is written to the
//! store until [`crate::indexer`] has finished all thirteen passes.

use std::collections::{HashMap, HashSet};

use chainidx_common::types::{
    AddressCode, Block, InternalTransaction, Token, TokenContractKind, TokenTransfer, Transaction,
};

/// One appended entry for an address's `i`/`o` associated-data stream.
#[derive(Debug, Clone)]
pub struct ValueDelta {
    pub counterpart_hash: String,
    pub value: String,
    pub timestamp: u64,
}

/// One appended entry for an address's `ti`/`to` associated-data stream.
#[derive(Debug, Clone)]
pub struct TokenTxDelta {
    pub token_tx_index: u64,
    pub timestamp: u64,
}

/// One appended entry for an address's `ii`/`io` associated-data stream.
#[derive(Debug, Clone)]
pub struct IntTxDelta {
    pub int_tx_index: u64,
    pub value: String,
    pub timestamp: u64,
}

/// Deltas discovered for one address during this batch. Counter *resolution*
/// (old value + len(deltas)) happens in the indexer against the store's
/// existing record; this struct only holds what's new.
#[derive(Debug, Clone, Default)]
pub struct AddressDeltas {
    pub new_input_txs: Vec<ValueDelta>,
    pub new_output_txs: Vec<ValueDelta>,
    pub new_input_token_txs: Vec<TokenTxDelta>,
    pub new_output_token_txs: Vec<TokenTxDelta>,
    pub new_input_int_txs: Vec<IntTxDelta>,
    pub new_output_int_txs: Vec<IntTxDelta>,
    pub new_mined: Vec<String>,
    /// Set only when this batch newly discovered contract code for the
    /// address. An existing stored record's `code` always wins over this,
    /// since contract code is immutable once recorded.
    pub discovered_code: Option<AddressCode>,
    /// Set only when this batch newly classified the address as a token
    /// contract. An existing stored classification always wins.
    pub discovered_token_contract: Option<TokenContractKind>,
}

impl AddressDeltas {
    fn touched(&self) -> bool {
        !self.new_input_txs.is_empty()
            || !self.new_output_txs.is_empty()
            || !self.new_input_token_txs.is_empty()
            || !self.new_output_token_txs.is_empty()
            || !self.new_input_int_txs.is_empty()
            || !self.new_output_int_txs.is_empty()
            || !self.new_mined.is_empty()
            || self.discovered_code.is_some()
            || self.discovered_token_contract.is_some()
    }
}

/// One newly discovered out-of-line contract bytecode blob, to be assigned
/// a `highest-contract-code` index at commit time.
pub struct ContractCode {
    pub address: String,
    pub bytecode: String,
}

/// One appended entry for a token's own `tt` associated-data stream,
/// mirroring the address-side `ti`/`to` streams: keyed by the token's local
/// `tx_index` at the moment this transfer was appended, payload is the
/// global token-transfer index plus timestamp.
#[derive(Debug, Clone)]
pub struct TokenTxStreamEntry {
    pub token_address: String,
    pub tx_index: u64,
    pub token_tx_index: u64,
    pub timestamp: u64,
}

#[derive(Default)]
pub struct BatchAccumulator {
    pub blocks: HashMap<String, Block>,
    pub block_hash_by_number: HashMap<u64, String>,
    pub transactions: HashMap<String, Transaction>,
    /// `(block_number, transaction_index) -> tx_hash`, populated in the
    /// transactions pass and consumed by the internal-transactions pass.
    pub tx_by_block_index: HashMap<(u64, u64), String>,
    pub addresses: HashMap<String, AddressDeltas>,
    pub tokens: HashMap<String, Token>,
    pub token_transfers: Vec<TokenTransfer>,
    pub token_tx_stream: Vec<TokenTxStreamEntry>,
    pub internal_transactions: Vec<InternalTransaction>,
    /// Local `internal_tx_index` each entry in `internal_transactions` had
    /// on its owning transaction at the moment it was appended (parallel to
    /// `internal_transactions`, since the transaction's counter keeps
    /// advancing for later entries in the same batch).
    pub internal_transaction_local_indices: Vec<u64>,
    pub contract_codes: Vec<ContractCode>,
    /// Addresses touched by any pass this batch (structural, token, mined,
    /// or trace-only discovery), destined for the spill file.
    pub touched_addresses: HashSet<String>,
}

impl BatchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address_entry(&mut self, address: &str) -> &mut AddressDeltas {
        self.touched_addresses.insert(address.to_string());
        self.addresses.entry(address.to_string()).or_default()
    }

    /// Addresses genuinely touched this batch, i.e. with at least one
    /// recorded delta or discovery (as opposed to merely being mentioned,
    /// e.g. by [`Self::address_entry`] being called defensively).
    pub fn touched_addresses_with_deltas(&self) -> impl Iterator<Item = &str> {
        self.addresses
            .iter()
            .filter(|(_, deltas)| deltas.touched())
            .map(|(addr, _)| addr.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_entry_tracks_touched_set() {
        let mut batch = BatchAccumulator::new();
        batch.address_entry("0xabc").new_input_txs.push(ValueDelta {
            counterpart_hash: "0xtx".to_string(),
            value: "1".to_string(),
            timestamp: 1,
        });
        assert!(batch.touched_addresses.contains("0xabc"));
        assert_eq!(batch.touched_addresses_with_deltas().count(), 1);
    }
}
