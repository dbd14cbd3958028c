//! Query Gatherer: the read-only surface an external serving layer (out of
//! scope here) would sit in front of. All address inputs are assumed
//! already lowercased by the caller.

use chainidx_common::decimal::in_decimal_range;
use chainidx_common::error::{IndexError, Result};
use chainidx_common::keys::{
    address_contract_key, address_key, associated_data_prefix, block_key, hash_block_key,
    internal_tx_key, parse_assoc_index, token_key, token_tx_key, transaction_key, AssocTag,
};
use chainidx_common::types::{Address, Block, InternalTransaction, Token, TokenTransfer, Transaction};
use serde::Serialize;

use crate::codec;
use crate::store::Store;

/// Inclusive range filter, in the wire units the caller supplies them in
/// (decimal strings for values, `u64` for timestamps). `None` means
/// unbounded on that side.
#[derive(Debug, Clone, Default)]
pub struct ValueRange {
    pub lo: Option<String>,
    pub hi: Option<String>,
}

impl ValueRange {
    fn contains(&self, value: &str) -> Result<bool> {
        let lo = self.lo.as_deref().unwrap_or("0");
        match &self.hi {
            Some(hi) => in_decimal_range(value, lo, hi),
            None => {
                let v = chainidx_common::decimal::parse_decimal(value)?;
                let lo = chainidx_common::decimal::parse_decimal(lo)?;
                Ok(v >= lo)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimeRange {
    pub lo: Option<u64>,
    pub hi: Option<u64>,
}

impl TimeRange {
    fn contains(&self, timestamp: u64) -> bool {
        self.lo.map(|lo| timestamp >= lo).unwrap_or(true) && self.hi.map(|hi| timestamp <= hi).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockWithTransactions {
    #[serde(flatten)]
    pub block: Block,
    pub transaction_records: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionWithInternal {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub internal_transactions: Vec<InternalTransaction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressTransactionEntry {
    pub counterpart_hash: String,
    pub value: String,
    pub timestamp: u64,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressTokenTransactionEntry {
    pub transfer: TokenTransfer,
    pub direction: Direction,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressInternalTransactionEntry {
    pub internal_transaction: InternalTransaction,
    pub direction: Direction,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressDetail {
    #[serde(flatten)]
    pub address: Address,
    pub bytecode: Option<String>,
    pub input_transactions: Vec<AddressTransactionEntry>,
    pub output_transactions: Vec<AddressTransactionEntry>,
    pub input_internal_transactions: Vec<AddressInternalTransactionEntry>,
    pub output_internal_transactions: Vec<AddressInternalTransactionEntry>,
    pub input_token_transactions: Vec<AddressTokenTransactionEntry>,
    pub output_token_transactions: Vec<AddressTokenTransactionEntry>,
    pub mined: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenDetail {
    #[serde(flatten)]
    pub token: Token,
    pub token_transactions: Vec<TokenTransfer>,
}

pub struct QueryGatherer<'a> {
    store: &'a Store,
}

impl<'a> QueryGatherer<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    fn load_block(&self, number: u64) -> Result<Block> {
        let bytes = self
            .store
            .get(&block_key(number))?
            .ok_or_else(|| IndexError::NotFound(format!("block {number}")))?;
        codec::decode_block(&bytes)
    }

    fn load_transaction(&self, hash: &str) -> Result<Transaction> {
        let bytes = self
            .store
            .get(&transaction_key(hash))?
            .ok_or_else(|| IndexError::NotFound(format!("transaction {hash}")))?;
        codec::decode_transaction(&bytes)
    }

    fn load_internal_transaction(&self, index: u64) -> Result<InternalTransaction> {
        let bytes = self
            .store
            .get(&internal_tx_key(index))?
            .ok_or_else(|| IndexError::NotFound(format!("internal transaction {index}")))?;
        codec::decode_internal_transaction(&bytes)
    }

    fn load_token_transfer(&self, index: u64) -> Result<TokenTransfer> {
        let bytes = self
            .store
            .get(&token_tx_key(index))?
            .ok_or_else(|| IndexError::NotFound(format!("token transfer {index}")))?;
        codec::decode_token_transfer(&bytes)
    }

    fn internal_transactions_of_tx(&self, hash: &str) -> Result<Vec<InternalTransaction>> {
        let entries = scan_assoc(self.store, hash, AssocTag::TxInternal)?;
        entries
            .into_iter()
            .map(|(_, payload)| {
                let index: u64 = payload
                    .parse()
                    .map_err(|_| IndexError::CorruptRecord(format!("bad int-tx index: {payload}")))?;
                self.load_internal_transaction(index)
            })
            .collect()
    }

    pub fn get_block_by_hash(&self, hash: &str) -> Result<BlockWithTransactions> {
        let number_bytes = self
            .store
            .get(&hash_block_key(hash))?
            .ok_or_else(|| IndexError::NotFound(format!("block hash {hash}")))?;
        let number: u64 = String::from_utf8_lossy(&number_bytes)
            .parse()
            .map_err(|_| IndexError::CorruptRecord("bad hash-block index".to_string()))?;
        self.materialize_block(number)
    }

    pub fn get_block_hash_by_index(&self, number: u64) -> Result<String> {
        Ok(self.load_block(number)?.hash)
    }

    fn materialize_block(&self, number: u64) -> Result<BlockWithTransactions> {
        let block = self.load_block(number)?;
        let transaction_records = block
            .transactions
            .iter()
            .map(|hash| self.load_transaction(hash))
            .collect::<Result<Vec<_>>>()?;
        Ok(BlockWithTransactions {
            block,
            transaction_records,
        })
    }

    pub fn get_blocks_by_time(&self, time: TimeRange, limit: usize) -> Result<Vec<BlockWithTransactions>> {
        let entries = self.store.prefix_scan("timestamp-block-")?;
        let mut matches: Vec<(u64, u64)> = entries
            .into_iter()
            .filter_map(|(key, value)| {
                let timestamp: u64 = key.strip_prefix("timestamp-block-")?.parse().ok()?;
                if !time.contains(timestamp) {
                    return None;
                }
                let number: u64 = String::from_utf8_lossy(&value).parse().ok()?;
                Some((timestamp, number))
            })
            .collect();
        matches.sort_by_key(|(ts, _)| *ts);
        matches.truncate(limit);
        if matches.is_empty() {
            return Err(IndexError::NotFound("no blocks in time range".to_string()));
        }
        matches
            .into_iter()
            .map(|(_, number)| self.materialize_block(number))
            .collect()
    }

    pub fn get_blocks_by_index_range(&self, first: u64, last: u64) -> Result<Vec<BlockWithTransactions>> {
        (first..=last).map(|number| self.materialize_block(number)).collect()
    }

    pub fn get_transaction_by_hash(&self, hash: &str) -> Result<TransactionWithInternal> {
        let transaction = self.load_transaction(hash)?;
        let internal_transactions = self.internal_transactions_of_tx(hash)?;
        Ok(TransactionWithInternal {
            transaction,
            internal_transactions,
        })
    }

    pub fn get_transactions_of_block_by_hash(&self, hash: &str) -> Result<Vec<Transaction>> {
        let block = self.get_block_by_hash(hash)?;
        Ok(block.transaction_records)
    }

    pub fn get_transactions_of_block_by_index(&self, number: u64) -> Result<Vec<Transaction>> {
        let block = self.load_block(number)?;
        block.transactions.iter().map(|hash| self.load_transaction(hash)).collect()
    }

    pub fn get_transactions_of_address(
        &self,
        address: &str,
        time: TimeRange,
        value: ValueRange,
        limit: usize,
    ) -> Result<Vec<AddressTransactionEntry>> {
        let _ = self.require_address(address)?;
        let mut combined = Vec::new();
        for (tag, direction) in [(AssocTag::AddrIn, Direction::In), (AssocTag::AddrOut, Direction::Out)] {
            for (_, payload) in scan_assoc(self.store, address, tag)? {
                let (counterpart_hash, entry_value, timestamp) = parse_value_entry(&payload)?;
                if time.contains(timestamp) && value.contains(&entry_value)? {
                    combined.push(AddressTransactionEntry {
                        counterpart_hash,
                        value: entry_value,
                        timestamp,
                        direction,
                    });
                }
            }
        }
        combined.sort_by_key(|e| e.timestamp);
        combined.truncate(limit);
        if combined.is_empty() {
            return Err(IndexError::NotFound(format!("no transactions for {address}")));
        }
        Ok(combined)
    }

    pub fn get_internal_transactions_of_address(
        &self,
        address: &str,
        time: TimeRange,
        value: ValueRange,
        limit: usize,
    ) -> Result<Vec<AddressInternalTransactionEntry>> {
        let _ = self.require_address(address)?;
        let mut combined = Vec::new();
        for (tag, direction) in [(AssocTag::AddrIntIn, Direction::In), (AssocTag::AddrIntOut, Direction::Out)] {
            for (_, payload) in scan_assoc(self.store, address, tag)? {
                let (index, entry_value, timestamp) = parse_int_tx_entry(&payload)?;
                if !time.contains(timestamp) || !value.contains(&entry_value)? {
                    continue;
                }
                let internal_transaction = self.load_internal_transaction(index)?;
                combined.push(AddressInternalTransactionEntry {
                    internal_transaction,
                    direction,
                });
            }
        }
        combined.sort_by_key(|e| e.internal_transaction.timestamp);
        combined.truncate(limit);
        if combined.is_empty() {
            return Err(IndexError::NotFound(format!(
                "no internal transactions for {address}"
            )));
        }
        Ok(combined)
    }

    pub fn get_token_transactions_of_address(
        &self,
        address: &str,
        time: TimeRange,
        limit: usize,
    ) -> Result<Vec<AddressTokenTransactionEntry>> {
        let _ = self.require_address(address)?;
        let mut combined = Vec::new();
        for (tag, direction) in [(AssocTag::AddrTokenIn, Direction::In), (AssocTag::AddrTokenOut, Direction::Out)]
        {
            for (_, payload) in scan_assoc(self.store, address, tag)? {
                let (index, timestamp) = parse_token_tx_ref(&payload)?;
                if !time.contains(timestamp) {
                    continue;
                }
                let transfer = self.load_token_transfer(index)?;
                combined.push(AddressTokenTransactionEntry { transfer, direction });
            }
        }
        combined.sort_by_key(|e| e.transfer.timestamp);
        combined.truncate(limit);
        if combined.is_empty() {
            return Err(IndexError::NotFound(format!("no token transactions for {address}")));
        }
        Ok(combined)
    }

    fn require_address(&self, address: &str) -> Result<Address> {
        let bytes = self
            .store
            .get(&address_key(address))?
            .ok_or_else(|| IndexError::NotFound(format!("address {address}")))?;
        codec::decode_address(&bytes)
    }

    pub fn get_address(&self, address: &str, time: TimeRange, limit: usize) -> Result<AddressDetail> {
        let record = self.require_address(address)?;
        let bytecode = match &record.code {
            chainidx_common::types::AddressCode::Contract(index) => self
                .store
                .get(&address_contract_key(*index))?
                .map(|b| String::from_utf8_lossy(&b).into_owned()),
            chainidx_common::types::AddressCode::None => None,
        };

        let mut input_transactions = Vec::new();
        let mut output_transactions = Vec::new();
        for (tag, direction, out) in [
            (AssocTag::AddrIn, Direction::In, &mut input_transactions),
            (AssocTag::AddrOut, Direction::Out, &mut output_transactions),
        ] {
            for (_, payload) in scan_assoc(self.store, address, tag)? {
                let (counterpart_hash, value, timestamp) = parse_value_entry(&payload)?;
                if time.contains(timestamp) {
                    out.push(AddressTransactionEntry {
                        counterpart_hash,
                        value,
                        timestamp,
                        direction,
                    });
                }
            }
            out.truncate(limit);
        }

        let mut input_internal_transactions = Vec::new();
        let mut output_internal_transactions = Vec::new();
        for (tag, direction, out) in [
            (AssocTag::AddrIntIn, Direction::In, &mut input_internal_transactions),
            (AssocTag::AddrIntOut, Direction::Out, &mut output_internal_transactions),
        ] {
            for (_, payload) in scan_assoc(self.store, address, tag)? {
                let (index, _value, timestamp) = parse_int_tx_entry(&payload)?;
                if time.contains(timestamp) {
                    out.push(AddressInternalTransactionEntry {
                        internal_transaction: self.load_internal_transaction(index)?,
                        direction,
                    });
                }
            }
            out.truncate(limit);
        }

        let mut input_token_transactions = Vec::new();
        let mut output_token_transactions = Vec::new();
        for (tag, direction, out) in [
            (AssocTag::AddrTokenIn, Direction::In, &mut input_token_transactions),
            (AssocTag::AddrTokenOut, Direction::Out, &mut output_token_transactions),
        ] {
            for (_, payload) in scan_assoc(self.store, address, tag)? {
                let (index, timestamp) = parse_token_tx_ref(&payload)?;
                if time.contains(timestamp) {
                    out.push(AddressTokenTransactionEntry {
                        transfer: self.load_token_transfer(index)?,
                        direction,
                    });
                }
            }
            out.truncate(limit);
        }

        let mined = scan_assoc(self.store, address, AssocTag::AddrMined)?
            .into_iter()
            .map(|(_, block_hash)| block_hash)
            .collect();

        Ok(AddressDetail {
            address: record,
            bytecode,
            input_transactions,
            output_transactions,
            input_internal_transactions,
            output_internal_transactions,
            input_token_transactions,
            output_token_transactions,
            mined,
        })
    }

    pub fn get_balance(&self, address: &str) -> Result<Option<String>> {
        Ok(self.require_address(address)?.balance)
    }

    pub fn get_token(&self, address: &str, time: TimeRange, limit: usize) -> Result<TokenDetail> {
        let bytes = self
            .store
            .get(&token_key(address))?
            .ok_or_else(|| IndexError::NotFound(format!("token {address}")))?;
        let token = codec::decode_token(&bytes)?;
        let mut token_transactions: Vec<TokenTransfer> = scan_assoc(self.store, address, AssocTag::TokenTx)?
            .into_iter()
            .filter_map(|(_, payload)| parse_token_tx_ref(&payload).ok())
            .filter(|(_, timestamp)| time.contains(*timestamp))
            .filter_map(|(index, _)| self.load_token_transfer(index).ok())
            .collect();
        token_transactions.sort_by_key(|t| t.timestamp);
        token_transactions.truncate(limit);
        Ok(TokenDetail {
            token,
            token_transactions,
        })
    }
}

/// Scans an associated-data stream and returns `(index, value)` pairs
/// sorted by the parsed integer index, not by raw key byte order (see the
/// codec's key-width design note).
fn scan_assoc(store: &Store, entity: &str, tag: AssocTag) -> Result<Vec<(u64, String)>> {
    let prefix = associated_data_prefix(entity, tag);
    let raw = store.prefix_scan(&prefix)?;
    let mut items: Vec<(u64, String)> = raw
        .into_iter()
        .filter_map(|(key, value)| {
            let index = parse_assoc_index(&key, &prefix)?;
            let value = String::from_utf8(value).ok()?;
            Some((index, value))
        })
        .collect();
    items.sort_by_key(|(index, _)| *index);
    Ok(items)
}

fn parse_value_entry(payload: &str) -> Result<(String, String, u64)> {
    let parts: Vec<&str> = payload.split('-').collect();
    if parts.len() != 3 {
        return Err(IndexError::CorruptRecord(format!("bad value entry: {payload}")));
    }
    let timestamp = parts[2]
        .parse()
        .map_err(|_| IndexError::CorruptRecord(format!("bad timestamp in {payload}")))?;
    Ok((parts[0].to_string(), parts[1].to_string(), timestamp))
}

fn parse_int_tx_entry(payload: &str) -> Result<(u64, String, u64)> {
    let parts: Vec<&str> = payload.split('-').collect();
    if parts.len() != 3 {
        return Err(IndexError::CorruptRecord(format!("bad internal-tx entry: {payload}")));
    }
    let index = parts[0]
        .parse()
        .map_err(|_| IndexError::CorruptRecord(format!("bad int-tx index in {payload}")))?;
    let timestamp = parts[2]
        .parse()
        .map_err(|_| IndexError::CorruptRecord(format!("bad timestamp in {payload}")))?;
    Ok((index, parts[1].to_string(), timestamp))
}

fn parse_token_tx_ref(payload: &str) -> Result<(u64, u64)> {
    let parts: Vec<&str> = payload.split('-').collect();
    if parts.len() != 2 {
        return Err(IndexError::CorruptRecord(format!("bad token-tx ref: {payload}")));
    }
    let index = parts[0]
        .parse()
        .map_err(|_| IndexError::CorruptRecord(format!("bad token-tx index in {payload}")))?;
    let timestamp = parts[1]
        .parse()
        .map_err(|_| IndexError::CorruptRecord(format!("bad timestamp in {payload}")))?;
    Ok((index, timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainidx_common::keys::associated_data_key;
    use tempfile::tempdir;

    fn sample_block(number: u64, hash: &str, tx_hashes: &[&str]) -> Block {
        Block {
            number,
            hash: hash.to_string(),
            parent_hash: "0xparent".to_string(),
            nonce: "0x0".to_string(),
            logs_bloom: "0x0".to_string(),
            miner: "0xminer".to_string(),
            difficulty: "1".to_string(),
            total_difficulty: "1".to_string(),
            extra_data: "0x".to_string(),
            size: "1".to_string(),
            gas_limit: "1".to_string(),
            gas_used: "1".to_string(),
            timestamp: 1000 + number,
            sha3_uncles: "0x0".to_string(),
            transactions: tx_hashes.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn sample_tx(hash: &str, block_hash: &str, block_number: u64) -> Transaction {
        Transaction {
            block_hash: block_hash.to_string(),
            block_number,
            from: "0xfrom".to_string(),
            to: "0xto".to_string(),
            gas: "1".to_string(),
            gas_price: "1".to_string(),
            hash: hash.to_string(),
            input: "0x".to_string(),
            nonce: "1".to_string(),
            value: "100".to_string(),
            cumulative_gas_used: "1".to_string(),
            gas_used: "1".to_string(),
            logs: vec![],
            contract_address: "".to_string(),
            timestamp: 1000 + block_number,
            internal_tx_index: 0,
        }
    }

    #[test]
    fn get_block_by_hash_expands_transactions() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let block = sample_block(1, "0xblock1", &["0xtx1"]);
        let tx = sample_tx("0xtx1", "0xblock1", 1);
        store.put(&block_key(1), &codec::encode_block(&block).unwrap()).unwrap();
        store.put(&hash_block_key("0xblock1"), b"1").unwrap();
        store
            .put(&transaction_key("0xtx1"), &codec::encode_transaction(&tx).unwrap())
            .unwrap();

        let gatherer = QueryGatherer::new(&store);
        let result = gatherer.get_block_by_hash("0xblock1").unwrap();
        assert_eq!(result.block.number, 1);
        assert_eq!(result.transaction_records.len(), 1);
        assert_eq!(result.transaction_records[0].hash, "0xtx1");
    }

    #[test]
    fn get_block_by_hash_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let gatherer = QueryGatherer::new(&store);
        assert!(matches!(
            gatherer.get_block_by_hash("0xmissing"),
            Err(IndexError::NotFound(_))
        ));
    }

    #[test]
    fn get_transactions_of_address_sorts_by_parsed_index_not_key_order() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let mut addr = Address::new_empty();
        // Simulate 10 input entries so that `-i-9` sorts after `-i-10` in
        // raw byte order; the gatherer must still return them in numeric
        // (insertion) order.
        for i in 1..=10u64 {
            addr.input_tx_index = i;
            let payload = format!("0xtx{i}-{}-{}", i * 10, 2000 + i);
            store
                .put(&associated_data_key("0xaddr", AssocTag::AddrIn, i), payload.as_bytes())
                .unwrap();
        }
        store.put(&address_key("0xaddr"), &codec::encode_address(&addr).unwrap()).unwrap();

        let gatherer = QueryGatherer::new(&store);
        let entries = gatherer
            .get_transactions_of_address("0xaddr", TimeRange::default(), ValueRange::default(), 100)
            .unwrap();
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[0].counterpart_hash, "0xtx1");
        assert_eq!(entries[9].counterpart_hash, "0xtx10");
    }

    #[test]
    fn value_range_filters_large_decimal_values() {
        let range = ValueRange {
            lo: Some("1000000000000000000".to_string()),
            hi: Some("2000000000000000000".to_string()),
        };
        assert!(range.contains("1500000000000000000").unwrap());
        assert!(!range.contains("1".to_string().as_str()).unwrap());
    }

    #[test]
    fn get_balance_reflects_stored_address() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let mut addr = Address::new_empty();
        addr.balance = Some("42".to_string());
        store.put(&address_key("0xaddr"), &codec::encode_address(&addr).unwrap()).unwrap();

        let gatherer = QueryGatherer::new(&store);
        assert_eq!(gatherer.get_balance("0xaddr").unwrap(), Some("42".to_string()));
    }
}
