//! Key schema for the single ordered keyspace described in the data model.
//!
//! Every function here returns the literal byte string used as a RocksDB
//! key. Counters are formatted as plain decimal with no zero-padding; see
//! `DESIGN.md` for the resulting "per width" ordering caveat and how the
//! query layer corrects for it.

/// Associated-data stream discriminator. The payload shape for each tag is
/// documented on [`crate::types`]'s owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssocTag {
    /// Address inputTxIndex: `<txHash>-<value>-<timestamp>`
    AddrIn,
    /// Address outputTxIndex: `<txHash>-<value>-<timestamp>`
    AddrOut,
    /// Address inputTokenTxIndex: `<tokenTxGlobalIndex>-<timestamp>`
    AddrTokenIn,
    /// Address outputTokenTxIndex: `<tokenTxGlobalIndex>-<timestamp>`
    AddrTokenOut,
    /// Address inputIntTxIndex: `<intTxGlobalIndex>-<value>-<timestamp>`
    AddrIntIn,
    /// Address outputIntTxIndex: `<intTxGlobalIndex>-<value>-<timestamp>`
    AddrIntOut,
    /// Address minedIndex: `<blockHash>`
    AddrMined,
    /// Transaction internalTxIndex: `<intTxGlobalIndex>`
    TxInternal,
    /// Token txIndex: `<tokenTxGlobalIndex>-<timestamp>`
    TokenTx,
}

impl AssocTag {
    pub fn as_str(self) -> &'static str {
        match self {
            AssocTag::AddrIn => "i",
            AssocTag::AddrOut => "o",
            AssocTag::AddrTokenIn => "ti",
            AssocTag::AddrTokenOut => "to",
            AssocTag::AddrIntIn => "ii",
            AssocTag::AddrIntOut => "io",
            AssocTag::AddrMined => "b",
            AssocTag::TxInternal => "tit",
            AssocTag::TokenTx => "tt",
        }
    }
}

pub fn block_key(number: u64) -> String {
    format!("block-{number}")
}

pub fn hash_block_key(hash: &str) -> String {
    format!("hash-block-{hash}")
}

pub fn timestamp_block_key(timestamp: u64) -> String {
    format!("timestamp-block-{timestamp}")
}

pub fn transaction_key(hash: &str) -> String {
    format!("transaction-{hash}")
}

pub fn address_key(address: &str) -> String {
    format!("address-{}", address.to_ascii_lowercase())
}

pub fn address_contract_key(code_index: u64) -> String {
    format!("address-contract-{code_index}")
}

pub fn token_key(address: &str) -> String {
    format!("token-{}", address.to_ascii_lowercase())
}

pub fn token_tx_key(global_index: u64) -> String {
    format!("token-tx-{global_index}")
}

pub fn internal_tx_key(global_index: u64) -> String {
    format!("internal-tx-{global_index}")
}

/// `associated-data-<entity>-<tag>-<n>`. `entity` is an address or a
/// transaction hash for address/transaction-scoped tags, or a token address
/// for [`AssocTag::TokenTx`].
pub fn associated_data_key(entity: &str, tag: AssocTag, index: u64) -> String {
    format!("associated-data-{entity}-{}-{index}", tag.as_str())
}

/// The literal prefix to seek to when scanning an associated-data stream.
pub fn associated_data_prefix(entity: &str, tag: AssocTag) -> String {
    format!("associated-data-{entity}-{}-", tag.as_str())
}

/// Parses the trailing `<n>` out of an associated-data key produced by
/// [`associated_data_key`], given the already-known prefix. Returns `None`
/// if the key does not look like a well-formed counter key.
pub fn parse_assoc_index(key: &str, prefix: &str) -> Option<u64> {
    key.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_key_lowercases() {
        assert_eq!(address_key("0xABCDEF"), "address-0xabcdef");
    }

    #[test]
    fn associated_data_round_trip() {
        let prefix = associated_data_prefix("0xabc", AssocTag::AddrMined);
        let key = associated_data_key("0xabc", AssocTag::AddrMined, 7);
        assert_eq!(key, "associated-data-0xabc-b-7");
        assert_eq!(parse_assoc_index(&key, &prefix), Some(7));
    }

    #[test]
    fn prefix_is_exact_boundary() {
        // associated-data-0xabc-i-1 must not match the -ii- prefix.
        let ii_prefix = associated_data_prefix("0xabc", AssocTag::AddrIntIn);
        let i_key = associated_data_key("0xabc", AssocTag::AddrIn, 1);
        assert!(!i_key.starts_with(&ii_prefix));
    }
}
