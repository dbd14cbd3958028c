//! Encode/decode for the entity records described in the data model.
//!
//! Field separator is NUL (`\0`); nested lists use `|`, `+`, `-` for the
//! second, third and fourth separator levels respectively, per field. None
//! of these can appear in a well-formed record because every field that
//! could plausibly carry one is either a restricted hex string or a plain
//! decimal digit string.

use chainidx_common::error::{IndexError, Result};
use chainidx_common::types::{
    Address, AddressCode, Block, InternalTransaction, LogEntry, Token, TokenContractKind,
    TokenKind, TokenTransfer, Transaction,
};

const FIELD_SEP: char = '\0';
const LOG_SEP: char = '|';
const LOG_TOPIC_JOIN: char = '+';
const TOPIC_SEP: char = '-';
const TX_LIST_SEP: char = '+';

/// Chain-sourced hex text is restricted to this character class; anything
/// else in such a field means either a corrupt upstream record or a
/// separator collision, and either way the record cannot round-trip.
fn validate_hex_like(field: &str, value: &str) -> Result<()> {
    if value
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f' | b'x'))
    {
        Ok(())
    } else {
        Err(IndexError::CorruptRecord(format!(
            "field {field} contains non-hex characters: {value}"
        )))
    }
}

/// Splits on [`FIELD_SEP`], requiring at least `expected` fields. Extra
/// trailing fields are tolerated only if they are all empty (forward
/// compatibility with future schema additions).
fn split_fields(data: &[u8], expected: usize) -> Result<Vec<String>> {
    let s = std::str::from_utf8(data)
        .map_err(|e| IndexError::CorruptRecord(format!("not valid utf-8: {e}")))?;
    let mut parts: Vec<&str> = s.split(FIELD_SEP).collect();
    if parts.len() < expected {
        return Err(IndexError::CorruptRecord(format!(
            "expected at least {expected} fields, got {}",
            parts.len()
        )));
    }
    if parts.len() > expected {
        if parts[expected..].iter().all(|p| p.is_empty()) {
            parts.truncate(expected);
        } else {
            return Err(IndexError::CorruptRecord(format!(
                "expected {expected} fields, got {} with non-empty trailers",
                parts.len()
            )));
        }
    }
    Ok(parts.into_iter().map(str::to_string).collect())
}

fn join_fields(fields: &[&str]) -> Vec<u8> {
    fields.join(&FIELD_SEP.to_string()).into_bytes()
}

fn encode_transactions_list(hashes: &[String]) -> String {
    hashes.join(&TX_LIST_SEP.to_string())
}

fn decode_transactions_list(s: &str) -> Vec<String> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split(TX_LIST_SEP).map(str::to_string).collect()
    }
}

fn encode_logs(logs: &[LogEntry]) -> Result<String> {
    let mut entries = Vec::with_capacity(logs.len());
    for log in logs {
        validate_hex_like("log.data", &log.data)?;
        for topic in &log.topics {
            validate_hex_like("log.topic", topic)?;
        }
        let topics = log.topics.join(&TOPIC_SEP.to_string());
        entries.push(format!("{}{}{}", log.data, LOG_TOPIC_JOIN, topics));
    }
    Ok(entries.join(&LOG_SEP.to_string()))
}

fn decode_logs(s: &str) -> Result<Vec<LogEntry>> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split(LOG_SEP)
        .map(|entry| {
            let (data, topics) = entry.split_once(LOG_TOPIC_JOIN).ok_or_else(|| {
                IndexError::CorruptRecord(format!("malformed log entry: {entry}"))
            })?;
            let topics = if topics.is_empty() {
                Vec::new()
            } else {
                topics.split(TOPIC_SEP).map(str::to_string).collect()
            };
            Ok(LogEntry {
                data: data.to_string(),
                topics,
            })
        })
        .collect()
}

pub fn encode_block(block: &Block) -> Result<Vec<u8>> {
    validate_hex_like("block.hash", &block.hash)?;
    validate_hex_like("block.parent_hash", &block.parent_hash)?;
    validate_hex_like("block.miner", &block.miner)?;
    let number = block.number.to_string();
    let timestamp = block.timestamp.to_string();
    let transactions = encode_transactions_list(&block.transactions);
    Ok(join_fields(&[
        &number,
        &block.hash,
        &block.parent_hash,
        &block.nonce,
        &block.logs_bloom,
        &block.miner,
        &block.difficulty,
        &block.total_difficulty,
        &block.extra_data,
        &block.size,
        &block.gas_limit,
        &block.gas_used,
        &timestamp,
        &block.sha3_uncles,
        &transactions,
    ]))
}

pub fn decode_block(data: &[u8]) -> Result<Block> {
    let f = split_fields(data, 15)?;
    Ok(Block {
        number: f[0]
            .parse()
            .map_err(|_| IndexError::CorruptRecord(format!("bad block number: {}", f[0])))?,
        hash: f[1].clone(),
        parent_hash: f[2].clone(),
        nonce: f[3].clone(),
        logs_bloom: f[4].clone(),
        miner: f[5].clone(),
        difficulty: f[6].clone(),
        total_difficulty: f[7].clone(),
        extra_data: f[8].clone(),
        size: f[9].clone(),
        gas_limit: f[10].clone(),
        gas_used: f[11].clone(),
        timestamp: f[12]
            .parse()
            .map_err(|_| IndexError::CorruptRecord(format!("bad timestamp: {}", f[12])))?,
        sha3_uncles: f[13].clone(),
        transactions: decode_transactions_list(&f[14]),
    })
}

pub fn encode_transaction(tx: &Transaction) -> Result<Vec<u8>> {
    validate_hex_like("tx.block_hash", &tx.block_hash)?;
    validate_hex_like("tx.from", &tx.from)?;
    if !tx.to.is_empty() {
        validate_hex_like("tx.to", &tx.to)?;
    }
    validate_hex_like("tx.hash", &tx.hash)?;
    validate_hex_like("tx.input", &tx.input)?;
    if !tx.contract_address.is_empty() {
        validate_hex_like("tx.contract_address", &tx.contract_address)?;
    }
    let block_number = tx.block_number.to_string();
    let timestamp = tx.timestamp.to_string();
    let internal_tx_index = tx.internal_tx_index.to_string();
    let logs = encode_logs(&tx.logs)?;
    Ok(join_fields(&[
        &tx.block_hash,
        &block_number,
        &tx.from,
        &tx.to,
        &tx.gas,
        &tx.gas_price,
        &tx.hash,
        &tx.input,
        &tx.nonce,
        &tx.value,
        &tx.cumulative_gas_used,
        &tx.gas_used,
        &logs,
        &tx.contract_address,
        &timestamp,
        &internal_tx_index,
    ]))
}

pub fn decode_transaction(data: &[u8]) -> Result<Transaction> {
    let f = split_fields(data, 16)?;
    Ok(Transaction {
        block_hash: f[0].clone(),
        block_number: f[1]
            .parse()
            .map_err(|_| IndexError::CorruptRecord(format!("bad block number: {}", f[1])))?,
        from: f[2].clone(),
        to: f[3].clone(),
        gas: f[4].clone(),
        gas_price: f[5].clone(),
        hash: f[6].clone(),
        input: f[7].clone(),
        nonce: f[8].clone(),
        value: f[9].clone(),
        cumulative_gas_used: f[10].clone(),
        gas_used: f[11].clone(),
        logs: decode_logs(&f[12])?,
        contract_address: f[13].clone(),
        timestamp: f[14]
            .parse()
            .map_err(|_| IndexError::CorruptRecord(format!("bad timestamp: {}", f[14])))?,
        internal_tx_index: f[15]
            .parse()
            .map_err(|_| IndexError::CorruptRecord(format!("bad internal_tx_index: {}", f[15])))?,
    })
}

fn encode_code(code: &AddressCode) -> String {
    match code {
        AddressCode::None => "0x".to_string(),
        AddressCode::Contract(n) => n.to_string(),
    }
}

fn decode_code(s: &str) -> Result<AddressCode> {
    if s == "0x" {
        Ok(AddressCode::None)
    } else {
        s.parse()
            .map(AddressCode::Contract)
            .map_err(|_| IndexError::CorruptRecord(format!("bad address code: {s}")))
    }
}

fn encode_token_contract(kind: TokenContractKind) -> &'static str {
    match kind {
        TokenContractKind::Unknown => "False",
        TokenContractKind::Erc20 => "ERC-20",
        TokenContractKind::Erc721 => "ERC-721",
    }
}

fn decode_token_contract(s: &str) -> Result<TokenContractKind> {
    match s {
        "False" => Ok(TokenContractKind::Unknown),
        "ERC-20" => Ok(TokenContractKind::Erc20),
        "ERC-721" => Ok(TokenContractKind::Erc721),
        other => Err(IndexError::CorruptRecord(format!(
            "bad tokenContract value: {other}"
        ))),
    }
}

pub fn encode_address(addr: &Address) -> Result<Vec<u8>> {
    let balance = addr.balance.clone().unwrap_or_else(|| "null".to_string());
    let code = encode_code(&addr.code);
    let token_contract = encode_token_contract(addr.token_contract);
    Ok(join_fields(&[
        &balance,
        &code,
        token_contract,
        &addr.input_tx_index.to_string(),
        &addr.output_tx_index.to_string(),
        &addr.input_token_tx_index.to_string(),
        &addr.output_token_tx_index.to_string(),
        &addr.input_int_tx_index.to_string(),
        &addr.output_int_tx_index.to_string(),
        &addr.mined_index.to_string(),
    ]))
}

pub fn decode_address(data: &[u8]) -> Result<Address> {
    let f = split_fields(data, 10)?;
    let balance = if f[0] == "null" { None } else { Some(f[0].clone()) };
    Ok(Address {
        balance,
        code: decode_code(&f[1])?,
        token_contract: decode_token_contract(&f[2])?,
        input_tx_index: f[3]
            .parse()
            .map_err(|_| IndexError::CorruptRecord(format!("bad inputTxIndex: {}", f[3])))?,
        output_tx_index: f[4]
            .parse()
            .map_err(|_| IndexError::CorruptRecord(format!("bad outputTxIndex: {}", f[4])))?,
        input_token_tx_index: f[5]
            .parse()
            .map_err(|_| IndexError::CorruptRecord(format!("bad inputTokenTxIndex: {}", f[5])))?,
        output_token_tx_index: f[6]
            .parse()
            .map_err(|_| IndexError::CorruptRecord(format!("bad outputTokenTxIndex: {}", f[6])))?,
        input_int_tx_index: f[7]
            .parse()
            .map_err(|_| IndexError::CorruptRecord(format!("bad inputIntTxIndex: {}", f[7])))?,
        output_int_tx_index: f[8]
            .parse()
            .map_err(|_| IndexError::CorruptRecord(format!("bad outputIntTxIndex: {}", f[8])))?,
        mined_index: f[9]
            .parse()
            .map_err(|_| IndexError::CorruptRecord(format!("bad minedIndex: {}", f[9])))?,
    })
}

fn encode_token_kind(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Erc20 => "ERC-20",
        TokenKind::Erc721 => "ERC-721",
    }
}

fn decode_token_kind(s: &str) -> Result<TokenKind> {
    match s {
        "ERC-20" => Ok(TokenKind::Erc20),
        "ERC-721" => Ok(TokenKind::Erc721),
        other => Err(IndexError::CorruptRecord(format!("bad token type: {other}"))),
    }
}

pub fn encode_token(token: &Token) -> Result<Vec<u8>> {
    Ok(join_fields(&[
        &token.symbol,
        &token.name,
        &token.decimals,
        &token.total_supply,
        encode_token_kind(token.kind),
        &token.tx_index.to_string(),
    ]))
}

pub fn decode_token(data: &[u8]) -> Result<Token> {
    let f = split_fields(data, 6)?;
    Ok(Token {
        symbol: f[0].clone(),
        name: f[1].clone(),
        decimals: f[2].clone(),
        total_supply: f[3].clone(),
        kind: decode_token_kind(&f[4])?,
        tx_index: f[5]
            .parse()
            .map_err(|_| IndexError::CorruptRecord(format!("bad txIndex: {}", f[5])))?,
    })
}

pub fn encode_token_transfer(transfer: &TokenTransfer) -> Result<Vec<u8>> {
    validate_hex_like("token_transfer.token_address", &transfer.token_address)?;
    validate_hex_like("token_transfer.address_from", &transfer.address_from)?;
    validate_hex_like("token_transfer.address_to", &transfer.address_to)?;
    validate_hex_like("token_transfer.transaction_hash", &transfer.transaction_hash)?;
    let timestamp = transfer.timestamp.to_string();
    Ok(join_fields(&[
        &transfer.token_address,
        &transfer.address_from,
        &transfer.address_to,
        &transfer.value,
        &transfer.transaction_hash,
        &timestamp,
    ]))
}

pub fn decode_token_transfer(data: &[u8]) -> Result<TokenTransfer> {
    let f = split_fields(data, 6)?;
    Ok(TokenTransfer {
        token_address: f[0].clone(),
        address_from: f[1].clone(),
        address_to: f[2].clone(),
        value: f[3].clone(),
        transaction_hash: f[4].clone(),
        timestamp: f[5]
            .parse()
            .map_err(|_| IndexError::CorruptRecord(format!("bad timestamp: {}", f[5])))?,
    })
}

pub fn encode_internal_transaction(tx: &InternalTransaction) -> Result<Vec<u8>> {
    validate_hex_like("internal_tx.from", &tx.from)?;
    if !tx.to.is_empty() {
        validate_hex_like("internal_tx.to", &tx.to)?;
    }
    validate_hex_like("internal_tx.transaction_hash", &tx.transaction_hash)?;
    let timestamp = tx.timestamp.to_string();
    Ok(join_fields(&[
        &tx.from,
        &tx.to,
        &tx.value,
        &tx.input,
        &tx.output,
        &tx.trace_type,
        &tx.call_type,
        &tx.reward_type,
        &tx.gas,
        &tx.gas_used,
        &tx.transaction_hash,
        &timestamp,
        &tx.error,
    ]))
}

pub fn decode_internal_transaction(data: &[u8]) -> Result<InternalTransaction> {
    let f = split_fields(data, 13)?;
    Ok(InternalTransaction {
        from: f[0].clone(),
        to: f[1].clone(),
        value: f[2].clone(),
        input: f[3].clone(),
        output: f[4].clone(),
        trace_type: f[5].clone(),
        call_type: f[6].clone(),
        reward_type: f[7].clone(),
        gas: f[8].clone(),
        gas_used: f[9].clone(),
        transaction_hash: f[10].clone(),
        timestamp: f[11]
            .parse()
            .map_err(|_| IndexError::CorruptRecord(format!("bad timestamp: {}", f[11])))?,
        error: f[12].clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block {
            number: 42,
            hash: "0xabc".to_string(),
            parent_hash: "0xdef".to_string(),
            nonce: "0x0".to_string(),
            logs_bloom: "0x0".to_string(),
            miner: "0xminer".to_string(),
            difficulty: "100".to_string(),
            total_difficulty: "200".to_string(),
            extra_data: "0x".to_string(),
            size: "1000".to_string(),
            gas_limit: "30000000".to_string(),
            gas_used: "21000".to_string(),
            timestamp: 1_600_000_000,
            sha3_uncles: "0x0".to_string(),
            transactions: vec!["0xtx1".to_string(), "0xtx2".to_string()],
        }
    }

    #[test]
    fn block_round_trips() {
        let block = sample_block();
        let encoded = encode_block(&block).unwrap();
        assert_eq!(decode_block(&encoded).unwrap(), block);
    }

    #[test]
    fn empty_block_has_empty_transactions_field() {
        let mut block = sample_block();
        block.transactions = Vec::new();
        let encoded = encode_block(&block).unwrap();
        let s = std::str::from_utf8(&encoded).unwrap();
        assert!(s.ends_with('\0'));
        assert_eq!(decode_block(&encoded).unwrap().transactions, Vec::<String>::new());
    }

    #[test]
    fn transaction_round_trips_with_logs() {
        let tx = Transaction {
            block_hash: "0xabc".to_string(),
            block_number: 42,
            from: "0xfrom".to_string(),
            to: "0xto".to_string(),
            gas: "21000".to_string(),
            gas_price: "1".to_string(),
            hash: "0xtx1".to_string(),
            input: "0x".to_string(),
            nonce: "1".to_string(),
            value: "1000".to_string(),
            cumulative_gas_used: "21000".to_string(),
            gas_used: "21000".to_string(),
            logs: vec![
                LogEntry {
                    data: "0xdead".to_string(),
                    topics: vec!["0xtopic1".to_string(), "0xtopic2".to_string()],
                },
                LogEntry {
                    data: "0xbeef".to_string(),
                    topics: vec![],
                },
            ],
            contract_address: "".to_string(),
            timestamp: 1_600_000_000,
            internal_tx_index: 0,
        };
        let encoded = encode_transaction(&tx).unwrap();
        assert_eq!(decode_transaction(&encoded).unwrap(), tx);
    }

    #[test]
    fn address_round_trips_with_null_balance() {
        let addr = Address::new_empty();
        let encoded = encode_address(&addr).unwrap();
        assert_eq!(decode_address(&encoded).unwrap(), addr);
    }

    #[test]
    fn address_round_trips_with_contract_code() {
        let mut addr = Address::new_empty();
        addr.balance = Some("12345".to_string());
        addr.code = AddressCode::Contract(7);
        addr.token_contract = TokenContractKind::Erc20;
        let encoded = encode_address(&addr).unwrap();
        assert_eq!(decode_address(&encoded).unwrap(), addr);
    }

    #[test]
    fn short_record_is_corrupt() {
        let data = b"only\0two".to_vec();
        assert!(matches!(decode_address(&data), Err(IndexError::CorruptRecord(_))));
    }

    #[test]
    fn trailing_empty_fields_are_tolerated() {
        let mut encoded = encode_address(&Address::new_empty()).unwrap();
        encoded.push(0);
        encoded.push(0);
        assert_eq!(decode_address(&encoded).unwrap(), Address::new_empty());
    }

    #[test]
    fn non_hex_data_field_is_rejected() {
        let mut tx = Transaction {
            block_hash: "0xabc".to_string(),
            block_number: 1,
            from: "0xfrom".to_string(),
            to: "0xto".to_string(),
            gas: "1".to_string(),
            gas_price: "1".to_string(),
            hash: "0xtx".to_string(),
            input: "0x".to_string(),
            nonce: "1".to_string(),
            value: "1".to_string(),
            cumulative_gas_used: "1".to_string(),
            gas_used: "1".to_string(),
            logs: vec![],
            contract_address: "".to_string(),
            timestamp: 1,
            internal_tx_index: 0,
        };
        tx.logs.push(LogEntry {
            data: "not-hex!".to_string(),
            topics: vec![],
        });
        assert!(encode_transaction(&tx).is_err());
        tx.logs.clear();
    }

    #[test]
    fn token_and_token_transfer_round_trip() {
        let token = Token {
            symbol: "USDC".to_string(),
            name: "USD Coin".to_string(),
            decimals: "6".to_string(),
            total_supply: "1000000".to_string(),
            kind: TokenKind::Erc20,
            tx_index: 3,
        };
        let encoded = encode_token(&token).unwrap();
        assert_eq!(decode_token(&encoded).unwrap(), token);

        let transfer = TokenTransfer {
            token_address: "0xtoken".to_string(),
            address_from: "0xfrom".to_string(),
            address_to: "0xto".to_string(),
            value: "500".to_string(),
            transaction_hash: "0xtx".to_string(),
            timestamp: 1_600_000_001,
        };
        let encoded = encode_token_transfer(&transfer).unwrap();
        assert_eq!(decode_token_transfer(&encoded).unwrap(), transfer);
    }

    #[test]
    fn internal_transaction_round_trips() {
        let tx = InternalTransaction {
            from: "0xfrom".to_string(),
            to: "0xto".to_string(),
            value: "100".to_string(),
            input: "0x".to_string(),
            output: "0x".to_string(),
            trace_type: "call".to_string(),
            call_type: "call".to_string(),
            reward_type: "".to_string(),
            gas: "21000".to_string(),
            gas_used: "21000".to_string(),
            transaction_hash: "0xtx".to_string(),
            timestamp: 1_600_000_002,
            error: "".to_string(),
        };
        let encoded = encode_internal_transaction(&tx).unwrap();
        assert_eq!(decode_internal_transaction(&encoded).unwrap(), tx);
    }
}
