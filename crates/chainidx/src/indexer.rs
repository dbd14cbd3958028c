//! The Indexer: drives one ingest batch through the thirteen-pass pipeline
//! described by the data model, then the post-sync balance phase.

use std::path::PathBuf;
use std::time::Duration;

use chainidx_common::error::Result;
use chainidx_common::keys::{
    address_contract_key, address_key, associated_data_key, block_key, hash_block_key,
    internal_tx_key, timestamp_block_key, token_key, token_tx_key, transaction_key, AssocTag,
};
use chainidx_common::types::{
    Address, AddressCode, Block, InternalTransaction, LogEntry, Progress, Token, TokenContractKind,
    TokenKind, TokenTransfer, Transaction,
};
use tracing::{info, warn};

use crate::balance::BalanceGatherer;
use crate::batch::{AddressDeltas, BatchAccumulator, IntTxDelta, TokenTxDelta, ValueDelta};
use crate::codec;
use crate::config::Config;
use crate::progress;
use crate::retriever::CsvRetriever;
use crate::rpc::RpcClient;
use crate::spill::SpillFile;
use crate::store::{Op, Store, WriterLock};

/// Blocks the node's head may advance past the balance phase's start height
/// before a sync is considered to have "fallen behind" and needs another
/// pass.
const FELL_BEHIND_THRESHOLD: u64 = 5;

pub struct Indexer {
    config: Config,
    store: Store,
    writer: WriterLock,
    rpc: RpcClient,
    retriever: CsvRetriever,
    spill: SpillFile,
    progress_path: PathBuf,
}

impl Indexer {
    pub fn new(config: Config) -> Result<Self> {
        let store = Store::open(std::path::Path::new(&config.store_path))?;
        let rpc = RpcClient::new(config.node_rpc_url.clone());
        let data_dir = PathBuf::from(&config.data_dir);
        let retriever = CsvRetriever::new(config.etl_command_template.clone(), data_dir.join("csv"));
        let spill = SpillFile::new(data_dir.join("addresses.txt"));
        let progress_path = data_dir.join("progress.txt");
        Ok(Self {
            config,
            store,
            writer: WriterLock::new(),
            rpc,
            retriever,
            spill,
            progress_path,
        })
    }

    /// Runs forever: each sync iteration catches the store up to the node's
    /// (confirmation-adjusted) head, resolves balances, and repeats if the
    /// node advanced meaningfully during that work; then sleeps for the
    /// configured refresh interval and starts over.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.sync_once().await?;
            tokio::time::sleep(Duration::from_secs(self.config.refresh_interval_secs)).await;
        }
    }

    async fn sync_once(&mut self) -> Result<()> {
        loop {
            self.ingest_to_head().await?;
            let fell_behind = self.run_balance_phase().await?;
            if !fell_behind {
                return Ok(());
            }
            info!("node advanced during balance phase, starting another sync iteration");
        }
    }

    /// Step 1 repeated: process half-open windows until the window would be
    /// empty.
    async fn ingest_to_head(&mut self) -> Result<()> {
        loop {
            let current = progress::read(&self.progress_path)?;
            let head = self.rpc.block_number().await?;
            let target_end = head.saturating_sub(self.config.confirmations);
            if current.highest_block >= target_end {
                return Ok(());
            }
            let end = target_end.min(current.highest_block + self.config.bulk_size);
            self.process_window(current.highest_block, end, current).await?;
        }
    }

    async fn process_window(&mut self, first: u64, last: u64, progress: Progress) -> Result<()> {
        info!(first, last, "processing block window");
        let window = if self.config.use_rpc_retriever {
            crate::retriever::RpcRetriever::new(&self.rpc)
                .extract(first, last, self.config.gather_internal_transactions)
                .await?
        } else {
            self.retriever.extract(first, last)?
        };
        let (batch, mut progress) = self.build_batch(&window, progress)?;
        self.spill.append_batch(&batch.touched_addresses)?;
        progress.highest_block = last;
        self.commit_batch(batch, progress)?;
        Ok(())
    }

    /// Steps 3 through 10: the pure, synchronous core of the pipeline.
    /// Takes an already-extracted window and the progress counters as they
    /// stood before this window, and returns the accumulated batch plus the
    /// counters as they stand after it — no I/O besides read-only store
    /// lookups for address classification already on record. Kept separate
    /// from extraction (network/subprocess) and commit (the single writer)
    /// so the pipeline logic can be exercised without either.
    fn build_batch(
        &self,
        window: &crate::retriever::ExtractedWindow,
        mut progress: Progress,
    ) -> Result<(BatchAccumulator, Progress)> {
        let mut batch = BatchAccumulator::new();

        // 3. Blocks pass.
        for row in &window.blocks {
            batch.block_hash_by_number.insert(row.number, row.hash.clone());
            batch.blocks.insert(
                row.hash.clone(),
                Block {
                    number: row.number,
                    hash: row.hash.clone(),
                    parent_hash: row.parent_hash.clone(),
                    nonce: row.nonce.clone(),
                    logs_bloom: row.logs_bloom.clone(),
                    miner: row.miner.clone(),
                    difficulty: row.difficulty.clone(),
                    total_difficulty: row.total_difficulty.clone(),
                    extra_data: row.extra_data.clone(),
                    size: row.size.clone(),
                    gas_limit: row.gas_limit.clone(),
                    gas_used: row.gas_used.clone(),
                    timestamp: row.timestamp,
                    sha3_uncles: row.sha3_uncles.clone(),
                    transactions: Vec::new(),
                },
            );
        }

        // 4. Transactions pass (rows already re-sorted by the retriever).
        for row in &window.transactions {
            let timestamp = batch
                .blocks
                .get(&row.block_hash)
                .map(|b| b.timestamp)
                .unwrap_or(0);
            if let Some(block) = batch.blocks.get_mut(&row.block_hash) {
                block.transactions.push(row.hash.clone());
            }
            batch.tx_by_block_index.insert(
                (row.block_number, row.transaction_index),
                row.hash.clone(),
            );
            batch.transactions.insert(
                row.hash.clone(),
                Transaction {
                    block_hash: row.block_hash.clone(),
                    block_number: row.block_number,
                    from: row.from_address.clone(),
                    to: row.to_address.clone(),
                    gas: row.gas.clone(),
                    gas_price: row.gas_price.clone(),
                    hash: row.hash.clone(),
                    input: row.input.clone(),
                    nonce: row.nonce.clone(),
                    value: row.value.clone(),
                    cumulative_gas_used: String::new(),
                    gas_used: String::new(),
                    logs: Vec::new(),
                    contract_address: String::new(),
                    timestamp,
                    internal_tx_index: 0,
                },
            );
            if !row.to_address.is_empty() {
                batch.address_entry(&row.to_address).new_input_txs.push(ValueDelta {
                    counterpart_hash: row.hash.clone(),
                    value: row.value.clone(),
                    timestamp,
                });
            }
            // A contract-creation transaction's `to` is empty and is not
            // registered as an address.
            batch.address_entry(&row.from_address).new_output_txs.push(ValueDelta {
                counterpart_hash: row.hash.clone(),
                value: row.value.clone(),
                timestamp,
            });
        }

        // 5. Receipts pass.
        for row in &window.receipts {
            if let Some(tx) = batch.transactions.get_mut(&row.transaction_hash) {
                tx.cumulative_gas_used = row.cumulative_gas_used.clone();
                tx.gas_used = row.gas_used.clone();
                tx.contract_address = row.contract_address.clone();
            }
            if !row.contract_address.is_empty() {
                batch.address_entry(&row.contract_address);
            }
        }
        for row in &window.logs {
            if let Some(tx) = batch.transactions.get_mut(&row.transaction_hash) {
                let topics = if row.topics.is_empty() {
                    Vec::new()
                } else {
                    row.topics.split(',').map(str::to_string).collect()
                };
                tx.logs.push(LogEntry {
                    data: row.data.clone(),
                    topics,
                });
            }
        }

        // 6. Contracts pass.
        for row in &window.contracts {
            progress.highest_contract_code += 1;
            let index = progress.highest_contract_code;
            batch.contract_codes.push(crate::batch::ContractCode {
                address: row.address.clone(),
                bytecode: row.bytecode.clone(),
            });
            let kind = if row.is_erc20 {
                TokenContractKind::Erc20
            } else if row.is_erc721 {
                TokenContractKind::Erc721
            } else {
                TokenContractKind::Unknown
            };
            let entry = batch.address_entry(&row.address);
            entry.discovered_code = Some(AddressCode::Contract(index));
            if !matches!(kind, TokenContractKind::Unknown) {
                entry.discovered_token_contract = Some(kind);
            }
        }

        // 7. Tokens & token-transfers pass.
        if self.config.gather_token_info {
            let contract_kinds: std::collections::HashMap<&str, TokenKind> = window
                .contracts
                .iter()
                .filter_map(|c| {
                    if c.is_erc721 {
                        Some((c.address.as_str(), TokenKind::Erc721))
                    } else if c.is_erc20 {
                        Some((c.address.as_str(), TokenKind::Erc20))
                    } else {
                        None
                    }
                })
                .collect();
            for row in &window.tokens {
                let kind = match contract_kinds.get(row.address.as_str()) {
                    Some(kind) => *kind,
                    None => match self.store.get(&address_key(&row.address))? {
                        Some(bytes) => match codec::decode_address(&bytes)?.token_contract {
                            TokenContractKind::Erc721 => TokenKind::Erc721,
                            _ => TokenKind::Erc20,
                        },
                        None => TokenKind::Erc20,
                    },
                };
                batch.tokens.insert(
                    row.address.clone(),
                    Token {
                        symbol: row.symbol.clone(),
                        name: row.name.clone(),
                        decimals: row.decimals.clone(),
                        total_supply: row.total_supply.clone(),
                        kind,
                        tx_index: 0,
                    },
                );
            }
            let known_tokens: std::collections::HashSet<String> = window
                .tokens
                .iter()
                .map(|t| t.address.clone())
                .chain(batch.tokens.keys().cloned())
                .collect();
            for row in &window.token_transfers {
                let token_known = known_tokens.contains(&row.token_address)
                    || self.store.get(&token_key(&row.token_address))?.is_some();
                if !token_known {
                    continue;
                }
                let timestamp = batch
                    .transactions
                    .get(&row.transaction_hash)
                    .map(|t| t.timestamp)
                    .unwrap_or(0);
                progress.highest_token_tx += 1;
                let token_tx_index = progress.highest_token_tx;
                batch.token_transfers.push(TokenTransfer {
                    token_address: row.token_address.clone(),
                    address_from: row.from_address.clone(),
                    address_to: row.to_address.clone(),
                    value: row.value.clone(),
                    transaction_hash: row.transaction_hash.clone(),
                    timestamp,
                });
                if let Some(token) = batch.tokens.get_mut(&row.token_address) {
                    token.tx_index += 1;
                    batch.token_tx_stream.push(crate::batch::TokenTxStreamEntry {
                        token_address: row.token_address.clone(),
                        tx_index: token.tx_index,
                        token_tx_index,
                        timestamp,
                    });
                }
                batch.address_entry(&row.to_address).new_input_token_txs.push(TokenTxDelta {
                    token_tx_index,
                    timestamp,
                });
                batch.address_entry(&row.from_address).new_output_token_txs.push(TokenTxDelta {
                    token_tx_index,
                    timestamp,
                });
            }
        }

        // 8. Miners pass.
        for row in &window.blocks {
            batch.address_entry(&row.miner).new_mined.push(row.hash.clone());
        }

        // 9. Internal transactions pass.
        if self.config.gather_internal_transactions {
            for row in &window.traces {
                let Some(tx_hash) = batch
                    .tx_by_block_index
                    .get(&(row.block_number, row.transaction_index))
                    .cloned()
                else {
                    warn!(
                        row.block_number,
                        row.transaction_index,
                        "trace with no matching transaction, discovering addresses only"
                    );
                    // 10. Trace-only address discovery: even without a
                    // joinable transaction, the addresses this trace touched
                    // still need balance resolution.
                    if !row.to_address.is_empty() {
                        batch.address_entry(&row.to_address);
                    }
                    if !row.from_address.is_empty() {
                        batch.address_entry(&row.from_address);
                    }
                    continue;
                };
                progress.highest_internal_tx += 1;
                let int_tx_index = progress.highest_internal_tx;
                let timestamp = batch.transactions.get(&tx_hash).map(|t| t.timestamp).unwrap_or(0);
                batch.internal_transactions.push(InternalTransaction {
                    from: row.from_address.clone(),
                    to: row.to_address.clone(),
                    value: row.value.clone(),
                    input: row.input.clone(),
                    output: row.output.clone(),
                    trace_type: row.trace_type.clone(),
                    call_type: row.call_type.clone(),
                    reward_type: row.reward_type.clone(),
                    gas: row.gas.clone(),
                    gas_used: row.gas_used.clone(),
                    transaction_hash: tx_hash.clone(),
                    timestamp,
                    error: row.error.clone(),
                });
                let local_index = match batch.transactions.get_mut(&tx_hash) {
                    Some(tx) => {
                        tx.internal_tx_index += 1;
                        tx.internal_tx_index
                    }
                    None => 0,
                };
                batch.internal_transaction_local_indices.push(local_index);
                if !row.to_address.is_empty() {
                    batch.address_entry(&row.to_address).new_input_int_txs.push(IntTxDelta {
                        int_tx_index,
                        value: row.value.clone(),
                        timestamp,
                    });
                }
                batch.address_entry(&row.from_address).new_output_int_txs.push(IntTxDelta {
                    int_tx_index,
                    value: row.value.clone(),
                    timestamp,
                });
            }
        }

        Ok((batch, progress))
    }

    /// 11. Counter resolution, plus 13. Commit: reads each touched
    /// address's existing record, computes new counters, builds the
    /// associated-data entries at the correct new indices, and writes
    /// everything in one atomic batch.
    fn commit_batch(&self, batch: BatchAccumulator, progress: Progress) -> Result<()> {
        let mut ops = Vec::new();

        for block in batch.blocks.values() {
            ops.push(Op::Put {
                key: block_key(block.number),
                value: codec::encode_block(block)?,
            });
            ops.push(Op::Put {
                key: hash_block_key(&block.hash),
                value: block.number.to_string().into_bytes(),
            });
            ops.push(Op::Put {
                key: timestamp_block_key(block.timestamp),
                value: block.number.to_string().into_bytes(),
            });
        }

        for tx in batch.transactions.values() {
            ops.push(Op::Put {
                key: transaction_key(&tx.hash),
                value: codec::encode_transaction(tx)?,
            });
        }

        for contract in &batch.contract_codes {
            // The index was already assigned during the contracts pass and
            // recorded on the owning address's `discovered_code`.
            if let Some(AddressCode::Contract(index)) = batch
                .addresses
                .get(&contract.address)
                .and_then(|d| d.discovered_code.clone())
            {
                ops.push(Op::Put {
                    key: address_contract_key(index),
                    value: contract.bytecode.clone().into_bytes(),
                });
            }
        }

        for (address, token) in &batch.tokens {
            ops.push(Op::Put {
                key: token_key(address),
                value: codec::encode_token(token)?,
            });
        }

        for (index, transfer) in (progress.highest_token_tx - batch.token_transfers.len() as u64 + 1..)
            .zip(batch.token_transfers.iter())
        {
            ops.push(Op::Put {
                key: token_tx_key(index),
                value: codec::encode_token_transfer(transfer)?,
            });
        }

        for entry in &batch.token_tx_stream {
            ops.push(Op::Put {
                key: associated_data_key(&entry.token_address, AssocTag::TokenTx, entry.tx_index),
                value: format!("{}-{}", entry.token_tx_index, entry.timestamp).into_bytes(),
            });
        }

        for ((index, tx), local_index) in (progress.highest_internal_tx - batch.internal_transactions.len() as u64 + 1..)
            .zip(batch.internal_transactions.iter())
            .zip(batch.internal_transaction_local_indices.iter())
        {
            ops.push(Op::Put {
                key: internal_tx_key(index),
                value: codec::encode_internal_transaction(tx)?,
            });
            if *local_index > 0 {
                ops.push(Op::Put {
                    key: associated_data_key(&tx.transaction_hash, AssocTag::TxInternal, *local_index),
                    value: index.to_string().into_bytes(),
                });
            }
        }

        for (address, deltas) in &batch.addresses {
            self.resolve_address(address, deltas, &mut ops)?;
        }

        let guard = self.writer.acquire_writer(&self.store);
        guard.commit(ops)?;
        drop(guard);
        progress::write(&self.progress_path, &progress)?;
        Ok(())
    }

    fn resolve_address(&self, address: &str, deltas: &AddressDeltas, ops: &mut Vec<Op>) -> Result<()> {
        let key = address_key(address);
        let existing = self.store.get(&key)?;
        let mut record = match existing {
            Some(bytes) => codec::decode_address(&bytes)?,
            None => Address::new_empty(),
        };

        // Contract code and classification are immutable once recorded;
        // only adopt this batch's discovery if the store had nothing yet.
        if matches!(record.code, AddressCode::None) {
            if let Some(code) = &deltas.discovered_code {
                record.code = code.clone();
            }
        }
        if matches!(record.token_contract, TokenContractKind::Unknown) {
            if let Some(kind) = deltas.discovered_token_contract {
                record.token_contract = kind;
            }
        }

        for delta in &deltas.new_input_txs {
            record.input_tx_index += 1;
            ops.push(Op::Put {
                key: associated_data_key(address, AssocTag::AddrIn, record.input_tx_index),
                value: format!("{}-{}-{}", delta.counterpart_hash, delta.value, delta.timestamp)
                    .into_bytes(),
            });
        }
        for delta in &deltas.new_output_txs {
            record.output_tx_index += 1;
            ops.push(Op::Put {
                key: associated_data_key(address, AssocTag::AddrOut, record.output_tx_index),
                value: format!("{}-{}-{}", delta.counterpart_hash, delta.value, delta.timestamp)
                    .into_bytes(),
            });
        }
        for delta in &deltas.new_input_token_txs {
            record.input_token_tx_index += 1;
            ops.push(Op::Put {
                key: associated_data_key(address, AssocTag::AddrTokenIn, record.input_token_tx_index),
                value: format!("{}-{}", delta.token_tx_index, delta.timestamp).into_bytes(),
            });
        }
        for delta in &deltas.new_output_token_txs {
            record.output_token_tx_index += 1;
            ops.push(Op::Put {
                key: associated_data_key(address, AssocTag::AddrTokenOut, record.output_token_tx_index),
                value: format!("{}-{}", delta.token_tx_index, delta.timestamp).into_bytes(),
            });
        }
        for delta in &deltas.new_input_int_txs {
            record.input_int_tx_index += 1;
            ops.push(Op::Put {
                key: associated_data_key(address, AssocTag::AddrIntIn, record.input_int_tx_index),
                value: format!("{}-{}-{}", delta.int_tx_index, delta.value, delta.timestamp).into_bytes(),
            });
        }
        for delta in &deltas.new_output_int_txs {
            record.output_int_tx_index += 1;
            ops.push(Op::Put {
                key: associated_data_key(address, AssocTag::AddrIntOut, record.output_int_tx_index),
                value: format!("{}-{}-{}", delta.int_tx_index, delta.value, delta.timestamp).into_bytes(),
            });
        }
        for block_hash in &deltas.new_mined {
            record.mined_index += 1;
            ops.push(Op::Put {
                key: associated_data_key(address, AssocTag::AddrMined, record.mined_index),
                value: block_hash.clone().into_bytes(),
            });
        }

        ops.push(Op::Put {
            key,
            value: codec::encode_address(&record)?,
        });
        Ok(())
    }

    /// The post-sync balance phase: resolve `eth_getBalance` for every
    /// address touched since the spill file was last drained. Returns
    /// whether the node advanced far enough during this phase to warrant
    /// another sync iteration.
    async fn run_balance_phase(&mut self) -> Result<bool> {
        let start_height = self.rpc.block_number().await?;
        let gatherer = BalanceGatherer::new(&self.rpc);
        gatherer
            .resolve_balances(&self.spill, self.config.bulk_size as usize, &self.store, &self.writer)
            .await?;
        self.spill.delete()?;
        let end_height = self.rpc.block_number().await?;
        Ok(end_height.saturating_sub(start_height) > FELL_BEHIND_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retriever::{BlockRow, ContractRow, ExtractedWindow, TokenRow, TokenTransferRow, TraceRow, TransactionRow};
    use chainidx_common::keys::{address_key, associated_data_key, AssocTag};
    use tempfile::tempdir;

    fn test_indexer(dir: &std::path::Path) -> Indexer {
        let config = Config {
            node_rpc_url: "http://localhost:0".to_string(),
            store_path: dir.join("store").display().to_string(),
            data_dir: dir.join("data").display().to_string(),
            confirmations: 12,
            bulk_size: 10_000,
            refresh_interval_secs: 15,
            gather_internal_transactions: true,
            gather_token_info: true,
            rpc_workers: 10,
            etl_command_template: "extractor --start {start} --end {end} --out {out_dir}".to_string(),
            use_rpc_retriever: false,
        };
        Indexer::new(config).unwrap()
    }

    fn sample_window() -> ExtractedWindow {
        let mut window = ExtractedWindow {
            blocks: vec![BlockRow {
                number: 100,
                hash: "0xblock100".to_string(),
                parent_hash: "0xblock99".to_string(),
                nonce: "0x0".to_string(),
                logs_bloom: "0x0".to_string(),
                miner: "0xminer".to_string(),
                difficulty: "1".to_string(),
                total_difficulty: "1".to_string(),
                extra_data: "0x".to_string(),
                size: "1".to_string(),
                gas_limit: "21000".to_string(),
                gas_used: "21000".to_string(),
                timestamp: 1_700_000_000,
                sha3_uncles: "0x0".to_string(),
            }],
            transactions: vec![TransactionRow {
                block_hash: "0xblock100".to_string(),
                block_number: 100,
                from_address: "0xfrom".to_string(),
                to_address: "0xto".to_string(),
                gas: "21000".to_string(),
                gas_price: "1".to_string(),
                hash: "0xtx1".to_string(),
                input: "0x".to_string(),
                nonce: "0".to_string(),
                value: "1000".to_string(),
                transaction_index: 0,
            }],
            contracts: vec![ContractRow {
                address: "0xcontract".to_string(),
                bytecode: "0x60006000".to_string(),
                is_erc20: true,
                is_erc721: false,
            }],
            tokens: vec![TokenRow {
                address: "0xcontract".to_string(),
                symbol: "TKN".to_string(),
                name: "Token".to_string(),
                decimals: "18".to_string(),
                total_supply: "1000000".to_string(),
            }],
            token_transfers: vec![TokenTransferRow {
                token_address: "0xcontract".to_string(),
                from_address: "0xfrom".to_string(),
                to_address: "0xto".to_string(),
                value: "500".to_string(),
                transaction_hash: "0xtx1".to_string(),
            }],
            traces: vec![TraceRow {
                block_number: 100,
                transaction_index: 0,
                from_address: "0xfrom".to_string(),
                to_address: "0xto".to_string(),
                value: "10".to_string(),
                input: "0x".to_string(),
                output: "0x".to_string(),
                trace_type: "call".to_string(),
                call_type: "call".to_string(),
                reward_type: "".to_string(),
                gas: "2300".to_string(),
                gas_used: "2300".to_string(),
                error: "".to_string(),
            }],
            ..Default::default()
        };
        window.resort_transactions();
        window
    }

    #[test]
    fn build_batch_and_commit_populates_store() {
        let dir = tempdir().unwrap();
        let indexer = test_indexer(dir.path());
        let window = sample_window();

        let (batch, progress) = indexer.build_batch(&window, Progress::default()).unwrap();
        assert_eq!(progress.highest_contract_code, 1);
        assert_eq!(progress.highest_token_tx, 1);
        assert_eq!(progress.highest_internal_tx, 1);

        indexer.spill.append_batch(&batch.touched_addresses).unwrap();
        let mut progress = progress;
        progress.highest_block = 100;
        indexer.commit_batch(batch, progress).unwrap();

        let miner = codec::decode_address(&indexer.store.get(&address_key("0xminer")).unwrap().unwrap()).unwrap();
        assert_eq!(miner.mined_index, 1);
        let mined_entry = indexer
            .store
            .get(&associated_data_key("0xminer", AssocTag::AddrMined, 1))
            .unwrap()
            .unwrap();
        assert_eq!(String::from_utf8(mined_entry).unwrap(), "0xblock100");

        let contract = codec::decode_address(&indexer.store.get(&address_key("0xcontract")).unwrap().unwrap()).unwrap();
        assert!(matches!(contract.code, AddressCode::Contract(1)));
        assert!(matches!(contract.token_contract, TokenContractKind::Erc20));

        let stored_progress = progress::read(&indexer.progress_path).unwrap();
        assert_eq!(stored_progress.highest_block, 100);
    }

    #[test]
    fn token_transfer_for_unknown_token_is_dropped() {
        let dir = tempdir().unwrap();
        let indexer = test_indexer(dir.path());
        let mut window = sample_window();
        window.contracts.clear();
        window.tokens.clear();
        window.token_transfers[0].token_address = "0xunknown".to_string();

        let (batch, _) = indexer.build_batch(&window, Progress::default()).unwrap();
        assert!(batch.token_transfers.is_empty());
    }
}
