//! Balance Gatherer: resolves current balances for every address touched
//! during a sync, via batched node RPC, without touching any other Address
//! field.

use chainidx_common::error::Result;
use chainidx_common::keys::address_key;
use chainidx_common::types::Address;
use tracing::warn;

use crate::codec;
use crate::rpc::RpcClient;
use crate::spill::SpillFile;
use crate::store::{Op, Store, WriterLock};

pub struct BalanceGatherer<'a> {
    rpc: &'a RpcClient,
}

impl<'a> BalanceGatherer<'a> {
    pub fn new(rpc: &'a RpcClient) -> Self {
        Self { rpc }
    }

    /// Reads the spill file in chunks of `chunk_size`, issuing one batched
    /// `eth_getBalance` request per chunk and committing a balance-only
    /// write batch before moving to the next chunk. Chunks run
    /// sequentially: each one ends in a write under the single-writer
    /// mutex, so overlapping chunks would gain nothing but would violate
    /// that discipline.
    pub async fn resolve_balances(
        &self,
        spill: &SpillFile,
        chunk_size: usize,
        store: &Store,
        writer: &WriterLock,
    ) -> Result<()> {
        for chunk in spill.read_chunks(chunk_size)? {
            if chunk.is_empty() {
                continue;
            }
            let balances = self.rpc.get_balances(&chunk).await?;
            let mut ops = Vec::new();
            for (address, balance) in chunk.iter().zip(balances.into_iter()) {
                let Some(balance) = balance else {
                    warn!(address, "balance lookup failed, leaving balance null");
                    continue;
                };
                let key = address_key(address);
                let existing = store.get(&key)?;
                let mut record = match existing {
                    Some(bytes) => codec::decode_address(&bytes)?,
                    None => Address::new_empty(),
                };
                record.balance = Some(balance);
                ops.push(Op::Put {
                    key,
                    value: codec::encode_address(&record)?,
                });
            }
            if !ops.is_empty() {
                let guard = writer.acquire_writer(store);
                guard.commit(ops)?;
            }
        }
        Ok(())
    }
}
