//! Store Facade: a thin wrapper over a single-column-family RocksDB handle
//! that gives callers `get`/`put`/`prefix_scan`/`write_batch`, a
//! process-wide writer mutex, and a retry policy for transient read errors.

use std::path::Path;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use chainidx_common::error::{IndexError, Result};
use rocksdb::{IteratorMode, Options, WriteBatch, DB};

const READ_RETRY_ATTEMPTS: usize = 3;
const READ_RETRY_DELAY: Duration = Duration::from_millis(50);

/// One pending mutation for a [`Store::commit`] call.
pub enum Op {
    Put { key: String, value: Vec<u8> },
}

/// A guard returned by [`Store::acquire_writer`]; dropping it releases the
/// writer mutex. Mirrors the explicit scoped-acquisition pattern called for
/// in the design notes rather than attaching acquisition to call sites.
pub struct WriterGuard<'a> {
    _guard: std::sync::MutexGuard<'a, ()>,
    store: &'a Store,
}

impl<'a> WriterGuard<'a> {
    /// Atomically applies every op in `ops`. Only callable while holding the
    /// writer guard, which is the only way to obtain one.
    pub fn commit(&self, ops: Vec<Op>) -> Result<()> {
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                Op::Put { key, value } => batch.put(key.as_bytes(), value),
            }
        }
        self.store.db.write(batch)?;
        Ok(())
    }
}

pub struct Store {
    db: DB,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }

    /// Opens the store in read-only mode. The returned handle never takes
    /// the writer mutex and never blocks on a concurrent writer; RocksDB's
    /// snapshot semantics give each `get`/scan a consistent view of already
    /// committed state.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let opts = Options::default();
        let db = DB::open_for_read_only(&opts, path, false)?;
        Ok(Self { db })
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.with_read_retry(|| Ok(self.db.get(key.as_bytes())?))
    }

    pub fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    /// Ascending-order values for every key whose byte prefix equals
    /// `prefix`, stopping at the first non-matching key.
    pub fn prefix_scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        self.with_read_retry(|| {
            let mut out = Vec::new();
            let iter = self.db.iterator(IteratorMode::From(
                prefix.as_bytes(),
                rocksdb::Direction::Forward,
            ));
            for item in iter {
                let (key, value) = item?;
                if !key.starts_with(prefix.as_bytes()) {
                    break;
                }
                let key = String::from_utf8_lossy(&key).into_owned();
                out.push((key, value.to_vec()));
            }
            Ok(out)
        })
    }

    fn with_read_retry<T>(&self, f: impl Fn() -> Result<T>) -> Result<T> {
        let mut last_err = None;
        for attempt in 0..READ_RETRY_ATTEMPTS {
            match f() {
                Ok(v) => return Ok(v),
                Err(e) if is_transient(&e) => {
                    last_err = Some(e);
                    if attempt + 1 < READ_RETRY_ATTEMPTS {
                        thread::sleep(READ_RETRY_DELAY);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(IndexError::StoreUnavailable(
            last_err.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }
}

fn is_transient(err: &IndexError) -> bool {
    matches!(err, IndexError::Store(_))
}

/// A process-wide handle guarding exclusive access to [`Store::commit`].
/// Scoped acquisition: construct once at process start, call
/// `acquire_writer` per batch, hold the guard only for the duration of the
/// commit.
pub struct WriterLock {
    mutex: Mutex<()>,
}

impl WriterLock {
    pub fn new() -> Self {
        Self { mutex: Mutex::new(()) }
    }

    pub fn acquire_writer<'a>(&'a self, store: &'a Store) -> WriterGuard<'a> {
        let guard = self.mutex.lock().expect("writer mutex poisoned");
        WriterGuard { _guard: guard, store }
    }
}

impl Default for WriterLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn put_get_round_trip() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.put("block-1", b"payload").unwrap();
        assert_eq!(store.get("block-1").unwrap(), Some(b"payload".to_vec()));
        assert_eq!(store.get("block-2").unwrap(), None);
    }

    #[test]
    fn prefix_scan_respects_boundary() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.put("associated-data-0xabc-i-1", b"one").unwrap();
        store.put("associated-data-0xabc-i-2", b"two").unwrap();
        store.put("associated-data-0xabc-ii-1", b"other-tag").unwrap();
        store.put("block-1", b"unrelated").unwrap();

        let results = store.prefix_scan("associated-data-0xabc-i-").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].1, b"one");
        assert_eq!(results[1].1, b"two");
    }

    #[test]
    fn writer_lock_commits_atomically() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let lock = WriterLock::new();
        {
            let writer = lock.acquire_writer(&store);
            writer
                .commit(vec![
                    Op::Put {
                        key: "block-1".to_string(),
                        value: b"a".to_vec(),
                    },
                    Op::Put {
                        key: "block-2".to_string(),
                        value: b"b".to_vec(),
                    },
                ])
                .unwrap();
        }
        assert_eq!(store.get("block-1").unwrap(), Some(b"a".to_vec()));
        assert_eq!(store.get("block-2").unwrap(), Some(b"b".to_vec()));
    }
}
