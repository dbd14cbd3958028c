//! The address spill file: a plain-text accumulator of every address
//! touched during ingest, consumed by the balance phase at the end of a
//! sync. Append-only during ingest; deduplicated periodically so it stays
//! bounded, and deleted once the balance phase has drained it.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chainidx_common::error::Result;

pub struct SpillFile {
    path: PathBuf,
    batches_since_dedup: u32,
}

/// Run a dedup pass after this many appends, bounding the file's size
/// between passes without doing it on every single batch.
const DEDUP_EVERY_N_BATCHES: u32 = 5;

impl SpillFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            batches_since_dedup: 0,
        }
    }

    /// Appends one address per line. Call once per ingest batch with the
    /// full set of addresses touched by that batch.
    pub fn append_batch(&mut self, addresses: &HashSet<String>) -> Result<()> {
        if !addresses.is_empty() {
            let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            for addr in addresses {
                writeln!(file, "{addr}")?;
            }
        }
        self.batches_since_dedup += 1;
        if self.batches_since_dedup >= DEDUP_EVERY_N_BATCHES {
            self.dedup()?;
            self.batches_since_dedup = 0;
        }
        Ok(())
    }

    /// External sort-unique: read every line, dedup, rewrite.
    fn dedup(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut unique: Vec<String> = reader
            .lines()
            .collect::<std::io::Result<HashSet<String>>>()?
            .into_iter()
            .collect();
        unique.sort_unstable();

        let tmp_path = self.path.with_extension("tmp");
        let mut tmp = File::create(&tmp_path)?;
        for addr in &unique {
            writeln!(tmp, "{addr}")?;
        }
        tmp.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Reads every unique address, in chunks of `chunk_size`, for the
    /// balance phase. Runs a final dedup first so callers never see
    /// duplicates split across chunks.
    pub fn read_chunks(&self, chunk_size: usize) -> Result<Vec<Vec<String>>> {
        self.dedup()?;
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let addresses: Vec<String> = reader.lines().collect::<std::io::Result<_>>()?;
        Ok(addresses
            .chunks(chunk_size.max(1))
            .map(|c| c.to_vec())
            .collect())
    }

    pub fn delete(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn appends_and_dedups() {
        let dir = tempdir().unwrap();
        let mut spill = SpillFile::new(dir.path().join("addresses.txt"));
        let mut batch1 = HashSet::new();
        batch1.insert("0xaaa".to_string());
        batch1.insert("0xbbb".to_string());
        spill.append_batch(&batch1).unwrap();

        let mut batch2 = HashSet::new();
        batch2.insert("0xaaa".to_string());
        spill.append_batch(&batch2).unwrap();

        let chunks = spill.read_chunks(10).unwrap();
        let all: Vec<&String> = chunks.iter().flatten().collect();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn chunking_splits_by_size() {
        let dir = tempdir().unwrap();
        let mut spill = SpillFile::new(dir.path().join("addresses.txt"));
        let mut batch = HashSet::new();
        for i in 0..10 {
            batch.insert(format!("0xaddr{i}"));
        }
        spill.append_batch(&batch).unwrap();

        let chunks = spill.read_chunks(3).unwrap();
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().take(3).all(|c| c.len() == 3));
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempdir().unwrap();
        let mut spill = SpillFile::new(dir.path().join("addresses.txt"));
        let mut batch = HashSet::new();
        batch.insert("0xaaa".to_string());
        spill.append_batch(&batch).unwrap();
        assert!(spill.path().exists());
        spill.delete().unwrap();
        assert!(!spill.path().exists());
    }
}
