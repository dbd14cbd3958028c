//! The `progress.txt` sidecar: four newline-separated decimal counters that
//! are the only durable control state outside the store.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chainidx_common::error::{IndexError, Result};
use chainidx_common::types::Progress;

pub fn read(path: &Path) -> Result<Progress> {
    if !path.exists() {
        return Ok(Progress::default());
    }
    let contents = fs::read_to_string(path)?;
    let mut lines = contents.lines();
    let mut next = || -> Result<u64> {
        lines
            .next()
            .ok_or_else(|| IndexError::CorruptRecord("progress.txt: missing field".to_string()))?
            .trim()
            .parse()
            .map_err(|_| IndexError::CorruptRecord("progress.txt: bad counter".to_string()))
    };
    Ok(Progress {
        highest_block: next()?,
        highest_token_tx: next()?,
        highest_contract_code: next()?,
        highest_internal_tx: next()?,
    })
}

/// Writes the four counters and fsyncs before returning, so a crash right
/// after this call cannot leave a torn or stale progress file.
pub fn write(path: &Path, progress: &Progress) -> Result<()> {
    let contents = format!(
        "{}\n{}\n{}\n{}\n",
        progress.highest_block,
        progress.highest_token_tx,
        progress.highest_contract_code,
        progress.highest_internal_tx,
    );
    let tmp_path = path.with_extension("tmp");
    let mut file = File::create(&tmp_path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_zero_progress() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.txt");
        assert_eq!(read(&path).unwrap(), Progress::default());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.txt");
        let progress = Progress {
            highest_block: 100,
            highest_token_tx: 7,
            highest_contract_code: 3,
            highest_internal_tx: 42,
        };
        write(&path, &progress).unwrap();
        assert_eq!(read(&path).unwrap(), progress);
    }
}
