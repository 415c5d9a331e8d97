//! File-per-record persistence for index snapshots.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use gdsync_core::domain::IndexRecord;

/// Errors from index persistence. Callers log these and carry on; an
/// index write failure must never fail a transfer.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("index record encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("refusing to index an empty file id")]
    EmptyFileId,
}

/// Directory of serialized index records, keyed by remote file id.
///
/// Each record lives in its own file, so concurrent writers touching
/// distinct ids never collide. Reads are tolerant: any failure (missing
/// file, bad encoding) surfaces as "no record".
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn record_path(&self, file_id: &str) -> PathBuf {
        self.dir.join(file_id)
    }

    /// Writes a record, creating the index directory on demand. The
    /// write goes through a temporary file and a rename so a concurrent
    /// reader never observes a torn record.
    pub fn save(&self, record: &IndexRecord) -> Result<(), IndexError> {
        if record.file_id.is_empty() {
            return Err(IndexError::EmptyFileId);
        }
        fs::create_dir_all(&self.dir)?;

        let target = self.record_path(&record.file_id);
        let tmp = {
            let mut p = target.as_os_str().to_owned();
            p.push(".tmp");
            PathBuf::from(p)
        };
        fs::write(&tmp, serde_json::to_vec(record)?)?;
        fs::rename(&tmp, &target)?;

        debug!(file_id = %record.file_id, "index record written");
        Ok(())
    }

    /// Fetches the record for a file id. Returns `None` on any lookup
    /// failure: a missing record and an unreadable record both mean "no
    /// basis to call this a conflict".
    pub fn lookup(&self, file_id: &str) -> Option<IndexRecord> {
        if file_id.is_empty() {
            return None;
        }
        let data = fs::read(self.record_path(file_id)).ok()?;
        serde_json::from_slice(&data).ok()
    }

    /// Deletes the record for a file id, if present.
    pub fn remove(&self, file_id: &str) -> Result<(), IndexError> {
        if file_id.is_empty() {
            return Ok(());
        }
        match fs::remove_file(self.record_path(file_id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
