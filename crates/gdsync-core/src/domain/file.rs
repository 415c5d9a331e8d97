//! The unified file entity.
//!
//! One `File` value represents either one entry on disk or one entry in
//! the remote store. Locality is inferred rather than encoded in the
//! type: a purely local file has an empty `id`, and a remote entry that
//! cannot be fetched as a raw blob carries non-empty `export_links`
//! ("doc-like"). Directories always have `size == 0` and never carry a
//! checksum.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use tracing::warn;

use crate::domain::index_record::IndexRecord;
use crate::util::{pretty_bytes, round_to_second};

/// Files larger than this emit a one-time notice before hashing.
pub const BIG_FILE_SIZE: u64 = 400 * 1024 * 1024;

/// One entry on disk or in the remote store.
#[derive(Debug, Clone)]
pub struct File {
    /// Remote file id; empty when the file exists only locally.
    pub id: String,
    /// Path basename, with any remote URL-encoding already decoded.
    pub name: String,
    pub is_dir: bool,
    /// Size in bytes; 0 for directories.
    pub size: u64,
    /// Modification time, rounded to whole seconds, UTC.
    pub mod_time: DateTime<Utc>,
    /// Content checksum; possibly empty. For local files it is computed
    /// lazily through [`File::md5`].
    pub md5_checksum: String,
    pub mime_type: String,
    /// Absolute path on disk for local files; opaque download hint for
    /// remote files.
    pub blob_at: String,
    /// Format name -> export URL. Non-empty iff this remote entry has no
    /// raw blob form.
    pub export_links: HashMap<String, String>,
    pub etag: String,
    /// Monotonically increasing remote version.
    pub version: i64,
    pub alternate_link: String,
    pub owner_names: Vec<String>,
    pub shared: bool,
    /// When set, a computed checksum is cached on this value.
    pub cache_checksum: bool,
    pub checksum_cache: OnceLock<String>,
}

impl Default for File {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            is_dir: false,
            size: 0,
            mod_time: DateTime::UNIX_EPOCH,
            md5_checksum: String::new(),
            mime_type: String::new(),
            blob_at: String::new(),
            export_links: HashMap::new(),
            etag: String::new(),
            version: 0,
            alternate_link: String::new(),
            owner_names: Vec::new(),
            shared: false,
            cache_checksum: false,
            checksum_cache: OnceLock::new(),
        }
    }
}

impl File {
    /// Builds a `File` from a stat of a local path.
    pub fn from_local(abs_path: &Path, meta: &fs::Metadata) -> Self {
        let name = abs_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mod_time = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Self {
            name,
            is_dir: meta.is_dir(),
            size: if meta.is_dir() { 0 } else { meta.len() },
            mod_time: round_to_second(mod_time),
            blob_at: abs_path.to_string_lossy().into_owned(),
            cache_checksum: true,
            ..Self::default()
        }
    }

    /// A stand-in local file for piped pushes, where the content comes
    /// from stdin and cannot be statted.
    pub fn faux_local(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mod_time: round_to_second(Utc::now()),
            ..Self::default()
        }
    }

    /// True when the file exists only on disk.
    pub fn is_local_only(&self) -> bool {
        self.id.is_empty()
    }

    /// True for remote files accessible only through format exports.
    pub fn has_export_links(&self) -> bool {
        !self.export_links.is_empty()
    }

    pub fn large_file(&self) -> bool {
        self.size > BIG_FILE_SIZE
    }

    pub fn same_dir_type(&self, other: &File) -> bool {
        self.is_dir == other.is_dir
    }

    /// Returns the MD5 checksum, computing and caching it for local
    /// files on first use. Directories and unreadable blobs yield an
    /// empty string.
    pub fn md5(&self) -> String {
        if self.is_dir {
            return String::new();
        }
        if !self.md5_checksum.is_empty() {
            return self.md5_checksum.clone();
        }
        if let Some(cached) = self.checksum_cache.get() {
            return cached.clone();
        }
        if self.blob_at.is_empty() || !self.id.is_empty() {
            // Nothing to hash: remote files either carry their checksum
            // or have none (doc-like).
            return String::new();
        }
        if self.large_file() {
            warn!(
                name = %self.name,
                size = %pretty_bytes(self.size),
                "checksumming a large file; this may take a while"
            );
        }
        match hash_blob(Path::new(&self.blob_at)) {
            Ok(sum) => {
                if self.cache_checksum {
                    let _ = self.checksum_cache.set(sum.clone());
                }
                sum
            }
            Err(_) => String::new(),
        }
    }

    /// Snapshot of the fields persisted after a successful transfer.
    pub fn to_index(&self) -> IndexRecord {
        IndexRecord {
            file_id: self.id.clone(),
            etag: self.etag.clone(),
            md5_checksum: self.md5_checksum.clone(),
            mime_type: self.mime_type.clone(),
            mod_time: self.mod_time.timestamp(),
            version: self.version,
        }
    }
}

fn hash_blob(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn from_local_rounds_mod_time_and_zeroes_dir_size() {
        let dir = tempfile::tempdir().unwrap();
        let meta = fs::metadata(dir.path()).unwrap();
        let f = File::from_local(dir.path(), &meta);
        assert!(f.is_dir);
        assert_eq!(f.size, 0);
        assert_eq!(f.mod_time.timestamp_subsec_nanos(), 0);
        assert!(f.is_local_only());
    }

    #[test]
    fn md5_of_directory_is_empty() {
        let f = File {
            is_dir: true,
            ..File::default()
        };
        assert_eq!(f.md5(), "");
    }

    #[test]
    fn md5_computes_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        let mut fh = fs::File::create(&path).unwrap();
        fh.write_all(b"hello world").unwrap();
        drop(fh);

        let meta = fs::metadata(&path).unwrap();
        let f = File::from_local(&path, &meta);
        let sum = f.md5();
        assert_eq!(sum, "5eb63bbbe01eeed093cb22bb8f5acdc3");

        // Second call comes from the cache even if the blob disappears.
        fs::remove_file(&path).unwrap();
        assert_eq!(f.md5(), sum);
    }

    #[test]
    fn md5_prefers_known_checksum() {
        let f = File {
            md5_checksum: "abc123".to_string(),
            blob_at: "/nonexistent".to_string(),
            ..File::default()
        };
        assert_eq!(f.md5(), "abc123");
    }

    #[test]
    fn to_index_snapshots_seconds() {
        let f = File {
            id: "id1".to_string(),
            etag: "e1".to_string(),
            md5_checksum: "m1".to_string(),
            mime_type: "text/plain".to_string(),
            mod_time: DateTime::from_timestamp(1_700_000_042, 0).unwrap(),
            version: 7,
            ..File::default()
        };
        let rec = f.to_index();
        assert_eq!(rec.file_id, "id1");
        assert_eq!(rec.mod_time, 1_700_000_042);
        assert_eq!(rec.version, 7);
    }
}
