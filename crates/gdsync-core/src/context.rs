//! Context root discovery and metadata paths.
//!
//! A context root is the local directory anchoring a synchronization
//! relationship. Its `.gdsync` metadata subdirectory holds credentials
//! and the index store; the filesystem walker must never descend into it.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::warn;

use crate::error::SyncError;

/// Name of the metadata subdirectory inside the context root.
pub const METADATA_DIR: &str = ".gdsync";

/// Name of the ignore file in the context root.
pub const DRIVEIGNORE_FILE: &str = ".driveignore";

/// Subdirectory of the metadata dir holding one index record per file id.
const INDICES_DIR: &str = "indices";

/// Credential blob written by the auth bootstrap.
const CREDENTIALS_FILE: &str = "credentials.json";

/// A local directory tree bound to a remote drive.
#[derive(Debug, Clone)]
pub struct Context {
    root: PathBuf,
}

impl Context {
    /// Binds a context to an existing root directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Walks up from `start` looking for a directory that contains the
    /// metadata subdirectory.
    pub fn discover(start: &Path) -> Result<Self, SyncError> {
        let mut cur = Some(start);
        while let Some(dir) = cur {
            if dir.join(METADATA_DIR).is_dir() {
                return Ok(Self::new(dir.to_path_buf()));
            }
            cur = dir.parent();
        }
        Err(SyncError::NoContext)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a root-relative, "/"-separated path to an absolute path
    /// on disk. `"/"` and `""` both denote the root itself.
    pub fn abs_path_of(&self, rel: &str) -> PathBuf {
        let trimmed = rel.trim_start_matches('/');
        if trimmed.is_empty() {
            self.root.clone()
        } else {
            self.root.join(trimmed)
        }
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR)
    }

    pub fn indices_dir(&self) -> PathBuf {
        self.metadata_dir().join(INDICES_DIR)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.metadata_dir().join(CREDENTIALS_FILE)
    }

    /// Compiles the `.driveignore` file, if present, into one composite
    /// regex. Blank lines and `#` comments are skipped; the remaining
    /// clauses are joined with `|`. Returns `None` when the file is
    /// missing, empty, or does not compile.
    pub fn ignore_regex(&self) -> Option<Regex> {
        let path = self.root.join(DRIVEIGNORE_FILE);
        let clauses = read_commented_file(&path, "#").ok()?;
        if clauses.is_empty() {
            return None;
        }
        match Regex::new(&clauses.join("|")) {
            Ok(re) => Some(re),
            Err(err) => {
                warn!(path = %path.display(), %err, "ignoring unparseable driveignore");
                None
            }
        }
    }
}

/// Reads a plain-text file, dropping blank lines and lines starting with
/// `comment`.
pub fn read_commented_file(path: &Path, comment: &str) -> std::io::Result<Vec<String>> {
    let file = fs::File::open(path)?;
    let mut clauses = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with(comment) {
            continue;
        }
        clauses.push(line.to_string());
    }
    Ok(clauses)
}
