//! The persisted last-agreed snapshot of a transferred file.

use serde::{Deserialize, Serialize};

/// One record per remote file id, written after a successful transfer.
///
/// Existence of a record means the two sides agreed at `mod_time`; the
/// conflict resolver uses it to tell one-sided edits from true
/// conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub file_id: String,
    pub etag: String,
    pub md5_checksum: String,
    pub mime_type: String,
    /// Seconds since the Unix epoch.
    pub mod_time: i64,
    pub version: i64,
}
