//! Remote store port (driven/secondary port).
//!
//! The engine never talks HTTP itself; everything it needs from the
//! remote hierarchical store goes through [`RemoteClient`]. The adapter
//! crate implements it against the Drive REST surface; tests implement
//! it over in-memory trees.
//!
//! Bytes-transferred reporting: long-running transfer calls accept an
//! optional `mpsc` sender in their arguments and emit byte counts as the
//! transfer progresses. The executor owns the single receiving end.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::File;

/// Errors surfaced by remote adapters.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The looked-up path has no remote entry. Expected while pushing
    /// new content; fatal when pulling a missing path.
    #[error("remote path does not exist")]
    PathNotExists,

    /// The remote service rejected the request.
    #[error("remote api error: {0}")]
    Api(String),

    /// The request never completed.
    #[error("http transport error: {0}")]
    Http(String),

    /// Credentials are missing or unusable.
    #[error("authentication error: {0}")]
    Auth(String),
}

/// Account and quota summary returned by [`RemoteClient::about`].
#[derive(Debug, Clone, Default)]
pub struct About {
    pub name: String,
    pub quota_bytes_total: u64,
    pub quota_bytes_used: u64,
    pub quota_bytes_used_in_trash: u64,
    pub features: Vec<Feature>,
    pub max_upload_sizes: Vec<UploadSizeLimit>,
}

#[derive(Debug, Clone, Default)]
pub struct Feature {
    pub name: String,
    /// Request limit in queries per second.
    pub rate: f64,
}

#[derive(Debug, Clone, Default)]
pub struct UploadSizeLimit {
    pub kind: String,
    pub size: u64,
}

/// Arguments to [`RemoteClient::upsert_by_comparison`].
#[derive(Debug, Clone, Default)]
pub struct UpsertArgs {
    /// Id of the remote parent directory.
    pub parent_id: String,
    /// Absolute path of the local blob to send, when statable.
    pub fs_abs_path: String,
    /// The side whose content and metadata win.
    pub src: Option<File>,
    /// The current remote entry at this path, if any.
    pub dest: Option<File>,
    /// Type filter bits forwarded from the options.
    pub type_mask: u32,
    pub ignore_checksum: bool,
    /// MIME hint: a coerced value from the options, or the extension of
    /// the source name.
    pub mime_key: Option<String>,
    /// When set the content comes from stdin and cannot be statted.
    pub non_statable: bool,
    /// Bytes-transferred reporting channel.
    pub progress: Option<mpsc::Sender<u64>>,
}

/// Operations the change-set engine requires of the remote store.
#[async_trait::async_trait]
pub trait RemoteClient: Send + Sync {
    /// Resolves a root-relative path to its remote entry.
    async fn find_by_path(&self, path: &str) -> Result<File, RemoteError>;

    /// Lists the children of a remote directory, trash excluded. Hidden
    /// (dot-named) children are skipped unless `include_hidden`.
    async fn find_by_parent_id(
        &self,
        parent_id: &str,
        include_hidden: bool,
    ) -> Result<Vec<File>, RemoteError>;

    /// Lists children of `base_path` whose names match any of the given
    /// patterns.
    async fn find_matches(
        &self,
        base_path: &str,
        patterns: &[String],
        in_trash: bool,
    ) -> Result<Vec<File>, RemoteError>;

    /// Creates or updates a file under `parent_id`, sending content only
    /// when the size/mtime/checksum comparison says the destination is
    /// stale. Returns the resulting remote entry, or `None` when nothing
    /// needed doing.
    async fn upsert_by_comparison(&self, args: &UpsertArgs) -> Result<Option<File>, RemoteError>;

    /// Fetches a remote file's raw content, reporting byte counts on
    /// `progress` as data arrives.
    async fn download(
        &self,
        file: &File,
        progress: Option<mpsc::Sender<u64>>,
    ) -> Result<Vec<u8>, RemoteError>;

    async fn trash(&self, id: &str) -> Result<(), RemoteError>;

    async fn untrash(&self, id: &str) -> Result<(), RemoteError>;

    async fn delete(&self, id: &str) -> Result<(), RemoteError>;

    async fn about(&self) -> Result<About, RemoteError>;
}
