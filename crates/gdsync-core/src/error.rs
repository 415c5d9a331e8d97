//! Error taxonomy for the change-set engine.
//!
//! Resolver errors abort a run before any mutation; executor job errors
//! are logged per file and never fail the run as a whole. Index-store
//! write failures are reported by the caller but deliberately have no
//! variant here: they must never surface as run failures.

use thiserror::Error;

use crate::ports::RemoteError;

/// Errors that abort a push or pull.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The working directory is not inside a gdsync context root.
    #[error("not in a gdsync context (no .gdsync directory found)")]
    NoContext,

    /// The named path exists on neither side.
    #[error("'{0}' doesn't exist locally nor remotely")]
    PathNotExists(String),

    /// An explicitly named target matches the ignore regex.
    #[error("'{0}' is set to be ignored yet is being processed; use --force to override")]
    IgnoredPath(String),

    /// Duplicate-named remote siblings were found while merging.
    #[error("{0} name clash(es) detected; rerun with --ignore-name-clash to override")]
    NameClashes(usize),

    /// Genuine conflicting modifications remain after consulting the index.
    #[error("{count} conflict(s) have prevented a {verb} operation")]
    UnresolvedConflicts { count: usize, verb: &'static str },

    /// The projected change would exceed the remote quota and the user
    /// declined to proceed.
    #[error("the projected change would exceed the drive quota")]
    QuotaExceeded,

    /// A piped push target already exists remotely.
    #[error("'{0}' already exists remotely; use --force to override")]
    AlreadyExistsRemotely(String),

    /// A piped push target is a doc-like file without a raw blob form.
    #[error("'{0}' is a document without raw content and cannot be pushed to")]
    DocLikeTarget(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// True when the error is the remote path-not-found sentinel, which
    /// recursion treats as benign.
    pub fn is_path_not_exists(&self) -> bool {
        matches!(self, SyncError::Remote(RemoteError::PathNotExists))
    }
}
