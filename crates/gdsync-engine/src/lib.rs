//! The gdsync change-set engine.
//!
//! Resolves one logical path across the local and remote trees into a
//! flat list of [`Change`](gdsync_core::domain::Change) records, gates
//! them through the conflict resolver and the quota check, and applies
//! the survivors with bounded concurrency.
//!
//! Data flow: user paths -> resolver (walks both trees with the merger)
//! -> flat change list -> conflict gate -> preview / confirmation ->
//! executor -> index updates.

mod conflict;
mod engine;
mod executor;
mod localfs;
mod merger;
mod mount;
mod options;
mod progress;
mod quota;
mod resolver;

#[cfg(test)]
pub(crate) mod testutil;

pub use conflict::{is_conflict, resolve_conflicts, sift};
pub use engine::SyncEngine;
pub use merger::{merge, DirList};
pub use mount::{Mount, MountPoint};
pub use options::SyncOptions;
pub use progress::TransferProgress;
pub use quota::{classify_quota, QuotaStatus};
