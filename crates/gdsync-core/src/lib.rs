//! Core domain model and ports for gdsync
//!
//! This crate defines the types shared by every other crate in the
//! workspace:
//!
//! - The unified [`domain::File`] entity (one value for local and remote
//!   entries) and the [`domain::Change`] record binding a source/dest pair
//!   to a root-relative path.
//! - The pure difference classifier ([`domain::file_differences`]) and the
//!   operation / CRUD derivation on `Change`.
//! - The persisted [`domain::IndexRecord`] consumed by the conflict
//!   resolver.
//! - The [`ports::RemoteClient`] port through which the engine talks to
//!   the remote store.
//! - The [`Context`] anchoring a synchronization relationship on disk.

pub mod context;
pub mod domain;
pub mod error;
pub mod ports;
pub mod util;

pub use context::Context;
pub use error::SyncError;
