//! Drive REST adapter.
//!
//! Implements the [`RemoteClient`](gdsync_core::ports::RemoteClient)
//! port against a Drive-v2-style REST surface, with file-based
//! credential loading from the context metadata directory.

mod auth;
mod client;
mod mime;

pub use auth::Credentials;
pub use client::DriveClient;
pub use mime::{mime_from_extension, DRIVE_FOLDER_MIME};
