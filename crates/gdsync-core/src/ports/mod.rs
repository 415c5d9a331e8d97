//! Ports through which the engine reaches the outside world.

pub mod remote;

pub use remote::{About, Feature, RemoteClient, RemoteError, UploadSizeLimit, UpsertArgs};
