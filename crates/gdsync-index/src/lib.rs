//! On-disk index store.
//!
//! Persists one [`IndexRecord`](gdsync_core::domain::IndexRecord) per
//! remote file id under the context metadata directory. Records are the
//! conflict resolver's third state: their existence means the two sides
//! agreed at the recorded timestamp.

mod store;

pub use store::{IndexError, IndexStore};
