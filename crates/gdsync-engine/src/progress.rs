//! Transfer progress accounting.
//!
//! The engine only accounts bytes; rendering a bar is a UI concern that
//! lives outside the core. One counter exists per run, fed by a single
//! consumer of the bytes-transferred channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use gdsync_core::util::pretty_bytes;

/// Shared byte counter for one executor run.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    total: u64,
    transferred: AtomicU64,
    started: Instant,
}

impl TransferProgress {
    /// Opens accounting for `total` expected bytes.
    pub fn start(total: u64) -> Self {
        if total > 0 {
            info!(total = %pretty_bytes(total), "starting transfer");
        }
        Self {
            inner: Arc::new(Inner {
                total,
                transferred: AtomicU64::new(0),
                started: Instant::now(),
            }),
        }
    }

    /// Records `n` more transferred bytes.
    pub fn add(&self, n: u64) {
        let done = self.inner.transferred.fetch_add(n, Ordering::Relaxed) + n;
        debug!(
            transferred = %pretty_bytes(done),
            total = %pretty_bytes(self.inner.total),
            "progress"
        );
    }

    pub fn transferred(&self) -> u64 {
        self.inner.transferred.load(Ordering::Relaxed)
    }

    /// Closes accounting and reports the totals.
    pub fn finish(&self) {
        let done = self.transferred();
        if self.inner.total > 0 || done > 0 {
            info!(
                transferred = %pretty_bytes(done),
                total = %pretty_bytes(self.inner.total),
                elapsed_ms = self.inner.started.elapsed().as_millis() as u64,
                "transfer finished"
            );
        }
    }
}
