//! Quota classification ahead of a push.

use gdsync_core::ports::About;

/// How full the remote account would be after the projected change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaStatus {
    /// Under half the quota.
    Barely,
    /// Between 50% and 80%.
    HalfwayExceeded,
    /// Between 80% and 100%.
    AlmostExceeded,
    /// At or over the quota; requires explicit confirmation.
    Exceeded,
    /// The quota could not be determined.
    Unknown,
}

/// Classifies `query` additional bytes against the account's quota.
pub fn classify_quota(about: &About, query: u64) -> QuotaStatus {
    if about.quota_bytes_total < 1 {
        return QuotaStatus::Unknown;
    }

    let to_be_used = query.saturating_add(about.quota_bytes_used);
    if to_be_used >= about.quota_bytes_total {
        return QuotaStatus::Exceeded;
    }

    let percentage = to_be_used as f64 / about.quota_bytes_total as f64;
    if percentage < 0.5 {
        QuotaStatus::Barely
    } else if percentage < 0.8 {
        QuotaStatus::HalfwayExceeded
    } else {
        QuotaStatus::AlmostExceeded
    }
}
