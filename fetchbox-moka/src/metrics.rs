//! Moka cache storage metrics.
//!
//! Enable the `metrics` feature to record them.
//!
//! ## Metrics
//!
//! - `fetchbox_moka_entries` - Number of stored entries per cache (gauge)

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Metric name for the entry count gauge.
    pub static ref MOKA_ENTRIES: &'static str = {
        metrics::describe_gauge!(
            "fetchbox_moka_entries",
            "Number of responses stored in a Moka backed cache."
        );
        "fetchbox_moka_entries"
    };
}

/// Records the entry count of the cache named `cache`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_entries(cache: &str, entries: u64) {
    metrics::gauge!(*MOKA_ENTRIES, "cache" => cache.to_string()).set(entries as f64);
}

/// Records the entry count of the cache named `cache` (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_entries(_cache: &str, _entries: u64) {}
