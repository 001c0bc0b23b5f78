//! Metrics declaration and recording helpers.
//!
//! With the `metrics` feature disabled every helper is an empty inline
//! function.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Track responses produced by strategies, labelled by strategy and source.
    pub static ref STRATEGY_RESPONSES: &'static str = {
        metrics::describe_counter!(
            "fetchbox_strategy_responses_total",
            "Total number of responses produced by strategies."
        );
        "fetchbox_strategy_responses_total"
    };
    /// Track failed network calls per strategy.
    pub static ref NETWORK_FAILURES: &'static str = {
        metrics::describe_counter!(
            "fetchbox_network_failures_total",
            "Total number of failed network calls."
        );
        "fetchbox_network_failures_total"
    };
    /// Track network calls abandoned by the strategy timeout.
    pub static ref NETWORK_TIMEOUTS: &'static str = {
        metrics::describe_counter!(
            "fetchbox_network_timeouts_total",
            "Total number of network calls that exceeded the strategy timeout."
        );
        "fetchbox_network_timeouts_total"
    };
    /// Track cache writes labelled by outcome.
    pub static ref CACHE_WRITES: &'static str = {
        metrics::describe_counter!(
            "fetchbox_cache_writes_total",
            "Total number of cache write attempts by outcome."
        );
        "fetchbox_cache_writes_total"
    };
    /// Gauge of background tasks not yet drained.
    pub static ref KEEP_ALIVE_TASKS_ACTIVE: &'static str = {
        metrics::describe_gauge!(
            "fetchbox_keep_alive_tasks_active",
            "Number of background tasks kept alive by events and handlers."
        );
        "fetchbox_keep_alive_tasks_active"
    };
}

/// Where a strategy response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Served from the cache.
    Cache,
    /// Served from the network.
    Network,
    /// Synthesized by the strategy.
    Synthetic,
}

impl ResponseSource {
    /// Label value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::Synthetic => "synthetic",
        }
    }
}

/// Outcome of a cache write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Entry stored.
    Stored,
    /// A plugin or the default status policy refused the entry.
    Vetoed,
    /// The request cannot be cached (scheme or method).
    Skipped,
    /// Storage limits rejected the entry.
    QuotaExceeded,
}

impl WriteOutcome {
    /// Label value.
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOutcome::Stored => "stored",
            WriteOutcome::Vetoed => "vetoed",
            WriteOutcome::Skipped => "skipped",
            WriteOutcome::QuotaExceeded => "quota_exceeded",
        }
    }
}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn record_response(strategy: &str, source: ResponseSource) {
    metrics::counter!(
        *STRATEGY_RESPONSES,
        "strategy" => strategy.to_string(),
        "source" => source.as_str()
    )
    .increment(1);
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn record_response(_strategy: &str, _source: ResponseSource) {}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn record_network_failure(strategy: &str, timeout: bool) {
    let name = if timeout {
        *NETWORK_TIMEOUTS
    } else {
        *NETWORK_FAILURES
    };
    metrics::counter!(name, "strategy" => strategy.to_string()).increment(1);
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn record_network_failure(_strategy: &str, _timeout: bool) {}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn record_cache_write(outcome: WriteOutcome) {
    metrics::counter!(*CACHE_WRITES, "outcome" => outcome.as_str()).increment(1);
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn record_cache_write(_outcome: WriteOutcome) {}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn keep_alive_gauge(delta: f64) {
    metrics::gauge!(*KEEP_ALIVE_TASKS_ACTIVE).increment(delta);
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn keep_alive_gauge(_delta: f64) {}
