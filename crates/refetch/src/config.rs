use std::time::Duration;

use serde::Deserialize;

/// Configuration for a [`GatedMemoizer`](crate::GatedMemoizer).
///
/// The default configuration caches the first computed result indefinitely
/// and does not retry failed computations. Options can be applied in any
/// order; applying the same option twice keeps the last value.
///
/// The struct deserializes from config files with humantime durations:
///
/// ```yaml
/// refresh_interval: 5m
/// retry_on_failure: true
/// ```
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MemoizerConfig {
    /// Duration after which a cached result is considered stale.
    ///
    /// `None` means a result, once computed, never goes stale by elapsed
    /// time alone; only `retry_on_failure` can then force another
    /// computation.
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Option<Duration>,

    /// Whether a cached error forces a recomputation on the next call.
    ///
    /// When enabled, a cached `Err` is always considered stale, regardless
    /// of `refresh_interval`.
    pub retry_on_failure: bool,
}

impl MemoizerConfig {
    /// Sets the duration after which the cached result goes stale.
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// Sets whether a cached error is recomputed on the next call.
    pub fn retry_on_failure(mut self, retry: bool) -> Self {
        self.retry_on_failure = retry;
        self
    }
}
