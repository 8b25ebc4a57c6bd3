use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;

use refetch::{CancellationToken, FetchOperation, MemoizerConfig};

#[derive(Debug, Deserialize)]
pub struct WorkloadsConfig {
    pub workloads: Vec<Workload>,
}

/// A single workload: how many concurrent callers to run against one
/// memoizer, and how the synthetic operation behind it behaves.
#[derive(Debug, Deserialize)]
pub struct Workload {
    pub concurrency: usize,

    /// The memoizer configuration under test.
    #[serde(flatten)]
    pub config: MemoizerConfig,

    /// Simulated latency of the wrapped operation.
    #[serde(default, with = "humantime_serde")]
    pub compute_time: Duration,

    /// Probability in `0..=1` that a computation fails.
    #[serde(default)]
    pub failure_rate: f64,
}

/// The error synthetic computations fail with.
#[derive(Debug, Clone, Error)]
#[error("synthetic computation failure")]
pub struct SyntheticFailure;

/// The operation under stress: sleeps for the configured compute time, then
/// fails with the configured probability or returns the computation ordinal.
#[derive(Clone)]
pub struct SyntheticOperation {
    computations: Arc<AtomicU64>,
    compute_time: Duration,
    failure_rate: f64,
}

impl SyntheticOperation {
    pub fn new(compute_time: Duration, failure_rate: f64) -> Self {
        Self {
            computations: Default::default(),
            compute_time,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    /// Number of times the operation actually ran.
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }
}

impl FetchOperation for SyntheticOperation {
    type Item = u64;
    type Error = SyntheticFailure;

    fn compute(&self, _cancel: CancellationToken) -> BoxFuture<'_, Result<u64, SyntheticFailure>> {
        let ordinal = self.computations.fetch_add(1, Ordering::Relaxed) + 1;
        let compute_time = self.compute_time;
        let failure_rate = self.failure_rate;

        Box::pin(async move {
            tokio::time::sleep(compute_time).await;

            if rand::rng().random_bool(failure_rate) {
                Err(SyntheticFailure)
            } else {
                Ok(ordinal)
            }
        })
    }
}
