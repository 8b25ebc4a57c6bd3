//! Stress-tests a [`refetch::GatedMemoizer`] under configurable concurrent
//! workloads and reports throughput, call latencies, and how many actual
//! computations the memoizer let through.
//!
//! Workloads are defined in a YAML file, one memoizer per entry:
//!
//! ```yaml
//! workloads:
//!   - concurrency: 64
//!     refresh_interval: 100ms
//!     compute_time: 25ms
//!   - concurrency: 32
//!     retry_on_failure: true
//!     compute_time: 5ms
//!     failure_rate: 0.2
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use crate::workloads::WorkloadsConfig;

mod stresstest;
mod workloads;

/// Command line interface parser.
#[derive(Parser)]
struct Cli {
    /// Path to the workload definition file.
    #[arg(long = "workloads", short = 'w', value_name = "FILE")]
    workloads: PathBuf,

    /// Duration of the stresstest.
    #[arg(long = "duration", short = 'd', value_parser = humantime::parse_duration)]
    duration: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let workloads_file =
        std::fs::File::open(&cli.workloads).context("failed to open workloads file")?;
    let workloads: WorkloadsConfig =
        serde_yaml::from_reader(workloads_file).context("failed to parse workloads YAML")?;

    tracing_subscriber::fmt::init();

    stresstest::perform_stresstest(workloads, cli.duration).await
}
