use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use sketches_ddsketch::DDSketch;
use tokio::sync::Semaphore;

use refetch::{CancellationToken, GatedMemoizer};

use crate::workloads::{SyntheticOperation, WorkloadsConfig};

pub async fn perform_stresstest(workloads: WorkloadsConfig, duration: Duration) -> Result<()> {
    // initialize workloads: one memoizer per definition, with a handle onto
    // the operation kept around so we can read its computation count later
    let workloads: Vec<_> = workloads
        .workloads
        .into_iter()
        .map(|workload| {
            let operation = SyntheticOperation::new(workload.compute_time, workload.failure_rate);
            let memoizer = Arc::new(GatedMemoizer::with_config(
                operation.clone(),
                workload.config,
            ));
            (workload.concurrency, operation, memoizer)
        })
        .collect();

    // warmup: populate each memoizer once so the measured interval is not
    // dominated by the initial computation
    {
        let start = Instant::now();

        let futures = workloads.iter().map(|(_, _, memoizer)| {
            let memoizer = Arc::clone(memoizer);
            tokio::spawn(async move {
                let _ = memoizer.fetch(CancellationToken::new()).await;
            })
        });

        let _results = futures::future::join_all(futures).await;

        println!("Warmup: {:?}", start.elapsed());
    }
    println!();

    // run the workloads concurrently
    let mut tasks = Vec::with_capacity(workloads.len());
    for (concurrency, operation, memoizer) in workloads.into_iter() {
        let start = Instant::now();
        let deadline = tokio::time::Instant::from_std(start + duration);

        let task = tokio::spawn(async move {
            let call_durations = Arc::new(Mutex::new(DDSketch::default()));
            let semaphore = Arc::new(Semaphore::new(concurrency));

            // See <https://docs.rs/tokio/latest/tokio/time/struct.Sleep.html#examples>
            let sleep = tokio::time::sleep_until(deadline);
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    permit = semaphore.clone().acquire_owned() => {
                        let memoizer = Arc::clone(&memoizer);
                        let call_durations = Arc::clone(&call_durations);
                        let call_start = Instant::now();

                        tokio::spawn(async move {
                            let _ = memoizer.fetch(CancellationToken::new()).await;

                            call_durations.lock().unwrap().add(call_start.elapsed().as_secs_f64());

                            drop(permit);
                        });
                    }
                    _ = &mut sleep => {
                        break;
                    }
                }
            }

            let call_durations: DDSketch = {
                let mut call_durations = call_durations.lock().unwrap();
                std::mem::take(&mut call_durations)
            };

            // by acquiring *all* the permits, we essentially wait for all
            // outstanding calls to finish
            let _permits = semaphore.acquire_many(concurrency as u32).await;

            let last_outcome = memoizer.cached().await;

            (concurrency, operation, call_durations, last_outcome)
        });
        tasks.push(task);
    }

    let finished_tasks = futures::future::join_all(tasks).await;

    for (i, task) in finished_tasks.into_iter().enumerate() {
        let (concurrency, operation, call_durations, last_outcome) = task?;

        let calls = call_durations.count();
        let calls_ps = calls as f32 / duration.as_secs() as f32;
        let computations = operation.computations();
        let outcome = match last_outcome {
            Some(Ok(ordinal)) => format!("Ok({ordinal})"),
            Some(Err(err)) => format!("Err({err})"),
            None => "never computed".into(),
        };
        println!(
            "Workload {i} (concurrency: {concurrency}): {calls} calls, {calls_ps:.2} calls/s, {computations} computations, last outcome: {outcome}"
        );

        if calls > 0 {
            let avg = Duration::from_secs_f64(call_durations.sum().unwrap() / calls as f64);
            let p50 = Duration::from_secs_f64(call_durations.quantile(0.5).unwrap().unwrap());
            let p90 = Duration::from_secs_f64(call_durations.quantile(0.9).unwrap().unwrap());
            let p99 = Duration::from_secs_f64(call_durations.quantile(0.99).unwrap().unwrap());
            println!("  avg: {avg:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}");
        }
    }

    Ok(())
}
