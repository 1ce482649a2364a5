//! Timing harness.
//!
//! Times one pool from creation to the end of its shutdown-and-await, with N
//! sleeping work items submitted in between.

use std::fmt;
use std::time::{Duration, Instant};

use log::info;

use crate::config::BenchConfig;
use crate::pool::{self, Drained, ExecutionPool, PoolKind};
use crate::work::{TaskHandle, WorkItem};
use crate::Result;

/// One timed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub kind: PoolKind,
    pub tasks: usize,
    pub elapsed: Duration,
    pub drained: Drained,
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Number of {} threads = {}, Duration(ms) = {}",
            self.kind,
            self.tasks,
            self.elapsed.as_millis()
        )
    }
}

/// Submit items `0..count` in order without waiting on any of them.
pub fn submit_all(
    pool: &dyn ExecutionPool,
    count: usize,
    pause: Duration,
) -> Result<Vec<TaskHandle>> {
    (0..count)
        .map(|i| pool.submit(WorkItem::sleeping(i, pause)))
        .collect()
}

/// Time a single pool of `kind` running `tasks` items.
pub fn run_benchmark(kind: PoolKind, tasks: usize, config: &BenchConfig) -> Result<Measurement> {
    let start = Instant::now();

    let mut pool = pool::open(kind, config)?;
    // handles are not observed; the shutdown barrier is what we time
    submit_all(pool.as_ref(), tasks, config.pause())?;
    let drained = pool.shutdown()?;

    let measurement = Measurement {
        kind,
        tasks,
        elapsed: start.elapsed(),
        drained,
    };
    info!(
        "{} pool finished {} items in {:?}",
        kind, tasks, measurement.elapsed
    );
    Ok(measurement)
}

/// Run every configured task count for each kind, kinds in the given order.
/// `on_result` sees each measurement as soon as its run ends.
pub fn run_suite<F>(
    kinds: &[PoolKind],
    config: &BenchConfig,
    mut on_result: F,
) -> Result<Vec<Measurement>>
where
    F: FnMut(&Measurement),
{
    let mut results = Vec::with_capacity(kinds.len() * config.task_counts.len());
    for &kind in kinds {
        for &tasks in &config.task_counts {
            let measurement = run_benchmark(kind, tasks, config)?;
            on_result(&measurement);
            results.push(measurement);
        }
    }
    Ok(results)
}
