//! The execution-pool capability and strategy selection.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::config::BenchConfig;
use crate::engine::VirtualPool;
use crate::work::{TaskHandle, WorkItem, WorkResult};
use crate::worker::PlatformPool;
use crate::{PoolError, Result, WorkError};

/// Which execution strategy a pool uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// Reusable OS threads, bounded and recycled.
    Platform,
    /// One cheap task per item on a small set of carrier threads.
    Virtual,
}

impl PoolKind {
    pub fn label(&self) -> &'static str {
        match self {
            PoolKind::Platform => "platform",
            PoolKind::Virtual => "virtual",
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Summary of a pool after shutdown-and-await.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Drained {
    pub completed: usize,
    pub failed: usize,
    /// Most OS worker threads alive at once; zero for the virtual pool.
    pub peak_threads: usize,
}

impl Drained {
    pub fn total(&self) -> usize {
        self.completed + self.failed
    }
}

/// Submit work, then release the pool and wait for all of it.
///
/// Implementations release on `Drop` as well, so a pool going out of scope
/// on any path (including unwinding) still waits for its items.
pub trait ExecutionPool: Send + Sync {
    fn kind(&self) -> PoolKind;

    /// Hand an item to the pool without waiting for it.
    fn submit(&self, item: WorkItem) -> Result<TaskHandle>;

    /// Stop accepting work and block until every submitted item has finished.
    ///
    /// Item failures don't stop their siblings; they are reported here once
    /// the barrier has been reached. Calling it again is a no-op returning
    /// the same counts.
    fn shutdown(&mut self) -> Result<Drained>;
}

/// Build a pool of the requested kind.
pub fn open(kind: PoolKind, config: &BenchConfig) -> Result<Box<dyn ExecutionPool>> {
    config.validate()?;
    let pool: Box<dyn ExecutionPool> = match kind {
        PoolKind::Platform => Box::new(PlatformPool::new(&config.platform)?),
        PoolKind::Virtual => Box::new(VirtualPool::new(&config.virtual_threads)?),
    };
    Ok(pool)
}

/// Completion counters shared between a pool and its workers.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    completed: AtomicUsize,
    failed: AtomicUsize,
    first_failure: Mutex<Option<WorkError>>,
    reported: Mutex<bool>,
}

impl Tally {
    pub(crate) fn record(&self, result: &WorkResult) {
        match result {
            Ok(_) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                log::warn!("{}", err);
                self.failed.fetch_add(1, Ordering::Relaxed);
                let mut first = self.first_failure.lock();
                if first.is_none() {
                    *first = Some(err.clone());
                }
            }
        }
    }

    /// Turn the counts into the shutdown result. Failures are returned as an
    /// error only the first time.
    pub(crate) fn finish(&self, peak_threads: usize) -> Result<Drained> {
        let drained = Drained {
            completed: self.completed.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            peak_threads,
        };

        let mut reported = self.reported.lock();
        if drained.failed > 0 && !*reported {
            *reported = true;
            if let Some(first) = self.first_failure.lock().clone() {
                return Err(PoolError::TaskFailures {
                    failed: drained.failed,
                    total: drained.total(),
                    first,
                });
            }
        }
        *reported = true;
        Ok(drained)
    }
}
