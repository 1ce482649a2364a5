use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, trace};
use parking_lot::Mutex;

use crate::config::PlatformConfig;
use crate::pool::{Drained, ExecutionPool, PoolKind, Tally};
use crate::work::{panic_message, Completer, TaskHandle, WorkItem, WorkResult};
use crate::{PoolError, Result, WorkError};

/// A queued item together with the handle it reports to
struct Job {
    item: WorkItem,
    completer: Completer,
}

impl Job {
    /// Run the item on this thread. A panic becomes the item's error instead
    /// of taking the worker down.
    fn run(&self) -> WorkResult {
        let item = self.item;
        catch_unwind(AssertUnwindSafe(move || item.run_blocking())).unwrap_or_else(|payload| {
            Err(WorkError::Panicked {
                index: item.index(),
                message: panic_message(payload.as_ref()),
            })
        })
    }
}

/// Worker bookkeeping. Enqueueing and the spawn/retire decisions all happen
/// under this one lock, so an idle worker never retires while an item it was
/// counted for is still waiting in the channel.
#[derive(Default)]
struct Roster {
    sender: Option<Sender<Job>>,
    live: usize,
    busy: usize,
    queued: usize,
    peak: usize,
    next_id: usize,
    threads: Vec<thread::JoinHandle<()>>,
}

impl Roster {
    fn idle(&self) -> usize {
        self.live - self.busy
    }
}

struct Shared {
    roster: Mutex<Roster>,
    receiver: Receiver<Job>,
    tally: Tally,
    config: PlatformConfig,
}

/// Worker thread implementation
struct Worker {
    id: usize,
    shared: Arc<Shared>,
}

impl Worker {
    fn run(self) {
        let keep_alive = self.shared.config.keep_alive();
        loop {
            match self.shared.receiver.recv_timeout(keep_alive) {
                Ok(job) => {
                    {
                        let mut roster = self.shared.roster.lock();
                        roster.queued -= 1;
                        roster.busy += 1;
                    }

                    trace!("Worker {} executing item {}", self.id, job.item.index());
                    let start = Instant::now();
                    let result = job.run();
                    trace!("Worker {} finished item in {:?}", self.id, start.elapsed());

                    self.shared.tally.record(&result);
                    // free before completing, so a caller woken by the handle sees us idle
                    self.shared.roster.lock().busy -= 1;
                    job.completer.complete(result);
                }
                Err(RecvTimeoutError::Timeout) => {
                    let mut roster = self.shared.roster.lock();
                    if roster.queued > 0 {
                        continue;
                    }
                    roster.live -= 1;
                    debug!("Worker {} idle for {:?}, retiring", self.id, keep_alive);
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.shared.roster.lock().live -= 1;
                    debug!("Worker {} received terminate signal", self.id);
                    break;
                }
            }
        }
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker").field("id", &self.id).finish()
    }
}

/// Cached pool of reusable OS threads.
///
/// A new worker is started whenever an item arrives and every live worker is
/// already spoken for, up to `max_threads`. Past that bound items wait in the
/// queue for a worker to free up. Workers idle for longer than the keep-alive
/// retire on their own.
pub struct PlatformPool {
    shared: Arc<Shared>,
}

impl PlatformPool {
    pub fn new(config: &PlatformConfig) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = unbounded();
        let shared = Arc::new(Shared {
            roster: Mutex::new(Roster {
                sender: Some(sender),
                ..Roster::default()
            }),
            receiver,
            tally: Tally::default(),
            config: config.clone(),
        });

        info!(
            "Platform pool opened (max_threads={}, keep_alive={:?})",
            config.max_threads,
            config.keep_alive()
        );
        Ok(Self { shared })
    }

    /// Worker threads currently alive.
    pub fn live_threads(&self) -> usize {
        self.shared.roster.lock().live
    }

    /// Most worker threads alive at once so far.
    pub fn peak_threads(&self) -> usize {
        self.shared.roster.lock().peak
    }

    fn spawn_worker(&self, roster: &mut Roster) -> Result<()> {
        let id = roster.next_id;
        let config = &self.shared.config;
        let worker = Worker {
            id,
            shared: Arc::clone(&self.shared),
        };

        let thread = thread::Builder::new()
            .name(format!("{}-{}", config.thread_name_prefix, id))
            .stack_size(config.stack_size)
            .spawn(move || worker.run())
            .map_err(PoolError::Spawn)?;

        roster.next_id += 1;
        roster.live += 1;
        roster.peak = roster.peak.max(roster.live);
        roster.threads.retain(|t| !t.is_finished());
        roster.threads.push(thread);
        trace!("Spawned worker {} ({} live)", id, roster.live);
        Ok(())
    }
}

impl ExecutionPool for PlatformPool {
    fn kind(&self) -> PoolKind {
        PoolKind::Platform
    }

    fn submit(&self, item: WorkItem) -> Result<TaskHandle> {
        let mut roster = self.shared.roster.lock();
        if roster.sender.is_none() {
            return Err(PoolError::Closed);
        }

        if roster.idle() <= roster.queued && roster.live < self.shared.config.max_threads {
            if let Err(e) = self.spawn_worker(&mut roster) {
                if roster.live == 0 {
                    return Err(e);
                }
                error!("Failed to add worker, queueing item {}: {}", item.index(), e);
            }
        }

        let (completer, handle) = TaskHandle::pair(item.index());
        let sender = roster.sender.as_ref().ok_or(PoolError::Closed)?;
        sender
            .send(Job { item, completer })
            .map_err(|_| PoolError::Closed)?;
        roster.queued += 1;
        Ok(handle)
    }

    fn shutdown(&mut self) -> Result<Drained> {
        let threads = {
            let mut roster = self.shared.roster.lock();
            if roster.sender.take().is_some() {
                debug!(
                    "Closing platform pool ({} live workers, {} queued)",
                    roster.live, roster.queued
                );
            }
            std::mem::take(&mut roster.threads)
        };

        for thread in threads {
            if thread.join().is_err() {
                error!("Platform worker thread panicked outside of a work item");
            }
        }

        let peak = self.shared.roster.lock().peak;
        let drained = self.shared.tally.finish(peak);
        if let Ok(d) = &drained {
            info!(
                "Platform pool drained: {} completed, {} failed, peak {} threads",
                d.completed, d.failed, d.peak_threads
            );
        }
        drained
    }
}

impl Drop for PlatformPool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("Platform pool released with failures: {}", e);
        }
    }
}

impl fmt::Debug for PlatformPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roster = self.shared.roster.lock();
        f.debug_struct("PlatformPool")
            .field("max_threads", &self.shared.config.max_threads)
            .field("live", &roster.live)
            .field("busy", &roster.busy)
            .field("queued", &roster.queued)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(max_threads: usize, keep_alive: Duration) -> PlatformConfig {
        PlatformConfig {
            max_threads,
            keep_alive_ms: keep_alive.as_millis() as u64,
            ..PlatformConfig::default()
        }
    }

    #[test]
    fn never_exceeds_max_threads() {
        let mut pool = PlatformPool::new(&config(4, Duration::from_secs(5))).unwrap();
        for i in 0..32 {
            pool.submit(WorkItem::sleeping(i, Duration::from_millis(5))).unwrap();
        }
        let drained = pool.shutdown().unwrap();
        assert_eq!(drained.completed, 32);
        assert!(drained.peak_threads <= 4);
        assert!(drained.peak_threads >= 1);
    }

    #[test]
    fn idle_workers_are_reused() {
        let mut pool = PlatformPool::new(&config(8, Duration::from_secs(5))).unwrap();
        for i in 0..5 {
            pool.submit(WorkItem::sleeping(i, Duration::from_millis(1)))
                .unwrap()
                .join()
                .unwrap();
        }
        assert_eq!(pool.peak_threads(), 1);
        pool.shutdown().unwrap();
    }

    #[test]
    fn idle_workers_retire_after_keep_alive() {
        let pool = PlatformPool::new(&config(4, Duration::from_millis(20))).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|i| pool.submit(WorkItem::sleeping(i, Duration::from_millis(10))).unwrap())
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        while pool.live_threads() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(pool.live_threads(), 0);

        // a retired pool still accepts work
        assert_eq!(
            pool.submit(WorkItem::sleeping(9, Duration::from_millis(1)))
                .unwrap()
                .join(),
            Ok(9)
        );
    }

    #[test]
    fn submit_after_shutdown_is_rejected() {
        let mut pool = PlatformPool::new(&PlatformConfig::default()).unwrap();
        pool.shutdown().unwrap();
        assert!(matches!(
            pool.submit(WorkItem::sleeping(0, Duration::from_millis(1))),
            Err(PoolError::Closed)
        ));
    }

    #[test]
    fn bad_config_is_rejected_before_any_thread_starts() {
        let nul = PlatformConfig {
            thread_name_prefix: "bad\0name".to_string(),
            ..PlatformConfig::default()
        };
        assert!(matches!(PlatformPool::new(&nul), Err(PoolError::Config(_))));

        let tiny_stack = PlatformConfig {
            stack_size: 1024,
            ..PlatformConfig::default()
        };
        assert!(matches!(
            PlatformPool::new(&tiny_stack),
            Err(PoolError::Config(_))
        ));
        assert!(matches!(
            PlatformPool::new(&config(0, Duration::from_secs(1))),
            Err(PoolError::Config(_))
        ));
    }

    #[test]
    fn worker_threads_carry_the_prefix() {
        let cfg = PlatformConfig {
            thread_name_prefix: "bench".to_string(),
            ..PlatformConfig::default()
        };
        let pool = PlatformPool::new(&cfg).unwrap();
        let name = {
            let mut roster = pool.shared.roster.lock();
            pool.spawn_worker(&mut roster).unwrap();
            roster.threads[0].thread().name().map(str::to_string)
        };
        assert_eq!(name.as_deref(), Some("bench-0"));
    }
}
