use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;
use futures::future::join_all;
use futures::FutureExt;
use log::{debug, error, info};
use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

use crate::config::VirtualConfig;
use crate::pool::{Drained, ExecutionPool, PoolKind, Tally};
use crate::work::{panic_message, TaskHandle, WorkItem};
use crate::{PoolError, Result, WorkError};

/// 每个工作项一个tokio任务的执行池
///
/// 工作项挂起时只占用任务, 不占用载体线程, 因此并发量可以远超线程数。
/// 关闭时阻塞等待所有任务; 若调用方本身处于tokio上下文中, 等待转移到独立线程上完成。
pub struct VirtualPool {
    runtime: Option<Runtime>,
    // None 表示已关闭
    tasks: Mutex<Option<Vec<JoinHandle<()>>>>,
    tally: Arc<Tally>,
    carrier_threads: usize,
}

impl VirtualPool {
    /// 创建新执行池实例
    pub fn new(config: &VirtualConfig) -> Result<Self> {
        config.validate()?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(config.carrier_threads)
            .thread_name("virtual-carrier")
            .enable_time()
            .build()
            .map_err(PoolError::Runtime)?;

        info!(
            "Virtual pool opened ({} carrier threads)",
            config.carrier_threads
        );
        Ok(Self {
            runtime: Some(runtime),
            tasks: Mutex::new(Some(Vec::new())),
            tally: Arc::new(Tally::default()),
            carrier_threads: config.carrier_threads,
        })
    }

    pub fn carrier_threads(&self) -> usize {
        self.carrier_threads
    }
}

impl ExecutionPool for VirtualPool {
    fn kind(&self) -> PoolKind {
        PoolKind::Virtual
    }

    /// 提交新任务, 不等待其完成
    fn submit(&self, item: WorkItem) -> Result<TaskHandle> {
        let mut guard = self.tasks.lock();
        let (tasks, runtime) = match (guard.as_mut(), self.runtime.as_ref()) {
            (Some(tasks), Some(runtime)) => (tasks, runtime),
            _ => return Err(PoolError::Closed),
        };

        let (completer, handle) = TaskHandle::pair(item.index());
        let tally = Arc::clone(&self.tally);
        tasks.push(runtime.spawn(async move {
            let index = completer.index();
            let result = match AssertUnwindSafe(item.run_async()).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(WorkError::Panicked {
                    index,
                    message: panic_message(payload.as_ref()),
                }),
            };
            tally.record(&result);
            completer.complete(result);
        }));
        Ok(handle)
    }

    /// 优雅关闭: 等待所有已提交任务完成
    fn shutdown(&mut self) -> Result<Drained> {
        let tasks = self.tasks.lock().take();
        match (tasks, self.runtime.take()) {
            (Some(tasks), Some(runtime)) => {
                debug!("Closing virtual pool, awaiting {} tasks", tasks.len());
                if Handle::try_current().is_ok() {
                    // block_on panics inside another runtime's context
                    drain_off_thread(runtime, tasks)?;
                } else {
                    drain(runtime, tasks);
                }
            }
            (_, Some(runtime)) => runtime.shutdown_background(),
            _ => {}
        }

        let drained = self.tally.finish(0);
        if let Ok(d) = &drained {
            info!(
                "Virtual pool drained: {} completed, {} failed",
                d.completed, d.failed
            );
        }
        drained
    }
}

/// 在当前线程上等待全部任务结束, 然后释放运行时
fn drain(runtime: Runtime, tasks: Vec<JoinHandle<()>>) {
    let joined = runtime.block_on(join_all(tasks));
    for err in joined.into_iter().filter_map(|r| r.err()) {
        error!("Virtual task aborted: {}", err);
    }
    runtime.shutdown_background();
}

/// 调用方处于异步上下文时, 由专用线程执行 [`drain`] 并等待其结束
fn drain_off_thread(runtime: Runtime, tasks: Vec<JoinHandle<()>>) -> Result<()> {
    let (tx, rx) = bounded::<(Runtime, Vec<JoinHandle<()>>)>(1);
    let drainer = match thread::Builder::new()
        .name("virtual-drain".to_string())
        .spawn(move || {
            if let Ok((runtime, tasks)) = rx.recv() {
                drain(runtime, tasks);
            }
        }) {
        Ok(drainer) => drainer,
        Err(e) => {
            runtime.shutdown_background();
            return Err(PoolError::Spawn(e));
        }
    };

    if let Err(returned) = tx.send((runtime, tasks)) {
        let (runtime, _) = returned.into_inner();
        runtime.shutdown_background();
    }
    if drainer.join().is_err() {
        error!("Virtual drain thread panicked");
    }
    Ok(())
}

impl Drop for VirtualPool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("Virtual pool released with failures: {}", e);
        }
    }
}

impl fmt::Debug for VirtualPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualPool")
            .field("carrier_threads", &self.carrier_threads)
            .field("closed", &self.runtime.is_none())
            .finish()
    }
}
