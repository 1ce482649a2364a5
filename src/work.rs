//! Work items and the handles that observe them.

use std::fmt;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::WorkError;

pub type WorkResult = std::result::Result<usize, WorkError>;

/// What a work item does once it gets an execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Suspend for the interval, then yield the index.
    Sleep(Duration),
    /// Suspend for the interval, then fail as if the suspension was interrupted.
    Interrupt(Duration),
}

/// One unit of submitted work. Moved by value into the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem {
    index: usize,
    action: Action,
}

impl WorkItem {
    pub fn new(index: usize, action: Action) -> Self {
        Self { index, action }
    }

    pub fn sleeping(index: usize, pause: Duration) -> Self {
        Self::new(index, Action::Sleep(pause))
    }

    pub fn interrupted(index: usize, pause: Duration) -> Self {
        Self::new(index, Action::Interrupt(pause))
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Run on the calling OS thread, blocking it for the whole pause.
    pub fn run_blocking(self) -> WorkResult {
        match self.action {
            Action::Sleep(pause) => {
                std::thread::sleep(pause);
                Ok(self.index)
            }
            Action::Interrupt(pause) => {
                std::thread::sleep(pause);
                Err(WorkError::Interrupted { index: self.index })
            }
        }
    }

    /// Run as a tokio task; the pause parks the task, not the thread.
    pub async fn run_async(self) -> WorkResult {
        match self.action {
            Action::Sleep(pause) => {
                tokio::time::sleep(pause).await;
                Ok(self.index)
            }
            Action::Interrupt(pause) => {
                tokio::time::sleep(pause).await;
                Err(WorkError::Interrupted { index: self.index })
            }
        }
    }
}

/// Readable text from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Pool-side half of a [`TaskHandle`].
///
/// Dropping it without calling [`Completer::complete`] makes the handle
/// resolve to [`WorkError::Lost`].
pub(crate) struct Completer {
    index: usize,
    tx: Sender<WorkResult>,
}

impl Completer {
    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn complete(self, result: WorkResult) {
        // Nobody is obliged to look at the result.
        let _ = self.tx.send(result);
    }
}

/// Eventual result of a submitted work item.
pub struct TaskHandle {
    index: usize,
    rx: Receiver<WorkResult>,
}

impl TaskHandle {
    pub(crate) fn pair(index: usize) -> (Completer, TaskHandle) {
        let (tx, rx) = bounded(1);
        (Completer { index, tx }, TaskHandle { index, rx })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Block until the item finishes.
    pub fn join(self) -> WorkResult {
        self.rx
            .recv()
            .unwrap_or(Err(WorkError::Lost { index: self.index }))
    }

    /// Result if the item has already finished.
    pub fn try_join(&self) -> Option<WorkResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(WorkError::Lost { index: self.index })),
        }
    }

    pub fn join_timeout(&self, timeout: Duration) -> Option<WorkResult> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                Some(Err(WorkError::Lost { index: self.index }))
            }
        }
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("index", &self.index)
            .finish()
    }
}
