//! Main thread scheduler
//!
//! The main thread is the privileged context that owns host state. Script
//! threads never touch that state directly: they enqueue tasks through a
//! [`MainThreadHandle`] and park until the completion event arrives. The
//! host drives [`MainThread::tick`] once per update.

pub mod task;

pub use task::{Task, TaskBody, TaskCompletion, TaskId, TaskState};

use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use thiserror::Error;
use tracing::debug;

use crate::runtime::error::{CallResult, MethodError};
use crate::runtime::value::Value;
use crate::util::config::BridgeConfig;

/// Scheduler errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The pending task bound was reached
    #[error("Too many tasks")]
    QueueFull,
    /// The main thread was dropped
    #[error("Main thread is not running")]
    Disconnected,
}

impl From<SchedulerError> for MethodError {
    fn from(err: SchedulerError) -> Self {
        MethodError::new(err.to_string())
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of queued tasks.
    pub max_pending_tasks: usize,
    /// Tasks run per tick.
    pub max_tasks_per_tick: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_pending_tasks: 5000,
            max_tasks_per_tick: 256,
        }
    }
}

impl From<&BridgeConfig> for SchedulerConfig {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            max_pending_tasks: config.max_pending_tasks,
            max_tasks_per_tick: config.max_tasks_per_tick,
        }
    }
}

/// Scheduler statistics.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    /// Total tasks accepted.
    pub tasks_submitted: AtomicUsize,
    /// Total tasks that finished with values.
    pub tasks_completed: AtomicUsize,
    /// Total tasks that failed.
    pub tasks_failed: AtomicUsize,
}

impl SchedulerStats {
    #[inline]
    fn record_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    fn record_run(
        &self,
        ok: bool,
    ) {
        if ok {
            self.tasks_completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.tasks_failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Number of tasks accepted so far.
    pub fn submitted(&self) -> usize {
        self.tasks_submitted.load(Ordering::SeqCst)
    }

    /// Number of tasks that finished with values.
    pub fn completed(&self) -> usize {
        self.tasks_completed.load(Ordering::SeqCst)
    }

    /// Number of tasks that failed.
    pub fn failed(&self) -> usize {
        self.tasks_failed.load(Ordering::SeqCst)
    }
}

/// The privileged execution context.
#[derive(Debug)]
pub struct MainThread {
    config: SchedulerConfig,
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    next_id: Arc<AtomicU64>,
    stats: Arc<SchedulerStats>,
}

impl MainThread {
    /// Create a main thread with default config.
    #[inline]
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a main thread with custom configuration.
    pub fn with_config(config: SchedulerConfig) -> Self {
        let (sender, receiver) = channel::bounded(config.max_pending_tasks.max(1));
        Self {
            config,
            sender,
            receiver,
            next_id: Arc::new(AtomicU64::new(1)),
            stats: Arc::new(SchedulerStats::default()),
        }
    }

    /// A handle for submitting tasks from any thread.
    pub fn handle(&self) -> MainThreadHandle {
        MainThreadHandle {
            sender: self.sender.clone(),
            next_id: self.next_id.clone(),
            stats: self.stats.clone(),
        }
    }

    /// Run up to `max_tasks_per_tick` queued tasks. Returns how many ran.
    pub fn tick(&self) -> usize {
        let mut ran = 0;
        while ran < self.config.max_tasks_per_tick {
            let Ok(task) = self.receiver.try_recv() else {
                break;
            };
            let id = task.id();
            let ok = task.run();
            self.stats.record_run(ok);
            debug!("Main thread ran {} (ok = {})", id, ok);
            ran += 1;
        }
        ran
    }

    /// Number of queued tasks.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Get the statistics.
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Get the configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

impl Default for MainThread {
    fn default() -> Self {
        Self::new()
    }
}

/// Submits work to a [`MainThread`].
#[derive(Debug, Clone)]
pub struct MainThreadHandle {
    sender: Sender<Task>,
    next_id: Arc<AtomicU64>,
    stats: Arc<SchedulerStats>,
}

impl MainThreadHandle {
    /// Queue `body` for the next tick. `completion` receives its outcome on
    /// the main thread.
    pub fn enqueue<B, C>(
        &self,
        body: B,
        completion: C,
    ) -> Result<TaskId, SchedulerError>
    where
        B: FnOnce() -> CallResult<Vec<Value>> + Send + 'static,
        C: FnOnce(TaskId, CallResult<Vec<Value>>) + Send + 'static,
    {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let task = Task::new(id, Box::new(body), Box::new(completion));
        match self.sender.try_send(task) {
            Ok(()) => {
                self.stats.record_submitted();
                Ok(id)
            }
            Err(TrySendError::Full(_)) => Err(SchedulerError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(SchedulerError::Disconnected),
        }
    }
}

#[cfg(test)]
mod tests;
