//! Task definitions for the main thread.
//!
//! A task is a host closure that must run on the privileged context, plus
//! the completion hook that reports its outcome back to whoever issued it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};

use crate::runtime::error::{CallResult, MethodError};
use crate::runtime::value::Value;

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(val: u64) -> Self {
        Self(val)
    }
}

impl From<TaskId> for Value {
    fn from(id: TaskId) -> Self {
        Value::Int(id.0 as i64)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting in the queue.
    Queued,
    /// Currently executing.
    Running,
    /// Body returned values.
    Finished,
    /// Body raised an error or panicked.
    Failed,
}

impl TaskState {
    /// Convert from u8 (for atomic storage).
    #[inline]
    pub fn from_u8(val: u8) -> Self {
        match val {
            1 => TaskState::Running,
            2 => TaskState::Finished,
            3 => TaskState::Failed,
            _ => TaskState::Queued,
        }
    }

    /// Convert to u8 (for atomic storage).
    #[inline]
    pub fn as_u8(&self) -> u8 {
        match self {
            TaskState::Queued => 0,
            TaskState::Running => 1,
            TaskState::Finished => 2,
            TaskState::Failed => 3,
        }
    }
}

/// Work executed on the main thread.
pub type TaskBody = Box<dyn FnOnce() -> CallResult<Vec<Value>> + Send>;

/// Receives the outcome of a task.
pub type TaskCompletion = Box<dyn FnOnce(TaskId, CallResult<Vec<Value>>) + Send>;

/// A queued unit of main thread work.
pub struct Task {
    id: TaskId,
    state: AtomicU8,
    body: TaskBody,
    completion: TaskCompletion,
}

impl std::fmt::Debug for Task {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Task {
    /// Create a new task.
    pub fn new(
        id: TaskId,
        body: TaskBody,
        completion: TaskCompletion,
    ) -> Self {
        Self {
            id,
            state: AtomicU8::new(TaskState::Queued.as_u8()),
            body,
            completion,
        }
    }

    /// Get the task ID.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Get the current state.
    #[inline]
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Run the body and hand its outcome to the completion hook.
    ///
    /// A panicking body is reported as a host fault. Returns whether the
    /// body succeeded.
    pub fn run(self) -> bool {
        let Task {
            id,
            state,
            body,
            completion,
        } = self;
        state.store(TaskState::Running.as_u8(), Ordering::SeqCst);

        let outcome = match catch_unwind(AssertUnwindSafe(body)) {
            Ok(result) => result,
            Err(payload) => Err(MethodError::host_fault(payload.as_ref())),
        };
        let ok = outcome.is_ok();
        state.store(
            if ok { TaskState::Finished } else { TaskState::Failed }.as_u8(),
            Ordering::SeqCst,
        );
        completion(id, outcome);
        ok
    }
}
