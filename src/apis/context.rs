//! Per-call context handed to host methods

use std::fmt;
use std::sync::Arc;

use crate::apis::ApiEnvironment;
use crate::runtime::error::{CallResult, MethodError};
use crate::runtime::method_result::MethodResult;
use crate::runtime::scheduler::TaskId;
use crate::runtime::value::Value;

/// Event queued when a main thread task finishes
pub const TASK_COMPLETE_EVENT: &str = "task_complete";

/// Access to the computer a script is running on
#[derive(Clone)]
pub struct LuaContext {
    environment: Arc<dyn ApiEnvironment>,
}

impl fmt::Debug for LuaContext {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("LuaContext")
            .field("computer_id", &self.environment.computer_id())
            .finish()
    }
}

impl LuaContext {
    pub fn new(environment: Arc<dyn ApiEnvironment>) -> Self {
        Self { environment }
    }

    pub fn environment(&self) -> &Arc<dyn ApiEnvironment> {
        &self.environment
    }

    /// Queue `task` on the main thread without waiting for it.
    ///
    /// When it finishes, `task_complete(id, true, values...)` or
    /// `task_complete(id, false, message)` is queued to this computer.
    pub fn issue_main_thread_task<F>(
        &self,
        task: F,
    ) -> CallResult<TaskId>
    where
        F: FnOnce() -> CallResult<Vec<Value>> + Send + 'static,
    {
        let environment = self.environment.clone();
        let id = self
            .environment
            .main_thread()
            .enqueue(task, move |id, outcome| {
                let mut event = vec![Value::from(id)];
                match outcome {
                    Ok(values) => {
                        event.push(Value::Bool(true));
                        event.extend(values);
                    }
                    Err(err) => {
                        event.push(Value::Bool(false));
                        event.push(Value::from(err.message()));
                    }
                }
                environment.queue_event(TASK_COMPLETE_EVENT, event);
            })?;
        Ok(id)
    }

    /// Queue `task` on the main thread and wait for its result.
    pub fn execute_main_thread_task<F>(
        &self,
        task: F,
    ) -> CallResult<MethodResult>
    where
        F: FnOnce() -> CallResult<Vec<Value>> + Send + 'static,
    {
        let id = self.issue_main_thread_task(task)?;
        Ok(await_task(id))
    }
}

fn await_task(id: TaskId) -> MethodResult {
    MethodResult::pull_event(Some(TASK_COMPLETE_EVENT), move |event: Vec<Value>| {
        if event.get(1) != Some(&Value::from(id)) {
            return Ok(await_task(id));
        }
        match event.get(2) {
            Some(Value::Bool(true)) => Ok(MethodResult::values(event.into_iter().skip(3).collect())),
            _ => {
                let message = event
                    .get(3)
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error")
                    .to_string();
                Err(MethodError::new(message))
            }
        }
    })
}
