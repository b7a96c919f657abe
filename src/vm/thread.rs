//! Script threads
//!
//! A thread here is one native call in flight. It either finished, or is
//! parked on a [`SuspendedFrame`] waiting for an event.

use std::fmt;

use crate::bridge::interpreter::{NativeStep, SuspendedFrame};
use crate::runtime::error::ScriptError;
use crate::runtime::method_result::TERMINATE_EVENT;
use crate::runtime::value::Value;

/// Unique thread identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Thread({})", self.0)
    }
}

/// Thread status
#[derive(Debug, Clone, PartialEq)]
pub enum ThreadStatus {
    /// Waiting for an event; `None` accepts any event
    Parked(Option<String>),
    /// Returned
    Finished,
    /// Raised an error
    Failed,
}

enum ThreadState {
    Parked {
        filter: Option<String>,
        frame: SuspendedFrame,
    },
    Done(Result<Vec<Value>, ScriptError>),
}

/// A native call running on behalf of a script
pub struct ScriptThread {
    id: ThreadId,
    label: String,
    resumes: usize,
    state: ThreadState,
}

impl fmt::Debug for ScriptThread {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ScriptThread")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("status", &self.status())
            .finish()
    }
}

impl ScriptThread {
    pub(crate) fn new(
        id: ThreadId,
        label: impl Into<String>,
        step: Result<NativeStep, ScriptError>,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            resumes: 0,
            state: ThreadState::from_step(step),
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// What the thread is running
    pub fn label(&self) -> &str {
        &self.label
    }

    /// How often the thread has been resumed
    pub fn resumes(&self) -> usize {
        self.resumes
    }

    pub fn status(&self) -> ThreadStatus {
        match &self.state {
            ThreadState::Parked { filter, .. } => ThreadStatus::Parked(filter.clone()),
            ThreadState::Done(Ok(_)) => ThreadStatus::Finished,
            ThreadState::Done(Err(_)) => ThreadStatus::Failed,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, ThreadState::Done(_))
    }

    /// Final outcome, once done
    pub fn result(&self) -> Option<&Result<Vec<Value>, ScriptError>> {
        match &self.state {
            ThreadState::Done(result) => Some(result),
            ThreadState::Parked { .. } => None,
        }
    }

    pub(crate) fn into_result(self) -> Option<Result<Vec<Value>, ScriptError>> {
        match self.state {
            ThreadState::Done(result) => Some(result),
            ThreadState::Parked { .. } => None,
        }
    }

    /// Whether `event` would wake this thread
    pub fn accepts(
        &self,
        event: &[Value],
    ) -> bool {
        let ThreadState::Parked { filter, .. } = &self.state else {
            return false;
        };
        let name = event.first().and_then(Value::as_str);
        match filter {
            None => true,
            Some(filter) => name == Some(filter.as_str()) || name == Some(TERMINATE_EVENT),
        }
    }

    /// Resume with `event`. Does nothing unless the thread is parked.
    pub(crate) fn resume(
        &mut self,
        event: Vec<Value>,
    ) {
        let state = std::mem::replace(
            &mut self.state,
            ThreadState::Done(Err(ScriptError::new("cannot resume dead coroutine", 0))),
        );
        self.state = match state {
            ThreadState::Parked { frame, .. } => {
                self.resumes += 1;
                ThreadState::from_step(frame.resume(event))
            }
            done => done,
        };
    }
}

impl ThreadState {
    fn from_step(step: Result<NativeStep, ScriptError>) -> Self {
        match step {
            Ok(NativeStep::Return(values)) => ThreadState::Done(Ok(values)),
            Ok(NativeStep::Yield { values, frame }) => ThreadState::Parked {
                filter: values.first().and_then(Value::as_str).map(str::to_string),
                frame,
            },
            Err(err) => ThreadState::Done(Err(err)),
        }
    }
}
