//! Calling convention of host methods
//!
//! A host method either finishes immediately with a list of values, or asks
//! the interpreter to park the calling script thread. In the latter case it
//! hands back a `Continuation` that is resumed with whatever values the
//! script thread is later resumed with (typically an event), and which may
//! itself finish or park again.
//!
//! ```text
//! call ──► Done(values) ─────────────────────────────► caller
//!   │
//!   └────► Pending(yielded, k) ──resume(event)──► k(event) ──► Done / Pending ...
//! ```

use std::fmt;

use crate::runtime::error::{CallResult, MethodError};
use crate::runtime::value::Value;

/// Event name that aborts any `pull_event` wait
pub const TERMINATE_EVENT: &str = "terminate";

/// Resumable half of a suspended host call
pub trait Continuation: Send {
    /// Resume with the values the script thread was resumed with.
    fn resume(
        self: Box<Self>,
        values: Vec<Value>,
    ) -> CallResult<MethodResult>;
}

impl<F> Continuation for F
where
    F: FnOnce(Vec<Value>) -> CallResult<MethodResult> + Send,
{
    fn resume(
        self: Box<Self>,
        values: Vec<Value>,
    ) -> CallResult<MethodResult> {
        (*self)(values)
    }
}

/// Outcome of a host method call
pub enum MethodResult {
    /// Final values for the caller
    Done(Vec<Value>),

    /// Park the caller until resumed
    Pending {
        /// Values handed to the scheduler while parked (e.g. an event filter).
        /// They never reach the script caller.
        yielded: Vec<Value>,
        /// What to run on resume
        callback: Box<dyn Continuation>,
        /// Extra attribution levels for errors raised on resume
        error_adjust: u32,
    },
}

impl fmt::Debug for MethodResult {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            MethodResult::Done(values) => f.debug_tuple("Done").field(values).finish(),
            MethodResult::Pending {
                yielded,
                error_adjust,
                ..
            } => f
                .debug_struct("Pending")
                .field("yielded", yielded)
                .field("error_adjust", error_adjust)
                .finish_non_exhaustive(),
        }
    }
}

impl MethodResult {
    /// No values
    pub fn of() -> Self {
        MethodResult::Done(Vec::new())
    }

    /// A single value
    pub fn value(value: impl Into<Value>) -> Self {
        MethodResult::Done(vec![value.into()])
    }

    /// Several values
    pub fn values(values: Vec<Value>) -> Self {
        MethodResult::Done(values)
    }

    /// Yield `values` to the scheduler and continue with `callback` on resume.
    pub fn yield_values<F>(
        values: Vec<Value>,
        callback: F,
    ) -> Self
    where
        F: FnOnce(Vec<Value>) -> CallResult<MethodResult> + Send + 'static,
    {
        Self::yield_boxed(values, Box::new(callback))
    }

    /// Like `yield_values`, for an already boxed continuation.
    pub fn yield_boxed(
        values: Vec<Value>,
        callback: Box<dyn Continuation>,
    ) -> Self {
        MethodResult::Pending {
            yielded: values,
            callback,
            error_adjust: 0,
        }
    }

    /// Wait for an event named `filter` (any event if `None`), without
    /// intercepting `terminate`.
    pub fn pull_event_raw<F>(
        filter: Option<&str>,
        callback: F,
    ) -> Self
    where
        F: FnOnce(Vec<Value>) -> CallResult<MethodResult> + Send + 'static,
    {
        let yielded = vec![filter.map(Value::from).unwrap_or(Value::Nil)];
        Self::yield_values(yielded, callback)
    }

    /// Wait for an event named `filter`. A `terminate` event aborts the wait
    /// with a "Terminated" error.
    pub fn pull_event<F>(
        filter: Option<&str>,
        callback: F,
    ) -> Self
    where
        F: FnOnce(Vec<Value>) -> CallResult<MethodResult> + Send + 'static,
    {
        Self::pull_event_raw(filter, move |event: Vec<Value>| {
            if event.first().and_then(Value::as_str) == Some(TERMINATE_EVENT) {
                return Err(MethodError::new("Terminated"));
            }
            callback(event)
        })
    }

    /// Increase the attribution of errors raised while resuming. Has no
    /// effect on a finished result.
    pub fn adjust_error(
        self,
        by: u32,
    ) -> Self {
        match self {
            MethodResult::Pending {
                yielded,
                callback,
                error_adjust,
            } => MethodResult::Pending {
                yielded,
                callback,
                error_adjust: error_adjust + by,
            },
            done => done,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MethodResult::Pending { .. })
    }

    /// Final values, if finished
    pub fn into_values(self) -> Option<Vec<Value>> {
        match self {
            MethodResult::Done(values) => Some(values),
            MethodResult::Pending { .. } => None,
        }
    }

    pub fn error_adjust(&self) -> u32 {
        match self {
            MethodResult::Done(_) => 0,
            MethodResult::Pending { error_adjust, .. } => *error_adjust,
        }
    }
}
