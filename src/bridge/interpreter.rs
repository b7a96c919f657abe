//! Result interpreter
//!
//! Adapts a trampoline to the script engine's native calling convention.
//! A finished [`MethodResult`] returns its values straight away. A pending
//! one yields the calling thread; the engine hands whatever it is resumed
//! with back to [`SuspendedFrame::resume`], repeating until the call
//! finishes.
//!
//! ```text
//! invoke(args) ──► Return(values)
//!      │
//!      └────────► Yield(filter, frame) ── resume(event) ──► Return / Yield ...
//! ```

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::error;

use crate::bridge::decl::{ContextValue, Instance};
use crate::bridge::generator::Trampoline;
use crate::runtime::arguments::Arguments;
use crate::runtime::error::{panic_message, CallResult, MethodError, ScriptError};
use crate::runtime::method_result::{Continuation, MethodResult};
use crate::runtime::value::Value;

/// One step of a native call
pub enum NativeStep {
    /// The call finished with these values
    Return(Vec<Value>),
    /// The calling thread must yield `values` and resume `frame` later
    Yield {
        values: Vec<Value>,
        frame: SuspendedFrame,
    },
}

impl fmt::Debug for NativeStep {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            NativeStep::Return(values) => f.debug_tuple("Return").field(values).finish(),
            NativeStep::Yield { values, frame } => f
                .debug_struct("Yield")
                .field("values", values)
                .field("frame", frame)
                .finish(),
        }
    }
}

impl NativeStep {
    pub fn is_yield(&self) -> bool {
        matches!(self, NativeStep::Yield { .. })
    }
}

/// A host method bound to an instance and its context values
pub struct ResultInterpreterFn {
    instance: Instance,
    contexts: SmallVec<[ContextValue; 2]>,
    method: Trampoline,
    label: Arc<str>,
    log_host_errors: bool,
}

impl fmt::Debug for ResultInterpreterFn {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "ResultInterpreterFn({})", self.label)
    }
}

impl ResultInterpreterFn {
    pub fn new(
        instance: Instance,
        contexts: impl IntoIterator<Item = ContextValue>,
        method: Trampoline,
        log_host_errors: bool,
    ) -> Self {
        // Identify the instance, not just its class: two speakers share a
        // trampoline but not an address.
        let label = format!(
            "{}@{:p}.{}",
            method.class(),
            Arc::as_ptr(&instance),
            method.name()
        );
        Self {
            instance,
            contexts: contexts.into_iter().collect(),
            method,
            label: label.into(),
            log_host_errors,
        }
    }

    pub fn name(&self) -> &'static str {
        self.method.name()
    }

    /// Diagnostic name of the bound method
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn trampoline(&self) -> &Trampoline {
        &self.method
    }

    /// Call the method
    pub fn invoke(
        &self,
        args: Arguments,
    ) -> Result<NativeStep, ScriptError> {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.method.apply(&self.instance, &self.contexts, args)
        }));
        settle(&self.label, self.log_host_errors, outcome, 0)
    }
}

/// A native call waiting to be resumed
pub struct SuspendedFrame {
    label: Arc<str>,
    callback: Box<dyn Continuation>,
    error_adjust: u32,
    log_host_errors: bool,
}

impl fmt::Debug for SuspendedFrame {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SuspendedFrame")
            .field("label", &self.label)
            .field("error_adjust", &self.error_adjust)
            .finish_non_exhaustive()
    }
}

impl SuspendedFrame {
    /// Continue the call with the values the thread was resumed with
    pub fn resume(
        self,
        values: Vec<Value>,
    ) -> Result<NativeStep, ScriptError> {
        let SuspendedFrame {
            label,
            callback,
            error_adjust,
            log_host_errors,
        } = self;
        let outcome = catch_unwind(AssertUnwindSafe(move || callback.resume(values)));
        settle(&label, log_host_errors, outcome, error_adjust)
    }

    pub fn error_adjust(&self) -> u32 {
        self.error_adjust
    }
}

/// `inherited` is the adjustment of the frame being resumed; a re-yield
/// carries it forward on top of the new result's own adjustment.
fn settle(
    label: &Arc<str>,
    log_host_errors: bool,
    outcome: std::thread::Result<CallResult<MethodResult>>,
    inherited: u32,
) -> Result<NativeStep, ScriptError> {
    let result = match outcome {
        Ok(result) => result,
        Err(payload) => {
            if log_host_errors {
                error!(
                    "Error calling {}: {}",
                    label,
                    panic_message(payload.as_ref())
                );
            }
            return Err(ScriptError::from_method_error(
                MethodError::host_fault(payload.as_ref()),
                0,
            ));
        }
    };

    match result {
        Ok(MethodResult::Done(values)) => Ok(NativeStep::Return(values)),
        Ok(MethodResult::Pending {
            yielded,
            callback,
            error_adjust,
        }) => Ok(NativeStep::Yield {
            values: yielded,
            frame: SuspendedFrame {
                label: label.clone(),
                callback,
                error_adjust: inherited + error_adjust,
                log_host_errors,
            },
        }),
        Err(err) => Err(ScriptError::from_method_error(err, inherited)),
    }
}
