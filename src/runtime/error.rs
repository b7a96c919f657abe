//! Errors crossing the host/script boundary
//!
//! `MethodError` is the one application-error kind a host method may raise.
//! Every failure a script can observe (bad arguments, missing peripherals,
//! host faults) travels as a `MethodError` and is finally turned into the
//! interpreter's native `ScriptError` by the result interpreter.
//!
//! # Attribution levels
//!
//! A level tells the interpreter how many call frames upwards the error
//! should be blamed on. Level 0 means "unspecified" and is reported against
//! the innermost frame. Each synchronous indirection the bridge adds on top
//! of a call shifts a non-zero level by one; level 0 is never shifted.

use std::any::Any;

use thiserror::Error;

/// Result alias for host method bodies
pub type CallResult<T> = Result<T, MethodError>;

/// What went wrong
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// Free-form error raised by a host method
    #[error("{0}")]
    Message(String),

    /// Wrong argument type at a 1-based position
    #[error("bad argument #{position} (expected {expected}, got {actual})")]
    ArgumentType {
        position: usize,
        expected: String,
        actual: &'static str,
    },

    /// Argument had the right type but an unusable value
    #[error("bad argument #{position} ({message})")]
    BadArgument { position: usize, message: String },

    /// Caller misuse of an argument list
    #[error("{0}")]
    InvalidArgument(String),

    /// Capability service used while its provider is not attached
    #[error("Peripheral is not attached")]
    NotAttached,

    /// No provider present at the slot
    #[error("No peripheral attached")]
    NoSuchCapability,

    /// Provider has no method with this name
    #[error("No such method {0}")]
    NoSuchMethod(String),

    /// Unexpected host failure, already flattened to text
    #[error("Host exception thrown: {0}")]
    HostFault(String),
}

/// Application error raised by host methods
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct MethodError {
    kind: ErrorKind,
    level: u32,
}

impl MethodError {
    /// Unattributed error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Message(message.into()),
            level: 0,
        }
    }

    /// Error blamed `level` frames up
    pub fn with_level(
        message: impl Into<String>,
        level: u32,
    ) -> Self {
        Self {
            kind: ErrorKind::Message(message.into()),
            level,
        }
    }

    /// Argument type mismatch. `index` is 0-based; the message uses 1-based positions.
    pub fn argument_type(
        index: usize,
        expected: impl Into<String>,
        actual: &'static str,
    ) -> Self {
        ErrorKind::ArgumentType {
            position: index + 1,
            expected: expected.into(),
            actual,
        }
        .into()
    }

    /// Argument value error. `index` is 0-based.
    pub fn bad_argument(
        index: usize,
        message: impl Into<String>,
    ) -> Self {
        ErrorKind::BadArgument {
            position: index + 1,
            message: message.into(),
        }
        .into()
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn has_level(&self) -> bool {
        self.level > 0
    }

    /// Rendered message
    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    /// Shift the attribution by `by` frames. Unattributed errors stay unattributed.
    pub fn adjusted(
        mut self,
        by: u32,
    ) -> Self {
        if self.level > 0 {
            self.level += by;
        }
        self
    }
}

impl MethodError {
    /// Host fault built from a caught panic payload
    pub fn host_fault(payload: &(dyn Any + Send)) -> Self {
        ErrorKind::HostFault(panic_message(payload)).into()
    }
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl From<ErrorKind> for MethodError {
    fn from(kind: ErrorKind) -> Self {
        Self { kind, level: 0 }
    }
}

/// Native error signal handed to the script interpreter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptError {
    pub message: String,
    pub level: u32,
}

impl ScriptError {
    pub fn new(
        message: impl Into<String>,
        level: u32,
    ) -> Self {
        Self {
            message: message.into(),
            level,
        }
    }

    /// Translate an application error, applying a pending adjustment.
    pub fn from_method_error(
        error: MethodError,
        adjust: u32,
    ) -> Self {
        let level = error.level();
        let level = if level > 0 { level + adjust } else { 0 };
        Self {
            message: error.message(),
            level,
        }
    }
}
