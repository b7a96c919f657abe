//! VM errors

use thiserror::Error;

use crate::vm::thread::ThreadId;

/// VM result
pub type VMResult<T> = Result<T, VMError>;

/// VM errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VMError {
    #[error("attempt to index global '{0}' (a nil value)")]
    UnknownGlobal(String),

    #[error("attempt to call field '{method}' of '{global}' (a nil value)")]
    UnknownMethod { global: String, method: String },

    #[error("no such thread: {0}")]
    UnknownThread(ThreadId),

    #[error("Computer is not running")]
    NotRunning,
}
