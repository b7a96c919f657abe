//! Runtime system
//!
//! Script values, the host calling convention and the privileged main
//! thread scheduler.

pub mod arguments;
pub mod error;
pub mod method_result;
pub mod scheduler;
pub mod value;

pub use arguments::{Arguments, EnumDecl};
pub use error::{CallResult, ErrorKind, MethodError, ScriptError};
pub use method_result::{Continuation, MethodResult};
pub use value::{Table, TableKey, Value, ValueType};
