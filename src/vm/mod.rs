//! Script machine
//!
//! Installs [`ScriptApi`]s as globals and runs calls into them as script
//! threads that park on events.

pub use errors::{VMError, VMResult};
pub use machine::{VMStatus, VM};
pub use thread::{ScriptThread, ThreadId, ThreadStatus};

mod errors;
mod machine;
mod thread;

use crate::bridge::decl::Declared;

/// An API exposed to scripts as one or more globals
pub trait ScriptApi: Declared {
    /// Global names the API is installed under
    fn names(&self) -> &[&'static str];

    /// Called when the computer starts
    fn startup(&self) {}

    /// Called when the computer shuts down
    fn shutdown(&self) {}
}

#[cfg(test)]
mod tests;
