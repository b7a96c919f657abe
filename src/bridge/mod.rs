//! Host method bridge
//!
//! How host objects become callable from scripts:
//! - [`decl`]: what a host type declares about its methods
//! - [`generator`]: cached trampolines built from those declarations
//! - [`main_thread`]: redirection of main-thread-only methods
//! - [`interpreter`]: trampolines driven through the script engine's
//!   yield/resume protocol

pub mod decl;
pub mod generator;
pub mod interpreter;
pub mod main_thread;

pub use decl::{
    ClassDecl, ContextType, Declared, GenericSource, Instance, Invocation, MethodDecl, ParamType,
    ReturnType, Throws,
};
pub use generator::{Generator, NamedMethod, Trampoline};
pub use interpreter::{NativeStep, ResultInterpreterFn, SuspendedFrame};

#[cfg(test)]
mod tests;
