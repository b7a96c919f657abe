//! Script values
//!
//! This module provides the dynamic value type exchanged between script
//! code and host capability methods.

pub mod runtime_value;
pub use runtime_value::*;
