//! Periphery
//!
//! Host capabilities for an embedded script interpreter: host types declare
//! their methods once, the bridge turns them into cached trampolines, and
//! a six-slot peripheral registry routes script calls to attached devices.
//! Calls may finish immediately or suspend the calling script thread until
//! an event resumes it.
//!
//! # Example
//!
//! ```no_run
//! use periphery::{boot, BridgeConfig, Result};
//! use periphery::apis::ComputerSide;
//! use periphery::runtime::Value;
//!
//! fn main() -> Result<()> {
//!     let mut computer = boot(BridgeConfig::default());
//!     let speaker = periphery::devices::create("speaker").unwrap();
//!     computer.peripherals().set_peripheral(ComputerSide::Top, Some(speaker));
//!     let args = vec![Value::from("top"), Value::from("playNote"), Value::from("bell")];
//!     let result = computer.vm_mut().call("peripheral", "call", args, 16)?;
//!     println!("{:?}", result);
//!     Ok(())
//! }
//! ```

#![warn(rust_2018_idioms)]

// Public modules
pub mod apis;
pub mod bridge;
pub mod devices;
pub mod filesystem;
pub mod runtime;
pub mod session;
pub mod vm;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use thiserror::Error;

pub use session::{Computer, Outcome, Session, Step};
pub use util::config::BridgeConfig;

use std::path::Path;

use tracing::debug;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "periphery";

/// Create a computer with the peripheral API installed and started
pub fn boot(config: BridgeConfig) -> Computer {
    debug!("Booting computer #{}", config.computer_id);
    let mut computer = Computer::new(config);
    computer.vm_mut().startup();
    computer
}

/// Run a session file on a fresh, stopped computer
pub fn run_session_file(
    path: &Path,
    config: BridgeConfig,
) -> Result<Vec<(Step, Outcome)>> {
    debug!("Running session {}", path.display());
    let session = Session::load(path)
        .with_context(|| format!("Failed to load session: {}", path.display()))?;
    let mut computer = Computer::new(config);
    let outcomes = computer
        .run(&session)
        .with_context(|| format!("Session failed: {}", path.display()))?;
    Ok(outcomes)
}
