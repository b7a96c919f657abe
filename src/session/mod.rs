//! Scripted sessions
//!
//! A session is a list of [`Step`]s run against one [`Computer`]. Calls go
//! through the `peripheral` global exactly as a script's would, so every
//! step exercises the whole bridge.
//!
//! ```ron
//! (
//!     steps: [
//!         Attach("top", "speaker"),
//!         Start,
//!         Call("top", "playNote", ["bell", 0.5]),
//!         Events,
//!     ],
//! )
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::apis::peripheral::{ComputerSide, PeripheralApi};
use crate::devices;
use crate::runtime::value::Value;
use crate::util::config::BridgeConfig;
use crate::vm::{VMError, VM};

/// How often a waiting call may tick the main thread before the step gives up
pub const MAX_CALL_TICKS: usize = 16;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read session: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse session: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("unknown side '{0}'")]
    UnknownSide(String),

    #[error("unknown device '{0}'")]
    UnknownDevice(String),

    #[error(transparent)]
    VM(#[from] VMError),
}

/// A literal call argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<Arg> for Value {
    fn from(arg: Arg) -> Self {
        match arg {
            Arg::Bool(b) => Value::Bool(b),
            Arg::Int(i) => Value::Int(i),
            Arg::Float(f) => Value::Float(f),
            Arg::Str(s) => Value::from(s),
        }
    }
}

/// One session step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    /// Install a new device of the named type
    Attach(String, String),
    /// Empty a slot
    Detach(String),
    Start,
    Stop,
    /// `peripheral.call(side, method, args...)`
    Call(String, String, Vec<Arg>),
    /// Run one main thread tick
    Tick,
    /// Take the queued events
    Events,
}

impl fmt::Display for Step {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Step::Attach(side, device) => write!(f, "attach {} to {}", device, side),
            Step::Detach(side) => write!(f, "detach {}", side),
            Step::Start => f.write_str("start"),
            Step::Stop => f.write_str("stop"),
            Step::Call(side, method, args) => {
                write!(f, "call {}.{}(", side, method)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", Value::from(arg.clone()))?;
                }
                f.write_str(")")
            }
            Step::Tick => f.write_str("tick"),
            Step::Events => f.write_str("events"),
        }
    }
}

/// A session file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub steps: Vec<Step>,
}

impl Session {
    pub fn from_ron_str(source: &str) -> Result<Self, SessionError> {
        Ok(ron::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_ron_str(&source)
    }
}

/// What a step produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Done,
    Returned { values: Vec<Value> },
    Failed { message: String, level: u32 },
    Waiting,
    Ticked { tasks: usize },
    Events { events: Vec<Vec<Value>> },
}

/// A script machine with the peripheral API installed
pub struct Computer {
    vm: VM,
    peripherals: Arc<PeripheralApi>,
}

impl fmt::Debug for Computer {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Computer")
            .field("vm", &self.vm)
            .field("peripherals", &self.peripherals)
            .finish()
    }
}

impl Computer {
    pub fn new(config: BridgeConfig) -> Self {
        devices::install();
        let mut vm = VM::new(config);
        let peripherals = Arc::new(PeripheralApi::new(vm.api_environment()));
        vm.add_api(peripherals.clone());
        Self { vm, peripherals }
    }

    pub fn vm(&self) -> &VM {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut VM {
        &mut self.vm
    }

    pub fn peripherals(&self) -> &Arc<PeripheralApi> {
        &self.peripherals
    }

    /// Run every step in order
    pub fn run(
        &mut self,
        session: &Session,
    ) -> Result<Vec<(Step, Outcome)>, SessionError> {
        let mut outcomes = Vec::with_capacity(session.steps.len());
        for step in &session.steps {
            let outcome = self.step(step)?;
            outcomes.push((step.clone(), outcome));
        }
        Ok(outcomes)
    }

    pub fn step(
        &mut self,
        step: &Step,
    ) -> Result<Outcome, SessionError> {
        debug!("Session step: {}", step);
        let outcome = match step {
            Step::Attach(side, device) => {
                let side = parse_side(side)?;
                let device =
                    devices::create(device).ok_or_else(|| SessionError::UnknownDevice(device.clone()))?;
                self.peripherals.set_peripheral(side, Some(device));
                Outcome::Done
            }
            Step::Detach(side) => {
                self.peripherals.set_peripheral(parse_side(side)?, None);
                Outcome::Done
            }
            Step::Start => {
                self.vm.startup();
                Outcome::Done
            }
            Step::Stop => {
                self.vm.shutdown();
                Outcome::Done
            }
            Step::Call(side, method, args) => {
                let mut values = vec![Value::from(side.as_str()), Value::from(method.as_str())];
                values.extend(args.iter().cloned().map(Value::from));
                match self.vm.call("peripheral", "call", values, MAX_CALL_TICKS)? {
                    Some(Ok(values)) => Outcome::Returned { values },
                    Some(Err(err)) => Outcome::Failed {
                        message: err.message,
                        level: err.level,
                    },
                    None => Outcome::Waiting,
                }
            }
            Step::Tick => Outcome::Ticked {
                tasks: self.vm.tick(),
            },
            Step::Events => Outcome::Events {
                events: self.vm.environment().drain_events(),
            },
        };
        Ok(outcome)
    }
}

fn parse_side(name: &str) -> Result<ComputerSide, SessionError> {
    ComputerSide::from_name(name).ok_or_else(|| SessionError::UnknownSide(name.to_string()))
}
