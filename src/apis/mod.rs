//! Script-facing APIs and the environment they run against

pub mod context;
pub mod peripheral;

pub use context::{LuaContext, TASK_COMPLETE_EVENT};
pub use peripheral::{ComputerSide, Peripheral, PeripheralAccess, PeripheralApi};

use std::collections::VecDeque;
use std::fmt;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::bridge::decl::ContextType;
use crate::bridge::generator::Generator;
use crate::filesystem::FileSystem;
use crate::runtime::scheduler::MainThreadHandle;
use crate::runtime::value::Value;
use crate::util::config::BridgeConfig;

/// Generator for methods called directly from scripts
pub static LUA_METHODS: Lazy<Generator> =
    Lazy::new(|| Generator::new("lua", [ContextType::of::<LuaContext>()]));

/// What a computer offers to its APIs
pub trait ApiEnvironment: Send + Sync {
    fn computer_id(&self) -> u32;

    /// Queue an event for the script threads
    fn queue_event(
        &self,
        event: &str,
        args: Vec<Value>,
    );

    fn file_system(&self) -> &FileSystem;

    fn main_thread(&self) -> &MainThreadHandle;

    /// Whether host faults should be logged
    fn log_host_errors(&self) -> bool {
        true
    }
}

/// Default [`ApiEnvironment`]: an event queue, a mount table and a main
/// thread handle.
pub struct Environment {
    computer_id: u32,
    log_host_errors: bool,
    events: Mutex<VecDeque<Vec<Value>>>,
    file_system: FileSystem,
    main_thread: MainThreadHandle,
}

impl fmt::Debug for Environment {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Environment")
            .field("computer_id", &self.computer_id)
            .field("pending_events", &self.events.lock().len())
            .field("file_system", &self.file_system)
            .finish()
    }
}

impl Environment {
    pub fn new(
        config: &BridgeConfig,
        main_thread: MainThreadHandle,
    ) -> Self {
        Self {
            computer_id: config.computer_id,
            log_host_errors: config.log_host_errors,
            events: Mutex::new(VecDeque::new()),
            file_system: FileSystem::new(),
            main_thread,
        }
    }

    /// Take the oldest queued event. The first value is the event name.
    pub fn pop_event(&self) -> Option<Vec<Value>> {
        self.events.lock().pop_front()
    }

    /// Take every queued event
    pub fn drain_events(&self) -> Vec<Vec<Value>> {
        self.events.lock().drain(..).collect()
    }

    pub fn pending_events(&self) -> usize {
        self.events.lock().len()
    }
}

impl ApiEnvironment for Environment {
    fn computer_id(&self) -> u32 {
        self.computer_id
    }

    fn queue_event(
        &self,
        event: &str,
        args: Vec<Value>,
    ) {
        let mut values = Vec::with_capacity(args.len() + 1);
        values.push(Value::from(event));
        values.extend(args);
        self.events.lock().push_back(values);
    }

    fn file_system(&self) -> &FileSystem {
        &self.file_system
    }

    fn main_thread(&self) -> &MainThreadHandle {
        &self.main_thread
    }

    fn log_host_errors(&self) -> bool {
        self.log_host_errors
    }
}
