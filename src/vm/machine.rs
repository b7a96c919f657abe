//! Script machine
//!
//! Owns a computer's environment, its installed APIs and the script threads
//! currently calling into them. Scripts are not interpreted here; a thread
//! is one call to an API method, driven by the events the environment
//! queues.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::apis::context::LuaContext;
use crate::apis::{ApiEnvironment, Environment, LUA_METHODS};
use crate::bridge::decl::ContextValue;
use crate::bridge::interpreter::ResultInterpreterFn;
use crate::runtime::arguments::Arguments;
use crate::runtime::error::ScriptError;
use crate::runtime::scheduler::MainThread;
use crate::runtime::value::Value;
use crate::util::config::BridgeConfig;
use crate::vm::errors::{VMError, VMResult};
use crate::vm::thread::{ScriptThread, ThreadId};
use crate::vm::ScriptApi;

/// Machine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VMStatus {
    /// Not started, or shut down
    Stopped,
    /// APIs started, accepting calls
    Running,
}

/// Functions exported under one global name
type Global = IndexMap<&'static str, Arc<ResultInterpreterFn>>;

/// A computer: environment, APIs and script threads
pub struct VM {
    config: BridgeConfig,
    status: VMStatus,
    main_thread: MainThread,
    environment: Arc<Environment>,
    context: Arc<LuaContext>,
    apis: Vec<Arc<dyn ScriptApi>>,
    globals: IndexMap<&'static str, Global>,
    threads: IndexMap<ThreadId, ScriptThread>,
    next_thread: u64,
}

impl fmt::Debug for VM {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("VM")
            .field("status", &self.status)
            .field("globals", &self.globals.keys().collect::<Vec<_>>())
            .field("threads", &self.threads.len())
            .finish()
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl VM {
    pub fn new(config: BridgeConfig) -> Self {
        let main_thread = MainThread::with_config((&config).into());
        let environment = Arc::new(Environment::new(&config, main_thread.handle()));
        let context = Arc::new(LuaContext::new(environment.clone()));
        Self {
            config,
            status: VMStatus::Stopped,
            main_thread,
            environment,
            context,
            apis: Vec::new(),
            globals: IndexMap::new(),
            threads: IndexMap::new(),
            next_thread: 1,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn status(&self) -> VMStatus {
        self.status
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    /// Environment as seen by APIs
    pub fn api_environment(&self) -> Arc<dyn ApiEnvironment> {
        self.environment.clone()
    }

    pub fn context(&self) -> &Arc<LuaContext> {
        &self.context
    }

    pub fn main_thread(&self) -> &MainThread {
        &self.main_thread
    }

    /// Install an API under each of its global names.
    ///
    /// Methods come from the script-facing generator, bound to this
    /// machine's [`LuaContext`]. An API installed while running is started
    /// straight away.
    pub fn add_api(
        &mut self,
        api: Arc<dyn ScriptApi>,
    ) {
        let methods = LUA_METHODS.get_methods(api.declaration());
        let instance = api.clone().as_instance();
        let context: ContextValue = self.context.clone();

        let mut global = Global::new();
        for method in methods.iter() {
            let function = ResultInterpreterFn::new(
                instance.clone(),
                [context.clone()],
                method.method.clone(),
                self.config.log_host_errors,
            );
            global.insert(method.name, Arc::new(function));
        }

        for &name in api.names() {
            debug!("Installing API {} ({} methods)", name, global.len());
            if self.globals.insert(name, global.clone()).is_some() {
                warn!("API {} replaces an earlier one", name);
            }
        }

        if self.status == VMStatus::Running {
            api.startup();
        }
        self.apis.push(api);
    }

    /// Names of installed globals
    pub fn globals(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.globals.keys().copied()
    }

    /// Method names of `global`, in declaration order
    pub fn methods(
        &self,
        global: &str,
    ) -> VMResult<Vec<&'static str>> {
        self.globals
            .get(global)
            .map(|methods| methods.keys().copied().collect())
            .ok_or_else(|| VMError::UnknownGlobal(global.to_string()))
    }

    pub fn function(
        &self,
        global: &str,
        method: &str,
    ) -> VMResult<&Arc<ResultInterpreterFn>> {
        let methods = self
            .globals
            .get(global)
            .ok_or_else(|| VMError::UnknownGlobal(global.to_string()))?;
        methods.get(method).ok_or_else(|| VMError::UnknownMethod {
            global: global.to_string(),
            method: method.to_string(),
        })
    }

    /// Start every API. Idempotent.
    pub fn startup(&mut self) {
        if self.status == VMStatus::Running {
            return;
        }
        info!("Starting computer #{}", self.config.computer_id);
        for api in &self.apis {
            api.startup();
        }
        self.status = VMStatus::Running;
    }

    /// Stop every API and drop all threads. Idempotent.
    pub fn shutdown(&mut self) {
        if self.status == VMStatus::Stopped {
            return;
        }
        info!("Stopping computer #{}", self.config.computer_id);
        for api in self.apis.iter().rev() {
            api.shutdown();
        }
        self.threads.clear();
        self.environment.drain_events();
        self.status = VMStatus::Stopped;
    }

    /// Call `global.method(args...)` on a new thread.
    ///
    /// The call runs until it first finishes or yields.
    pub fn spawn(
        &mut self,
        global: &str,
        method: &str,
        args: Vec<Value>,
    ) -> VMResult<ThreadId> {
        if self.status != VMStatus::Running {
            return Err(VMError::NotRunning);
        }
        let function = self.function(global, method)?.clone();
        let id = ThreadId(self.next_thread);
        self.next_thread += 1;

        let step = function.invoke(Arguments::new(args));
        let thread = ScriptThread::new(id, format!("{}.{}", global, method), step);
        debug!("{:?}", thread);
        self.threads.insert(id, thread);
        Ok(id)
    }

    /// Call `global.method(args...)` and drive it to completion, ticking
    /// the main thread at most `max_ticks` times.
    pub fn call(
        &mut self,
        global: &str,
        method: &str,
        args: Vec<Value>,
        max_ticks: usize,
    ) -> VMResult<Option<Result<Vec<Value>, ScriptError>>> {
        let id = self.spawn(global, method, args)?;
        let mut ticks = 0;
        while !self.thread(id)?.is_done() && ticks < max_ticks {
            self.tick();
            ticks += 1;
        }
        self.take_result(id)
    }

    pub fn thread(
        &self,
        id: ThreadId,
    ) -> VMResult<&ScriptThread> {
        self.threads.get(&id).ok_or(VMError::UnknownThread(id))
    }

    pub fn threads(&self) -> impl Iterator<Item = &ScriptThread> {
        self.threads.values()
    }

    /// Remove a finished thread and return its outcome. `None` while it is
    /// still parked.
    pub fn take_result(
        &mut self,
        id: ThreadId,
    ) -> VMResult<Option<Result<Vec<Value>, ScriptError>>> {
        if !self.thread(id)?.is_done() {
            return Ok(None);
        }
        Ok(self
            .threads
            .shift_remove(&id)
            .and_then(ScriptThread::into_result))
    }

    /// Queue an event for the script threads
    pub fn queue_event(
        &self,
        event: &str,
        args: Vec<Value>,
    ) {
        self.environment.queue_event(event, args);
    }

    /// Deliver queued events to parked threads, oldest first. Each event
    /// goes to every thread whose filter accepts it; events nobody waits
    /// for are discarded. Returns the number of events delivered.
    pub fn pump(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(event) = self.environment.pop_event() {
            let mut woke = false;
            for thread in self.threads.values_mut() {
                if thread.accepts(&event) {
                    thread.resume(event.clone());
                    woke = true;
                }
            }
            if woke {
                delivered += 1;
            }
        }
        delivered
    }

    /// Run one main thread tick, then deliver the events it produced.
    /// Returns the number of main thread tasks run.
    pub fn tick(&mut self) -> usize {
        let ran = self.main_thread.tick();
        self.pump();
        ran
    }
}
