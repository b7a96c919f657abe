//! Peripheral API
//!
//! Six fixed slots, one per [`ComputerSide`], each holding at most one
//! [`PeripheralAccess`]. Slot changes come from the main thread while
//! scripts read the table and call into peripherals; every read and write of
//! the table happens under one lock, and that lock is never held while a
//! peripheral runs its own code.
//!
//! ```text
//! Empty ──set──► Present ──start──► Attached ──stop──► Present
//!   ▲                                  │
//!   └────────────── set(None) ─────────┘
//! ```

pub mod access;
pub mod side;

pub use access::{Peripheral, PeripheralAccess};
pub use side::ComputerSide;

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;

use crate::apis::context::LuaContext;
use crate::apis::ApiEnvironment;
use crate::bridge::decl::{ClassDecl, ContextType, Declared, MethodDecl, ParamType};
use crate::bridge::generator::Generator;
use crate::runtime::arguments::Arguments;
use crate::runtime::error::{CallResult, ErrorKind, MethodError};
use crate::runtime::method_result::MethodResult;
use crate::runtime::value::Value;
use crate::vm::ScriptApi;

/// Generator for peripheral methods: `(LuaContext, PeripheralAccess)`
pub static PERIPHERAL_METHODS: Lazy<Generator> = Lazy::new(|| {
    Generator::new(
        "peripheral",
        [
            ContextType::of::<LuaContext>(),
            ContextType::of::<PeripheralAccess>(),
        ],
    )
});

pub const ATTACH_EVENT: &str = "peripheral";
pub const DETACH_EVENT: &str = "peripheral_detach";

pub(crate) struct SlotTable {
    slots: [Option<Arc<PeripheralAccess>>; 6],
    running: bool,
}

pub(crate) struct Shared {
    table: Mutex<SlotTable>,
    environment: Arc<dyn ApiEnvironment>,
}

impl Shared {
    /// Copy of every slot
    pub(crate) fn snapshot(&self) -> [Option<Arc<PeripheralAccess>>; 6] {
        self.table.lock().slots.clone()
    }

    fn get(
        &self,
        side: ComputerSide,
    ) -> Option<Arc<PeripheralAccess>> {
        self.table.lock().slots[side.index()].clone()
    }
}

/// The `peripheral` script API
pub struct PeripheralApi {
    shared: Arc<Shared>,
}

impl fmt::Debug for PeripheralApi {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let table = self.shared.table.lock();
        f.debug_struct("PeripheralApi")
            .field("running", &table.running)
            .field("slots", &table.slots)
            .finish()
    }
}

impl PeripheralApi {
    pub fn new(environment: Arc<dyn ApiEnvironment>) -> Self {
        Self {
            shared: Arc::new(Shared {
                table: Mutex::new(SlotTable {
                    slots: Default::default(),
                    running: false,
                }),
                environment,
            }),
        }
    }

    /// Replace whatever is installed at `side`.
    ///
    /// A previously attached peripheral is detached first; the new one is
    /// attached straight away if the API is running.
    pub fn set_peripheral(
        &self,
        side: ComputerSide,
        peripheral: Option<Arc<dyn Peripheral>>,
    ) {
        let new = peripheral.map(|peripheral| {
            Arc::new(PeripheralAccess::new(
                side,
                peripheral,
                self.shared.environment.clone(),
                Arc::downgrade(&self.shared),
            ))
        });

        let (detached, attached) = {
            let mut table = self.shared.table.lock();
            let old = table.slots[side.index()].take();
            let detached = old.filter(|access| access.unlink());
            table.slots[side.index()] = new.clone();
            let attached = if table.running {
                new.filter(|access| access.link())
            } else {
                None
            };
            (detached, attached)
        };

        let environment = &self.shared.environment;
        if let Some(access) = detached {
            debug!("Detaching {} from {}", access.type_name(), side);
            access.run_detach();
            environment.queue_event(DETACH_EVENT, vec![Value::from(side.name())]);
        }
        if let Some(access) = attached {
            debug!("Attaching {} to {}", access.type_name(), side);
            access.run_attach();
            environment.queue_event(ATTACH_EVENT, vec![Value::from(side.name())]);
        }
    }

    /// Attach every present peripheral. Idempotent.
    pub fn start(&self) {
        let attached: Vec<_> = {
            let mut table = self.shared.table.lock();
            table.running = true;
            table
                .slots
                .iter()
                .flatten()
                .filter(|access| access.link())
                .cloned()
                .collect()
        };
        for access in attached {
            access.run_attach();
        }
    }

    /// Detach every attached peripheral. Idempotent.
    pub fn stop(&self) {
        let detached: Vec<_> = {
            let mut table = self.shared.table.lock();
            table.running = false;
            table
                .slots
                .iter()
                .flatten()
                .filter(|access| access.unlink())
                .cloned()
                .collect()
        };
        for access in detached {
            access.run_detach();
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.table.lock().running
    }

    /// The access installed at `side`, if any
    pub fn access(
        &self,
        side: ComputerSide,
    ) -> Option<Arc<PeripheralAccess>> {
        self.shared.get(side)
    }

    fn lookup(
        &self,
        side_name: &str,
    ) -> Option<Arc<PeripheralAccess>> {
        ComputerSide::from_name(side_name).and_then(|side| self.shared.get(side))
    }

    // ========================================================================
    // Script surface
    // ========================================================================

    pub fn is_present(
        &self,
        side: &str,
    ) -> bool {
        self.lookup(side).is_some()
    }

    pub fn get_type(
        &self,
        side: &str,
    ) -> Option<String> {
        self.lookup(side).map(|access| access.type_name().to_string())
    }

    pub fn get_methods(
        &self,
        side: &str,
    ) -> Option<Vec<String>> {
        self.lookup(side).map(|access| access.method_names())
    }

    /// `call(side, method, ...)`
    pub fn call(
        &self,
        context: &Arc<LuaContext>,
        args: &Arguments,
    ) -> CallResult<MethodResult> {
        let side = args.get_string(0)?;
        let method = args.get_string(1)?;
        let method_args = args.drop(2)?;

        let access = self
            .lookup(&side)
            .ok_or_else(|| MethodError::from(ErrorKind::NoSuchCapability))?;
        if !access.is_attached() {
            return Err(ErrorKind::NotAttached.into());
        }

        // This call is one frame the script never sees.
        match access.call(context, &method, method_args) {
            Ok(result) => Ok(result.adjust_error(1)),
            Err(err) => Err(err.adjusted(1)),
        }
    }
}

static PERIPHERAL_API: Lazy<ClassDecl> = Lazy::new(|| {
    ClassDecl::new::<PeripheralApi>("PeripheralApi")
        .method(
            MethodDecl::instance("isPresent", |call| {
                Ok(call.receiver::<PeripheralApi>()?.is_present(&call.string(0)?))
            })
            .param(ParamType::String),
        )
        .method(
            MethodDecl::instance("getType", |call| {
                Ok(call.receiver::<PeripheralApi>()?.get_type(&call.string(0)?))
            })
            .param(ParamType::String),
        )
        .method(
            MethodDecl::instance("getMethods", |call| {
                let methods = call.receiver::<PeripheralApi>()?.get_methods(&call.string(0)?);
                Ok(methods.map(|names| Value::list(names.into_iter().map(Value::from))))
            })
            .param(ParamType::String),
        )
        .method(
            MethodDecl::instance("call", |call| {
                let api = call.receiver::<PeripheralApi>()?;
                api.call(&call.context_arc::<LuaContext>(0)?, call.arguments(1)?)
            })
            .param(ParamType::context::<LuaContext>())
            .param(ParamType::Arguments),
        )
});

impl Declared for PeripheralApi {
    fn declaration(&self) -> &'static ClassDecl {
        &PERIPHERAL_API
    }
}

impl ScriptApi for PeripheralApi {
    fn names(&self) -> &[&'static str] {
        &["peripheral"]
    }

    fn startup(&self) {
        self.start();
    }

    fn shutdown(&self) {
        self.stop();
    }
}
