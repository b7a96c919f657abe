//! Attached peripherals and the services they may use

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use tracing::error;

use crate::apis::context::LuaContext;
use crate::apis::peripheral::{ComputerSide, Shared, PERIPHERAL_METHODS};
use crate::apis::ApiEnvironment;
use crate::bridge::decl::{ContextValue, Declared, Instance};
use crate::bridge::generator::Trampoline;
use crate::filesystem::{Mount, WritableMount};
use crate::runtime::arguments::Arguments;
use crate::runtime::error::{panic_message, CallResult, ErrorKind, MethodError};
use crate::runtime::method_result::MethodResult;
use crate::runtime::value::Value;

/// A device that can be attached to a computer
///
/// Declared methods are discovered through [`Declared::declaration`];
/// devices whose method set is only known at runtime list it in
/// [`Peripheral::dynamic_methods`] and dispatch it in
/// [`Peripheral::call_dynamic`].
pub trait Peripheral: Declared {
    /// Type name reported to scripts
    fn get_type(&self) -> &str;

    /// Names of methods resolved at runtime
    fn dynamic_methods(&self) -> Vec<String> {
        Vec::new()
    }

    /// Call the dynamic method at `method` in [`Peripheral::dynamic_methods`]
    fn call_dynamic(
        &self,
        _context: &Arc<LuaContext>,
        _access: &Arc<PeripheralAccess>,
        method: usize,
        _args: Arguments,
    ) -> CallResult<MethodResult> {
        Err(ErrorKind::NoSuchMethod(format!("#{}", method)).into())
    }

    /// Called once the peripheral is attached
    fn attach(
        &self,
        _access: &Arc<PeripheralAccess>,
    ) {
    }

    /// Called before the peripheral is detached. Services are still
    /// available until this returns.
    fn detach(
        &self,
        _access: &Arc<PeripheralAccess>,
    ) {
    }
}

#[derive(Debug, Clone)]
enum MethodEntry {
    Generated(Trampoline),
    Dynamic(usize),
}

/// A peripheral installed in a slot
pub struct PeripheralAccess {
    side: ComputerSide,
    peripheral: Arc<dyn Peripheral>,
    instance: Instance,
    type_name: String,
    methods: IndexMap<String, MethodEntry>,
    /// Owned by the slot table; flipped under its lock
    linked: AtomicBool,
    /// Services available
    attached: AtomicBool,
    mounts: Mutex<IndexSet<String>>,
    environment: Arc<dyn ApiEnvironment>,
    registry: Weak<Shared>,
}

impl fmt::Debug for PeripheralAccess {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("PeripheralAccess")
            .field("side", &self.side)
            .field("type", &self.type_name)
            .field("attached", &self.is_attached())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PeripheralAccess {
    pub(crate) fn new(
        side: ComputerSide,
        peripheral: Arc<dyn Peripheral>,
        environment: Arc<dyn ApiEnvironment>,
        registry: Weak<Shared>,
    ) -> Self {
        let dynamic = peripheral.dynamic_methods();
        let generated = PERIPHERAL_METHODS.get_methods(peripheral.declaration());

        let mut methods = IndexMap::with_capacity(dynamic.len() + generated.len());
        for (index, name) in dynamic.into_iter().enumerate() {
            methods.insert(name, MethodEntry::Dynamic(index));
        }
        for named in generated.iter() {
            methods.insert(
                named.name.to_string(),
                MethodEntry::Generated(named.method.clone()),
            );
        }

        Self {
            side,
            type_name: peripheral.get_type().to_string(),
            instance: peripheral.clone().as_instance(),
            peripheral,
            methods,
            linked: AtomicBool::new(false),
            attached: AtomicBool::new(false),
            mounts: Mutex::new(IndexSet::new()),
            environment,
            registry,
        }
    }

    pub fn side(&self) -> ComputerSide {
        self.side
    }

    pub fn peripheral(&self) -> &Arc<dyn Peripheral> {
        &self.peripheral
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Exported method names: dynamic ones first
    pub fn method_names(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Life-cycle (driven by the slot table)
    // ========================================================================

    /// Claim the attach transition. Services become available immediately.
    pub(crate) fn link(&self) -> bool {
        if self.linked.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.attached.store(true, Ordering::SeqCst);
        true
    }

    /// Claim the detach transition
    pub(crate) fn unlink(&self) -> bool {
        self.linked.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn run_attach(self: &Arc<Self>) {
        self.guard_hook("attach", || self.peripheral.attach(self));
    }

    pub(crate) fn run_detach(self: &Arc<Self>) {
        self.guard_hook("detach", || self.peripheral.detach(self));
        self.unmount_all();
        self.attached.store(false, Ordering::SeqCst);
    }

    fn guard_hook(
        &self,
        hook: &str,
        f: impl FnOnce(),
    ) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
            error!(
                "Peripheral {} on {} panicked in {}: {}",
                self.type_name,
                self.side,
                hook,
                panic_message(payload.as_ref())
            );
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Invoke an exported method
    pub fn call(
        self: &Arc<Self>,
        context: &Arc<LuaContext>,
        method: &str,
        args: Arguments,
    ) -> CallResult<MethodResult> {
        let entry = self
            .methods
            .get(method)
            .ok_or_else(|| MethodError::from(ErrorKind::NoSuchMethod(method.to_string())))?;

        match entry {
            MethodEntry::Generated(trampoline) => {
                let contexts: [ContextValue; 2] = [context.clone(), self.clone()];
                trampoline.apply(&self.instance, &contexts, args)
            }
            MethodEntry::Dynamic(index) => self.peripheral.call_dynamic(context, self, *index, args),
        }
    }

    // ========================================================================
    // Services
    // ========================================================================

    fn check_attached(&self) -> CallResult<()> {
        if self.is_attached() {
            Ok(())
        } else {
            Err(ErrorKind::NotAttached.into())
        }
    }

    /// Mount `mount` at `location` under `drive_name`. Returns the location
    /// used, or `None` if it is taken.
    pub fn mount(
        &self,
        location: &str,
        mount: Arc<dyn Mount>,
        drive_name: &str,
    ) -> CallResult<Option<String>> {
        self.check_attached()?;
        let fs = self.environment.file_system();
        let mut mounts = self.mounts.lock();
        let location = crate::filesystem::sanitize_path(location);
        if fs.exists(&location) || fs.mount(drive_name, &location, mount).is_err() {
            return Ok(None);
        }
        mounts.insert(location.clone());
        Ok(Some(location))
    }

    /// Writable variant of [`PeripheralAccess::mount`]
    pub fn mount_writable(
        &self,
        location: &str,
        mount: Arc<dyn WritableMount>,
        drive_name: &str,
    ) -> CallResult<Option<String>> {
        self.check_attached()?;
        let fs = self.environment.file_system();
        let mut mounts = self.mounts.lock();
        let location = crate::filesystem::sanitize_path(location);
        if fs.exists(&location) || fs.mount_writable(drive_name, &location, mount).is_err() {
            return Ok(None);
        }
        mounts.insert(location.clone());
        Ok(Some(location))
    }

    /// Unmount a location this peripheral mounted
    pub fn unmount(
        &self,
        location: &str,
    ) -> CallResult<()> {
        self.check_attached()?;
        let location = crate::filesystem::sanitize_path(location);
        let mut mounts = self.mounts.lock();
        if !mounts.shift_remove(&location) {
            return Err(MethodError::new("You didn't mount this location"));
        }
        self.environment.file_system().unmount(&location);
        Ok(())
    }

    /// Locations currently mounted by this peripheral
    pub fn mounted(&self) -> Vec<String> {
        self.mounts.lock().iter().cloned().collect()
    }

    fn unmount_all(&self) {
        let fs = self.environment.file_system();
        for location in self.mounts.lock().drain(..) {
            fs.unmount(&location);
        }
    }

    pub fn computer_id(&self) -> CallResult<u32> {
        self.check_attached()?;
        Ok(self.environment.computer_id())
    }

    /// Queue an event for the computer's scripts
    pub fn queue_event(
        &self,
        event: &str,
        args: Vec<Value>,
    ) -> CallResult<()> {
        self.check_attached()?;
        self.environment.queue_event(event, args);
        Ok(())
    }

    /// Name this peripheral is attached under
    pub fn attachment_name(&self) -> CallResult<&'static str> {
        self.check_attached()?;
        Ok(self.side.name())
    }

    /// Every attached peripheral, keyed by attachment name
    pub fn available_peripherals(&self) -> CallResult<IndexMap<String, Arc<dyn Peripheral>>> {
        self.check_attached()?;
        Ok(self
            .attached_snapshot()
            .into_iter()
            .map(|access| (access.side.name().to_string(), access.peripheral.clone()))
            .collect())
    }

    /// The attached peripheral called `name`, if any
    pub fn available_peripheral(
        &self,
        name: &str,
    ) -> CallResult<Option<Arc<dyn Peripheral>>> {
        self.check_attached()?;
        Ok(self
            .attached_snapshot()
            .into_iter()
            .find(|access| access.side.name() == name)
            .map(|access| access.peripheral.clone()))
    }

    fn attached_snapshot(&self) -> Vec<Arc<PeripheralAccess>> {
        match self.registry.upgrade() {
            Some(shared) => shared
                .snapshot()
                .into_iter()
                .flatten()
                .filter(|access| access.is_attached())
                .collect(),
            None => Vec::new(),
        }
    }
}
