//! Disk drive
//!
//! Holds at most one disk. While attached, the disk's contents are mounted
//! at the first free `disk`, `disk2`, ... location. Detaching never
//! unmounts by hand: the access drops every mount it made.

use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::apis::peripheral::{Peripheral, PeripheralAccess};
use crate::bridge::decl::{ClassDecl, Declared, MethodDecl, ParamType};
use crate::filesystem::MemoryMount;
use crate::runtime::error::CallResult;
use crate::runtime::value::Value;

const MAX_DISK_MOUNTS: usize = 64;

/// A floppy disk
#[derive(Debug, Clone)]
pub struct Disk {
    pub id: u32,
    pub label: Option<String>,
    pub contents: Arc<MemoryMount>,
}

impl Disk {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            label: None,
            contents: Arc::new(MemoryMount::new()),
        }
    }

    pub fn with_label(
        mut self,
        label: impl Into<String>,
    ) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Default)]
struct DriveState {
    disk: Option<Disk>,
    mount_path: Option<String>,
    access: Weak<PeripheralAccess>,
}

#[derive(Debug, Default)]
pub struct DiskDrive {
    state: Mutex<DriveState>,
}

impl DiskDrive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `disk`, returning the disk it replaced
    pub fn insert(
        &self,
        disk: Disk,
    ) -> Option<Disk> {
        let previous = self.eject();
        let mut state = self.state.lock();
        state.disk = Some(disk);
        if let Some(access) = state.access.upgrade() {
            state.mount_path = mount_disk(&access, &state);
            let _ = access.queue_event("disk", vec![Value::from(access.side().name())]);
        }
        previous
    }

    /// Remove the disk, if any
    pub fn eject(&self) -> Option<Disk> {
        let mut state = self.state.lock();
        let disk = state.disk.take()?;
        if let Some(access) = state.access.upgrade() {
            if let Some(path) = state.mount_path.take() {
                if let Err(err) = access.unmount(&path) {
                    warn!("Cannot unmount disk at {}: {}", path, err);
                }
            }
            let _ = access.queue_event("disk_eject", vec![Value::from(access.side().name())]);
        }
        Some(disk)
    }

    pub fn mount_path(&self) -> Option<String> {
        self.state.lock().mount_path.clone()
    }

    fn with_disk<T>(
        &self,
        f: impl FnOnce(&Disk) -> T,
    ) -> Option<T> {
        self.state.lock().disk.as_ref().map(f)
    }

    fn set_label(
        &self,
        label: Option<String>,
    ) -> CallResult<()> {
        if let Some(disk) = self.state.lock().disk.as_mut() {
            disk.label = label;
        }
        Ok(())
    }
}

fn mount_disk(
    access: &PeripheralAccess,
    state: &DriveState,
) -> Option<String> {
    let disk = state.disk.as_ref()?;
    for n in 1..=MAX_DISK_MOUNTS {
        let location = if n == 1 {
            "disk".to_string()
        } else {
            format!("disk{}", n)
        };
        match access.mount_writable(&location, disk.contents.clone(), "disk") {
            Ok(Some(path)) => {
                debug!("Mounted disk {} at {}", disk.id, path);
                return Some(path);
            }
            Ok(None) => continue,
            Err(_) => return None,
        }
    }
    None
}

static DISK_DRIVE: Lazy<ClassDecl> = Lazy::new(|| {
    ClassDecl::new::<DiskDrive>("DiskDrive")
        .method(MethodDecl::instance("isDiskPresent", |call| {
            Ok(call.receiver::<DiskDrive>()?.with_disk(|_| ()).is_some())
        }))
        .method(MethodDecl::instance("getDiskLabel", |call| {
            Ok(call.receiver::<DiskDrive>()?.with_disk(|d| d.label.clone()).flatten())
        }))
        .method(
            MethodDecl::instance("setDiskLabel", |call| {
                let label = call.opt_string(0)?.map(|s| s.to_string());
                call.receiver::<DiskDrive>()?.set_label(label)
            })
            .param(ParamType::optional(ParamType::String))
            .main_thread(),
        )
        .method(MethodDecl::instance("hasData", |call| {
            Ok(call.receiver::<DiskDrive>()?.mount_path().is_some())
        }))
        .method(MethodDecl::instance("getMountPath", |call| {
            Ok(call.receiver::<DiskDrive>()?.mount_path())
        }))
        .method(MethodDecl::instance("getDiskID", |call| {
            Ok(call.receiver::<DiskDrive>()?.with_disk(|d| d.id))
        }))
        .method(
            MethodDecl::instance("ejectDisk", |call| {
                call.receiver::<DiskDrive>()?.eject();
                Ok(())
            })
            .main_thread(),
        )
});

impl Declared for DiskDrive {
    fn declaration(&self) -> &'static ClassDecl {
        &DISK_DRIVE
    }
}

impl Peripheral for DiskDrive {
    fn get_type(&self) -> &str {
        "drive"
    }

    fn attach(
        &self,
        access: &Arc<PeripheralAccess>,
    ) {
        let mut state = self.state.lock();
        state.access = Arc::downgrade(access);
        state.mount_path = mount_disk(access, &state);
    }

    fn detach(
        &self,
        _access: &Arc<PeripheralAccess>,
    ) {
        let mut state = self.state.lock();
        state.access = Weak::new();
        state.mount_path = None;
    }
}
