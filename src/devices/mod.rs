//! Reference devices
//!
//! | Type | Shows |
//! |---|---|
//! | [`Speaker`] | enum and optional parameters |
//! | [`DiskDrive`] | mounts tied to attachment, main thread methods |
//! | [`Sensor`] | main thread reads, neighbour lookup |
//! | [`Chest`] | generic methods from [`inventory::generic_source`] |

pub mod drive;
pub mod inventory;
pub mod sensor;
pub mod speaker;

pub use drive::{Disk, DiskDrive};
pub use inventory::{Chest, ItemStack};
pub use sensor::Sensor;
pub use speaker::{Sound, Speaker};

use std::sync::{Arc, Once};

use crate::apis::peripheral::Peripheral;
use crate::bridge::decl::register_generic_source;

static INSTALL: Once = Once::new();

/// Register the generic methods these devices rely on. Safe to call more
/// than once.
pub fn install() {
    INSTALL.call_once(|| register_generic_source(inventory::generic_source()));
}

/// Type names accepted by [`create`]
pub const DEVICE_TYPES: &[&str] = &["speaker", "drive", "sensor", "chest"];

/// Build a fresh device by type name
pub fn create(name: &str) -> Option<Arc<dyn Peripheral>> {
    install();
    let device: Arc<dyn Peripheral> = match name {
        "speaker" => Arc::new(Speaker::new()),
        "drive" => Arc::new(DiskDrive::new()),
        "sensor" => Arc::new(Sensor::new(["minecraft:pig", "minecraft:cow"])),
        "chest" => Arc::new(Chest::default()),
        _ => return None,
    };
    Some(device)
}
