//! Environment sensor

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::apis::peripheral::{Peripheral, PeripheralAccess};
use crate::bridge::decl::{ClassDecl, Declared, MethodDecl, ParamType};
use crate::runtime::value::{TableKey, Value};

/// Reports what is around it. `scan` reads world state and so runs on the
/// main thread.
#[derive(Debug, Default)]
pub struct Sensor {
    entities: RwLock<Vec<String>>,
}

impl Sensor {
    pub fn new<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entities: RwLock::new(entities.into_iter().map(Into::into).collect()),
        }
    }

    pub fn set_entities(
        &self,
        entities: Vec<String>,
    ) {
        *self.entities.write() = entities;
    }
}

static SENSOR: Lazy<ClassDecl> = Lazy::new(|| {
    ClassDecl::new::<Sensor>("Sensor")
        .method(
            MethodDecl::instance("scan", |call| {
                let entities = call.receiver::<Sensor>()?.entities.read().clone();
                Ok(Value::list(entities.into_iter().map(Value::from)))
            })
            .main_thread(),
        )
        .method(
            MethodDecl::instance("getNeighbours", |call| {
                let access = call.context::<PeripheralAccess>(0)?;
                let own = access.attachment_name()?;
                let neighbours = access
                    .available_peripherals()?
                    .into_iter()
                    .filter(|(name, _)| name != own)
                    .map(|(name, peripheral)| {
                        (TableKey::from(name.as_str()), Value::from(peripheral.get_type()))
                    });
                Ok(Value::table(neighbours))
            })
            .param(ParamType::context::<PeripheralAccess>()),
        )
});

impl Declared for Sensor {
    fn declaration(&self) -> &'static ClassDecl {
        &SENSOR
    }
}

impl Peripheral for Sensor {
    fn get_type(&self) -> &str {
        "sensor"
    }

    fn attach(
        &self,
        access: &Arc<PeripheralAccess>,
    ) {
        let _ = access.queue_event("sensor_ready", vec![Value::from(access.side().name())]);
    }
}
