//! Chest and the generic inventory methods
//!
//! The inventory methods are declared once in a [`GenericSource`] and
//! picked up by every class tagged [`INVENTORY`].

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::apis::peripheral::Peripheral;
use crate::bridge::decl::{ClassDecl, Declared, GenericSource, Invocation, MethodDecl, ParamType};
use crate::runtime::error::{CallResult, MethodError};
use crate::runtime::value::{TableKey, Value};

/// Tag carried by inventories
pub const INVENTORY: &str = "inventory";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStack {
    pub name: String,
    pub count: u32,
}

impl ItemStack {
    pub fn new(
        name: impl Into<String>,
        count: u32,
    ) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }

    fn to_value(&self) -> Value {
        Value::table([
            ("name", Value::from(self.name.as_str())),
            ("count", Value::from(self.count)),
        ])
    }
}

#[derive(Debug)]
pub struct Chest {
    slots: Mutex<Vec<Option<ItemStack>>>,
}

impl Default for Chest {
    fn default() -> Self {
        Self::new(27)
    }
}

impl Chest {
    pub fn new(size: usize) -> Self {
        Self {
            slots: Mutex::new(vec![None; size]),
        }
    }

    pub fn size(&self) -> usize {
        self.slots.lock().len()
    }

    /// Put `stack` into `slot` (0-based), returning what was there
    pub fn set_slot(
        &self,
        slot: usize,
        stack: Option<ItemStack>,
    ) -> Option<ItemStack> {
        let mut slots = self.slots.lock();
        let cell = slots.get_mut(slot)?;
        std::mem::replace(cell, stack)
    }

    pub fn slot(
        &self,
        slot: usize,
    ) -> Option<ItemStack> {
        self.slots.lock().get(slot).cloned().flatten()
    }
}

static CHEST: Lazy<ClassDecl> = Lazy::new(|| {
    ClassDecl::new::<Chest>("Chest").tag(INVENTORY).method(
        MethodDecl::instance("isEmpty", |call| {
            Ok(call.receiver::<Chest>()?.slots.lock().iter().all(Option::is_none))
        }),
    )
});

impl Declared for Chest {
    fn declaration(&self) -> &'static ClassDecl {
        &CHEST
    }
}

impl Peripheral for Chest {
    fn get_type(&self) -> &str {
        "minecraft:chest"
    }
}

fn inventory(call: &Invocation) -> CallResult<&Chest> {
    call.context::<Chest>(0)
}

/// Script slot numbers are 1-based
fn slot_index(
    chest: &Chest,
    slot: i64,
) -> CallResult<usize> {
    if slot < 1 || slot as usize > chest.size() {
        return Err(MethodError::bad_argument(
            0,
            format!("Slot out of range (between 1 and {})", chest.size()),
        ));
    }
    Ok(slot as usize - 1)
}

/// The `size`, `list` and `getItemDetail` methods
pub fn generic_source() -> GenericSource {
    GenericSource::new("InventoryMethods", INVENTORY)
        .method(
            MethodDecl::static_fn("size", |call| Ok(inventory(call)?.size()))
                .param(ParamType::Receiver),
        )
        .method(
            MethodDecl::static_fn("list", |call| {
                let chest = inventory(call)?;
                let slots = chest.slots.lock();
                let items = slots.iter().enumerate().filter_map(|(i, stack)| {
                    stack
                        .as_ref()
                        .map(|stack| (TableKey::Int(i as i64 + 1), stack.to_value()))
                });
                Ok(Value::table(items))
            })
            .param(ParamType::Receiver),
        )
        .method(
            MethodDecl::static_fn("getItemDetail", |call| {
                let chest = inventory(call)?;
                let index = slot_index(chest, call.int(1)?)?;
                Ok(chest.slot(index).map(|stack| stack.to_value()))
            })
            .param(ParamType::Receiver)
            .param(ParamType::Int),
        )
}
