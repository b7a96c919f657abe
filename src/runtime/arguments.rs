//! Argument lists passed to host methods
//!
//! `Arguments` is an immutable, cheaply cloned view over the values a script
//! passed to a call. Dropping a prefix shares the underlying storage instead
//! of copying it, so `peripheral.call(side, method, ...)` can forward its tail
//! to the target method for free.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::runtime::error::{CallResult, ErrorKind, MethodError};
use crate::runtime::value::{Table, Value};

static NIL: Value = Value::Nil;

static EMPTY: Lazy<Arguments> = Lazy::new(|| Arguments {
    values: Arc::from(Vec::new()),
    offset: 0,
});

/// Enumeration accepted by name from scripts
///
/// Scripts pass enum constants as strings; matching is case-insensitive and
/// yields the variant's ordinal.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct EnumDecl {
    /// Type name, used in diagnostics
    pub name: &'static str,
    /// Variant names, in ordinal order
    pub variants: &'static [&'static str],
}

impl EnumDecl {
    pub const fn new(
        name: &'static str,
        variants: &'static [&'static str],
    ) -> Self {
        Self { name, variants }
    }

    /// Resolve a variant name to its ordinal
    pub fn ordinal_of(
        &self,
        name: &str,
    ) -> Option<usize> {
        self.variants
            .iter()
            .position(|v| v.eq_ignore_ascii_case(name))
    }
}

/// Ordered view over call arguments
#[derive(Clone)]
pub struct Arguments {
    values: Arc<[Value]>,
    offset: usize,
}

impl fmt::Debug for Arguments {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl PartialEq for Arguments {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Default for Arguments {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<Value>> for Arguments {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl Arguments {
    /// Wrap a list of values
    pub fn new(values: Vec<Value>) -> Self {
        if values.is_empty() {
            return Self::empty();
        }
        Self {
            values: Arc::from(values),
            offset: 0,
        }
    }

    /// The canonical shared empty list
    pub fn empty() -> Self {
        EMPTY.clone()
    }

    /// Number of visible arguments
    pub fn count(&self) -> usize {
        self.values.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Visible arguments as a slice
    pub fn as_slice(&self) -> &[Value] {
        &self.values[self.offset..]
    }

    /// Copy out every visible argument
    pub fn get_all(&self) -> Vec<Value> {
        self.as_slice().to_vec()
    }

    /// Argument at `index`, or nil when out of range. Never fails.
    pub fn get(
        &self,
        index: usize,
    ) -> &Value {
        self.as_slice().get(index).unwrap_or(&NIL)
    }

    /// Skip the first `count` arguments.
    ///
    /// `drop(0)` returns this same view and any count at or beyond the end
    /// returns the canonical empty list.
    pub fn drop(
        &self,
        count: i64,
    ) -> CallResult<Arguments> {
        if count < 0 {
            return Err(ErrorKind::InvalidArgument("count cannot be negative".to_string()).into());
        }
        if count == 0 {
            return Ok(self.clone());
        }
        let count = count as usize;
        if count >= self.count() {
            return Ok(Self::empty());
        }
        Ok(Self {
            values: self.values.clone(),
            offset: self.offset + count,
        })
    }

    /// Whether two views share the same storage and window
    pub fn same_view(
        &self,
        other: &Arguments,
    ) -> bool {
        Arc::ptr_eq(&self.values, &other.values) && self.offset == other.offset
    }

    // ========================================================================
    // Strict accessors
    // ========================================================================

    /// String argument
    pub fn get_string(
        &self,
        index: usize,
    ) -> CallResult<Arc<str>> {
        match self.get(index) {
            Value::String(s) => Ok(s.clone()),
            other => Err(MethodError::argument_type(index, "string", other.type_name())),
        }
    }

    /// Number argument
    pub fn get_number(
        &self,
        index: usize,
    ) -> CallResult<f64> {
        let value = self.get(index);
        value
            .to_float()
            .ok_or_else(|| MethodError::argument_type(index, "number", value.type_name()))
    }

    /// Finite number argument
    pub fn get_finite_number(
        &self,
        index: usize,
    ) -> CallResult<f64> {
        let n = self.get_number(index)?;
        if !n.is_finite() {
            return Err(MethodError::bad_argument(index, "number expected, got non-finite"));
        }
        Ok(n)
    }

    /// Integral number argument
    pub fn get_int(
        &self,
        index: usize,
    ) -> CallResult<i64> {
        let value = self.get(index);
        if value.value_type() != crate::runtime::value::ValueType::Number {
            return Err(MethodError::argument_type(index, "number", value.type_name()));
        }
        value
            .to_int()
            .ok_or_else(|| MethodError::bad_argument(index, "number has no integer representation"))
    }

    /// Boolean argument
    pub fn get_bool(
        &self,
        index: usize,
    ) -> CallResult<bool> {
        let value = self.get(index);
        value
            .to_bool()
            .ok_or_else(|| MethodError::argument_type(index, "boolean", value.type_name()))
    }

    /// Table argument
    pub fn get_table(
        &self,
        index: usize,
    ) -> CallResult<Arc<Table>> {
        match self.get(index) {
            Value::Table(t) => Ok(t.clone()),
            other => Err(MethodError::argument_type(index, "table", other.type_name())),
        }
    }

    /// Enum argument, given by (case-insensitive) name. Returns the ordinal.
    pub fn get_enum(
        &self,
        index: usize,
        decl: &EnumDecl,
    ) -> CallResult<usize> {
        let name = self.get_string(index)?;
        decl.ordinal_of(&name)
            .ok_or_else(|| MethodError::bad_argument(index, format!("unknown option {}", name)))
    }

    // ========================================================================
    // Optional accessors: nil or missing is `None`, a wrong type still fails
    // ========================================================================

    pub fn opt_string(
        &self,
        index: usize,
    ) -> CallResult<Option<Arc<str>>> {
        self.optional(index, |args| args.get_string(index))
    }

    pub fn opt_number(
        &self,
        index: usize,
    ) -> CallResult<Option<f64>> {
        self.optional(index, |args| args.get_number(index))
    }

    pub fn opt_int(
        &self,
        index: usize,
    ) -> CallResult<Option<i64>> {
        self.optional(index, |args| args.get_int(index))
    }

    pub fn opt_bool(
        &self,
        index: usize,
    ) -> CallResult<Option<bool>> {
        self.optional(index, |args| args.get_bool(index))
    }

    pub fn opt_table(
        &self,
        index: usize,
    ) -> CallResult<Option<Arc<Table>>> {
        self.optional(index, |args| args.get_table(index))
    }

    pub fn opt_enum(
        &self,
        index: usize,
        decl: &EnumDecl,
    ) -> CallResult<Option<usize>> {
        self.optional(index, |args| args.get_enum(index, decl))
    }

    fn optional<T>(
        &self,
        index: usize,
        get: impl FnOnce(&Self) -> CallResult<T>,
    ) -> CallResult<Option<T>> {
        if self.get(index).is_nil() {
            return Ok(None);
        }
        get(self).map(Some)
    }
}
