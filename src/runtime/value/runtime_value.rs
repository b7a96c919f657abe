//! Dynamic value type crossing the script/host boundary
//!
//! `Value` is what a script hands to a host method and what a host method hands
//! back. It mirrors the script engine's own value model:
//! - numbers keep an integer/float distinction so integral arguments survive
//!   round trips without precision loss
//! - strings are shared `Arc<str>`
//! - tables are insertion-ordered maps keyed by `TableKey`

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Table storage. Lists use 1-based integer keys.
pub type Table = IndexMap<TableKey, Value>;

/// Value type tag, used for argument errors and type queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Nil,
    Boolean,
    Number,
    String,
    Table,
}

impl ValueType {
    /// Script-facing type name
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Nil => "nil",
            ValueType::Boolean => "boolean",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Table => "table",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hashable table key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableKey {
    Bool(bool),
    Int(i64),
    String(Arc<str>),
}

impl TableKey {
    /// Convert a value into a key. Nil, tables and floats with no integer
    /// representation are not keys.
    pub fn from_value(value: &Value) -> Option<TableKey> {
        match value {
            Value::Bool(b) => Some(TableKey::Bool(*b)),
            Value::Int(i) => Some(TableKey::Int(*i)),
            Value::Float(f) => float_to_int(*f).map(TableKey::Int),
            Value::String(s) => Some(TableKey::String(s.clone())),
            _ => None,
        }
    }
}

/// The integer an integral float stands for, if it fits in an i64
fn float_to_int(f: f64) -> Option<i64> {
    // 2^63, the first float above i64::MAX
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f)).then(|| f as i64)
}

impl From<&str> for TableKey {
    fn from(s: &str) -> Self {
        TableKey::String(Arc::from(s))
    }
}

impl From<i64> for TableKey {
    fn from(i: i64) -> Self {
        TableKey::Int(i)
    }
}

impl fmt::Display for TableKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            TableKey::Bool(b) => write!(f, "{}", b),
            TableKey::Int(i) => write!(f, "{}", i),
            TableKey::String(s) => f.write_str(s),
        }
    }
}

/// Script value
///
/// # Design Principles
/// - `enum` for direct pattern matching in host method bodies
/// - cheap to clone: strings and tables are behind `Arc`
/// - `Nil` doubles as the "absent" sentinel returned by out-of-range reads
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Absent / nil
    #[default]
    Nil,

    /// Boolean
    Bool(bool),

    /// Integral number
    Int(i64),

    /// Floating point number
    Float(f64),

    /// Shared string
    String(Arc<str>),

    /// Shared table
    Table(Arc<Table>),
}

// ============================================================================
// Constructors
// ============================================================================

impl Value {
    /// Build a string value
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::String(s.into())
    }

    /// Build a table from key/value pairs
    pub fn table<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<TableKey>,
    {
        Value::Table(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Build a list-shaped table (keys 1..=n)
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Value::Table(Arc::new(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (TableKey::Int(i as i64 + 1), v))
                .collect(),
        ))
    }
}

// ============================================================================
// Type Query Methods
// ============================================================================

impl Value {
    /// Get the type tag of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Nil => ValueType::Nil,
            Value::Bool(_) => ValueType::Boolean,
            Value::Int(_) | Value::Float(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::Table(_) => ValueType::Table,
        }
    }

    /// Script-facing type name
    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    /// Check for nil
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Convert to bool
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert to i64. Floats only convert when integral and within range.
    pub fn to_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => float_to_int(*f),
            _ => None,
        }
    }

    /// Convert to f64
    pub fn to_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Borrow as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as table
    pub fn as_table(&self) -> Option<&Arc<Table>> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Look up a field of a table value
    pub fn field(
        &self,
        key: impl Into<TableKey>,
    ) -> Option<&Value> {
        self.as_table().and_then(|t| t.get(&key.into()))
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Nil)
    }
}

// ============================================================================
// Display Implementation
// ============================================================================

impl fmt::Display for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Table(t) => {
                write!(
                    f,
                    "{{{}}}",
                    t.iter()
                        .map(|(k, v)| format!("{} = {}", k, v))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
        }
    }
}

// ============================================================================
// Serialization (CLI output)
// ============================================================================

impl Serialize for Value {
    fn serialize<S>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Nil => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Table(t) => {
                let mut map = serializer.serialize_map(Some(t.len()))?;
                for (k, v) in t.iter() {
                    map.serialize_entry(&k.to_string(), v)?;
                }
                map.end()
            }
        }
    }
}
