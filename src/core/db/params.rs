/// Parameter Module
///
/// Values exchanged with the driver, the parameter types a placeholder can be
/// bound as, and the by-value/by-reference binding forms.

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A value bound to a placeholder or read back from a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
}

impl Value {
    /// Parses a command-line literal: integers, `true`/`false`, `null`, or text.
    pub fn parse_literal(literal: &str) -> Self {
        if let Ok(i) = literal.parse::<i64>() {
            return Value::Integer(i);
        }
        match literal {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            "null" => Value::Null,
            _ => Value::Text(literal.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view of the value, using the same leniency as a scalar cast:
    /// numeric text is parsed, reals are truncated, anything else is 0.
    pub fn to_integer(&self) -> i64 {
        match self {
            Value::Null => 0,
            Value::Integer(i) => *i,
            Value::Real(f) => *f as i64,
            Value::Boolean(b) => *b as i64,
            Value::Text(s) => parse_numeric(s).unwrap_or(0),
            Value::Blob(b) => parse_numeric(&String::from_utf8_lossy(b)).unwrap_or(0),
        }
    }

    pub(crate) fn from_sql(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }

    pub(crate) fn into_sql(self) -> SqlValue {
        match self {
            Value::Null => SqlValue::Null,
            Value::Integer(i) => SqlValue::Integer(i),
            Value::Real(f) => SqlValue::Real(f),
            Value::Text(s) => SqlValue::Text(s),
            Value::Blob(b) => SqlValue::Blob(b),
            Value::Boolean(b) => SqlValue::Integer(b as i64),
        }
    }
}

fn parse_numeric(text: &str) -> Option<i64> {
    let text = text.trim();
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().map(|f| f as i64))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{}", s),
            Value::Blob(b) => write!(f, "<BLOB: {} bytes>", b.len()),
            Value::Boolean(b) => write!(f, "{}", if *b { 1 } else { 0 }),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// The type a placeholder is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Null,
    Int,
    Str,
    Bool,
}

impl ParamType {
    /// Infers the parameter type from the kind of value being bound.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Integer(_) => ParamType::Int,
            Value::Boolean(_) => ParamType::Bool,
            Value::Null => ParamType::Null,
            Value::Real(_) | Value::Text(_) | Value::Blob(_) => ParamType::Str,
        }
    }

    /// Uses the explicit type when one is given, otherwise infers it.
    pub fn resolve(value: &Value, explicit: Option<ParamType>) -> Self {
        explicit.unwrap_or_else(|| ParamType::infer(value))
    }

    /// Numeric type code used by the native client API.
    pub fn code(self) -> u8 {
        match self {
            ParamType::Null => 0,
            ParamType::Int => 1,
            ParamType::Str => 2,
            ParamType::Bool => 5,
        }
    }

    /// Converts `value` to what the driver receives for this type.
    /// `Null` values stay NULL whatever the type.
    pub fn coerce(self, value: &Value) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        match self {
            ParamType::Null => Value::Null,
            ParamType::Int => Value::Integer(value.to_integer()),
            ParamType::Bool => Value::Boolean(match value {
                Value::Boolean(b) => *b,
                Value::Integer(i) => *i != 0,
                Value::Real(f) => *f != 0.0,
                Value::Text(s) => !(s.is_empty() || s == "0"),
                Value::Blob(b) => !b.is_empty(),
                Value::Null => false,
            }),
            ParamType::Str => match value {
                Value::Text(_) | Value::Blob(_) => value.clone(),
                Value::Boolean(false) => Value::Text(String::new()),
                other => Value::Text(other.to_string()),
            },
        }
    }
}

/// A value shared between the caller and a by-reference binding.
///
/// Cloning the handle shares the same slot; the statement reads the slot
/// when it executes, not when it is bound.
#[derive(Debug, Clone, Default)]
pub struct SharedValue(Rc<RefCell<Value>>);

impl SharedValue {
    pub fn new(value: impl Into<Value>) -> Self {
        SharedValue(Rc::new(RefCell::new(value.into())))
    }

    pub fn set(&self, value: impl Into<Value>) {
        *self.0.borrow_mut() = value.into();
    }

    pub fn get(&self) -> Value {
        self.0.borrow().clone()
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

/// Where a binding takes its value from.
#[derive(Debug, Clone)]
pub enum BindSource {
    /// Captured at bind time
    ByValue(Value),
    /// Read when the statement executes
    ByRef(SharedValue),
}

/// A placeholder binding held by a prepared statement.
#[derive(Debug, Clone)]
pub struct Binding {
    /// 1-based placeholder index in the compiled statement
    pub index: usize,
    /// Placeholder name as written in the SQL (`:id`), or the position for `?`
    pub name: String,
    pub param_type: ParamType,
    pub source: BindSource,
}

impl Binding {
    /// The value sent to the driver, coerced to the bound type.
    pub fn resolve(&self) -> Value {
        match &self.source {
            BindSource::ByValue(value) => self.param_type.coerce(value),
            BindSource::ByRef(shared) => self.param_type.coerce(&shared.get()),
        }
    }

    pub fn is_by_ref(&self) -> bool {
        matches!(self.source, BindSource::ByRef(_))
    }
}
