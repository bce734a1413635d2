use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::NaiveDateTime;

use crate::protocol::error::{Result, SprpcError};
use crate::protocol::fault::Fault;

pub type MethodName = String;
pub type Members = BTreeMap<String, Value>;

/// Every XML-RPC wire type.
///
/// `Int32` holds an `i32`, so the signed 32-bit range is enforced by the type
/// itself; use [`Value::int`] to build one from a wider integer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    Boolean(bool),
    Str(String),
    Double(f64),
    /// Second precision, no timezone.
    DateTime(NaiveDateTime),
    Bytes(Bytes),
    Struct(Members),
    Array(Vec<Value>),
}

impl Value {
    /// Range-checked integer constructor.
    pub fn int(value: i64) -> Result<Self> {
        i32::try_from(value)
            .map(Value::Int32)
            .map_err(|_| SprpcError::Int32Overflow(value))
    }

    /// Explicit double constructor; whole numbers stay `Double`.
    pub fn double(value: f64) -> Self {
        Value::Double(value)
    }

    pub fn structure<K, I>(members: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Struct(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn array<I>(elements: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Value::Array(elements.into_iter().collect())
    }

    /// The wire tag name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int32(_) => "Int32",
            Value::Boolean(_) => "Boolean",
            Value::Str(_) => "String",
            Value::Double(_) => "Double",
            Value::DateTime(_) => "DateTime",
            Value::Bytes(_) => "Bytes",
            Value::Struct(_) => "Struct",
            Value::Array(_) => "Array",
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Value::Bytes(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl From<Members> for Value {
    fn from(value: Members) -> Self {
        Value::Struct(value)
    }
}

/// A method name plus positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method_name: MethodName,
    pub params: Vec<Value>,
}

impl MethodCall {
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(method_name: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method_name: method_name.into(),
            params,
        }
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Appends the argument only when present; an absent optional argument is
    /// left off the wire entirely.
    pub fn opt_arg<V: Into<Value>>(mut self, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.params.push(value.into());
        }
        self
    }

    /// The `{methodName, params}` struct that `system.multicall` expects.
    pub fn to_value(&self) -> Value {
        Value::structure([
            ("methodName", Value::Str(self.method_name.clone())),
            ("params", Value::Array(self.params.clone())),
        ])
    }
}

/// A decoded `<methodResponse>`: either a value or a fault, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    Success(Value),
    Fault(Fault),
}

impl MethodResponse {
    pub fn into_result(self) -> Result<Value> {
        match self {
            MethodResponse::Success(value) => Ok(value),
            MethodResponse::Fault(fault) => Err(SprpcError::Fault(fault)),
        }
    }
}
