//! Conversions between [`Value`] and `serde_json::Value`.
//!
//! JSON has one number type, so [`from_json`] has to guess: integral numbers
//! become `Int32` (range-checked) and everything else becomes `Double`. Callers
//! that care about the numeric kind should build [`Value`]s explicitly instead.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Number};

use crate::protocol::error::{Result, SprpcError};
use crate::protocol::format::DATE_TIME_FORMAT;
use crate::protocol::value::{Members, MethodCall, Value};

/// Lifts a JSON value into the XML-RPC value model.
///
/// `null` has no XML-RPC counterpart and is rejected.
pub fn from_json(json: &serde_json::Value) -> Result<Value> {
    match json {
        serde_json::Value::Null => Err(SprpcError::NotAllowed("null")),
        serde_json::Value::Bool(b) => Ok(Value::Boolean(*b)),
        serde_json::Value::Number(n) => number_from_json(n),
        serde_json::Value::String(s) => Ok(Value::Str(s.clone())),
        serde_json::Value::Array(elements) => elements
            .iter()
            .map(from_json)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        serde_json::Value::Object(object) => object
            .iter()
            .map(|(k, v)| Ok((k.clone(), from_json(v)?)))
            .collect::<Result<Members>>()
            .map(Value::Struct),
    }
}

fn number_from_json(n: &Number) -> Result<Value> {
    if let Some(i) = n.as_i64() {
        return Value::int(i);
    }
    if n.as_u64().is_some() {
        // Larger than i64::MAX, certainly larger than i32::MAX.
        return Err(SprpcError::Int32Overflow(i64::MAX));
    }
    n.as_f64()
        .map(Value::double)
        .ok_or(SprpcError::NotAllowed("non-finite number"))
}

/// Builds a method call from JSON arguments, skipping `null`s the way an
/// omitted optional argument is skipped.
pub fn method_call_from_json(
    method_name: impl Into<String>,
    args: &[serde_json::Value],
) -> Result<MethodCall> {
    let params = args
        .iter()
        .filter(|arg| !arg.is_null())
        .map(from_json)
        .collect::<Result<Vec<_>>>()?;
    Ok(MethodCall::with_params(method_name, params))
}

/// Projects a value into JSON for display.
///
/// Date-times use the compact wire layout and bytes are base64 encoded.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Int32(v) => serde_json::Value::from(*v),
        Value::Boolean(v) => serde_json::Value::Bool(*v),
        Value::Str(v) => serde_json::Value::String(v.clone()),
        Value::Double(v) => Number::from_f64(*v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::DateTime(v) => serde_json::Value::String(v.format(DATE_TIME_FORMAT).to_string()),
        Value::Bytes(v) => serde_json::Value::String(STANDARD.encode(v)),
        Value::Struct(members) => serde_json::Value::Object(
            members
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect::<Map<_, _>>(),
        ),
        Value::Array(elements) => serde_json::Value::Array(elements.iter().map(to_json).collect()),
    }
}
