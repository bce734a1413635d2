//! Composable validating decoders from [`Value`] into application types.
//!
//! A [`Schema`] either returns the converted value or fails with
//! [`SprpcError::Schema`]; nothing is coerced between kinds.
//!
//! # Example
//!
//! ```
//! use sprpc_common::protocol::schema::{self, Schema};
//! use sprpc_common::protocol::Value;
//!
//! #[derive(Debug, PartialEq)]
//! struct State {
//!     code: i32,
//!     name: String,
//! }
//!
//! let state: Schema<State> = schema::record(|members| {
//!     Ok(State {
//!         code: members.field("statecode", &schema::one_of(schema::i4(), [0, 1, 2]))?,
//!         name: members.field("statename", &schema::string())?,
//!     })
//! });
//!
//! let value = Value::structure([
//!     ("statecode", Value::Int32(1)),
//!     ("statename", Value::from("RUNNING")),
//! ]);
//! assert_eq!(
//!     state.decode(&value).unwrap(),
//!     State { code: 1, name: "RUNNING".into() }
//! );
//! ```

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDateTime;

use crate::protocol::error::{Result, SprpcError};
use crate::protocol::value::{Members, Value};

type DecodeFn<R> = dyn Fn(&Value) -> Result<R> + Send + Sync;

/// A validating projection `Value -> R`.
pub struct Schema<R> {
    decode: Arc<DecodeFn<R>>,
}

impl<R> Clone for Schema<R> {
    fn clone(&self) -> Self {
        Self {
            decode: Arc::clone(&self.decode),
        }
    }
}

impl<R: 'static> Schema<R> {
    pub fn new<F>(decode: F) -> Self
    where
        F: Fn(&Value) -> Result<R> + Send + Sync + 'static,
    {
        Self {
            decode: Arc::new(decode),
        }
    }

    pub fn decode(&self, value: &Value) -> Result<R> {
        (self.decode)(value)
    }

    pub fn map<U, F>(self, f: F) -> Schema<U>
    where
        U: 'static,
        F: Fn(R) -> U + Send + Sync + 'static,
    {
        Schema::new(move |value| self.decode(value).map(&f))
    }

    pub fn try_map<U, F>(self, f: F) -> Schema<U>
    where
        U: 'static,
        F: Fn(R) -> Result<U> + Send + Sync + 'static,
    {
        Schema::new(move |value| self.decode(value).and_then(&f))
    }
}

fn mismatch(expected: &str, value: &Value) -> SprpcError {
    SprpcError::Schema(format!("expected {}, got {}", expected, value.kind()))
}

/// Accepts any value unchanged.
pub fn value() -> Schema<Value> {
    Schema::new(|value| Ok(value.clone()))
}

pub fn i4() -> Schema<i32> {
    Schema::new(|value| match value {
        Value::Int32(v) => Ok(*v),
        other => Err(mismatch("Int32", other)),
    })
}

pub fn boolean() -> Schema<bool> {
    Schema::new(|value| match value {
        Value::Boolean(v) => Ok(*v),
        other => Err(mismatch("Boolean", other)),
    })
}

/// A boolean that must be `true`; supervisor control calls report success this way.
pub fn boolean_true() -> Schema<bool> {
    Schema::new(|value| match value {
        Value::Boolean(true) => Ok(true),
        Value::Boolean(false) => Err(SprpcError::Schema("expected true, got false".into())),
        other => Err(mismatch("Boolean", other)),
    })
}

pub fn string() -> Schema<String> {
    Schema::new(|value| match value {
        Value::Str(v) => Ok(v.clone()),
        other => Err(mismatch("String", other)),
    })
}

pub fn double() -> Schema<f64> {
    Schema::new(|value| match value {
        Value::Double(v) => Ok(*v),
        other => Err(mismatch("Double", other)),
    })
}

pub fn date_time() -> Schema<NaiveDateTime> {
    Schema::new(|value| match value {
        Value::DateTime(v) => Ok(*v),
        other => Err(mismatch("DateTime", other)),
    })
}

pub fn bytes() -> Schema<Bytes> {
    Schema::new(|value| match value {
        Value::Bytes(v) => Ok(v.clone()),
        other => Err(mismatch("Bytes", other)),
    })
}

/// Restricts a decoded value to a fixed set.
pub fn one_of<T, I>(schema: Schema<T>, allowed: I) -> Schema<T>
where
    T: PartialEq + Debug + Send + Sync + 'static,
    I: IntoIterator<Item = T>,
{
    let allowed: Vec<T> = allowed.into_iter().collect();
    Schema::new(move |value| {
        let decoded = schema.decode(value)?;
        if allowed.contains(&decoded) {
            Ok(decoded)
        } else {
            Err(SprpcError::Schema(format!(
                "{:?} is not one of {:?}",
                decoded, allowed
            )))
        }
    })
}

/// Read access to a struct's members inside [`record`].
pub struct StructView<'a> {
    members: &'a Members,
}

impl<'a> StructView<'a> {
    /// Decodes a member that must be present.
    pub fn field<T: 'static>(&self, name: &str, schema: &Schema<T>) -> Result<T> {
        let member = self
            .members
            .get(name)
            .ok_or_else(|| SprpcError::Schema(format!("missing struct member \"{}\"", name)))?;
        schema
            .decode(member)
            .map_err(|err| nest(err, name))
    }

    /// Decodes a member that may be absent.
    pub fn optional_field<T: 'static>(&self, name: &str, schema: &Schema<T>) -> Result<Option<T>> {
        match self.members.get(name) {
            Some(member) => schema.decode(member).map(Some).map_err(|err| nest(err, name)),
            None => Ok(None),
        }
    }

    pub fn members(&self) -> &'a Members {
        self.members
    }
}

fn nest(err: SprpcError, path: &str) -> SprpcError {
    match err {
        SprpcError::Schema(message) => SprpcError::Schema(format!("{}: {}", path, message)),
        other => other,
    }
}

/// Decodes a struct into a typed record. Members not read by `build` are ignored.
pub fn record<R, F>(build: F) -> Schema<R>
where
    R: 'static,
    F: Fn(&StructView<'_>) -> Result<R> + Send + Sync + 'static,
{
    Schema::new(move |value| match value {
        Value::Struct(members) => build(&StructView { members }),
        other => Err(mismatch("Struct", other)),
    })
}

/// Decodes a struct whose declared fields all share one schema.
///
/// Every declared field must be present; extra members are ignored.
pub fn struct_of<R, K, I>(fields: I) -> Schema<BTreeMap<String, R>>
where
    R: 'static,
    K: Into<String>,
    I: IntoIterator<Item = (K, Schema<R>)>,
{
    let fields: Vec<(String, Schema<R>)> =
        fields.into_iter().map(|(k, s)| (k.into(), s)).collect();
    record(move |members| {
        fields
            .iter()
            .map(|(name, schema)| Ok((name.clone(), members.field(name, schema)?)))
            .collect()
    })
}

pub fn array<T: 'static>(element: Schema<T>) -> Schema<Vec<T>> {
    Schema::new(move |value| match value {
        Value::Array(elements) => elements
            .iter()
            .enumerate()
            .map(|(i, e)| element.decode(e).map_err(|err| nest(err, &format!("[{}]", i))))
            .collect(),
        other => Err(mismatch("Array", other)),
    })
}

fn elements_of_arity(value: &Value, arity: usize) -> Result<&[Value]> {
    match value {
        Value::Array(elements) if elements.len() == arity => Ok(elements),
        Value::Array(elements) => Err(SprpcError::Schema(format!(
            "expected a {}-tuple, got {} elements",
            arity,
            elements.len()
        ))),
        other => Err(mismatch("Array", other)),
    }
}

pub fn tuple1<A: 'static>(a: Schema<A>) -> Schema<(A,)> {
    Schema::new(move |value| {
        let e = elements_of_arity(value, 1)?;
        Ok((a.decode(&e[0])?,))
    })
}

pub fn tuple2<A: 'static, B: 'static>(a: Schema<A>, b: Schema<B>) -> Schema<(A, B)> {
    Schema::new(move |value| {
        let e = elements_of_arity(value, 2)?;
        Ok((a.decode(&e[0])?, b.decode(&e[1])?))
    })
}

pub fn tuple3<A: 'static, B: 'static, C: 'static>(
    a: Schema<A>,
    b: Schema<B>,
    c: Schema<C>,
) -> Schema<(A, B, C)> {
    Schema::new(move |value| {
        let e = elements_of_arity(value, 3)?;
        Ok((a.decode(&e[0])?, b.decode(&e[1])?, c.decode(&e[2])?))
    })
}

pub fn tuple4<A: 'static, B: 'static, C: 'static, D: 'static>(
    a: Schema<A>,
    b: Schema<B>,
    c: Schema<C>,
    d: Schema<D>,
) -> Schema<(A, B, C, D)> {
    Schema::new(move |value| {
        let e = elements_of_arity(value, 4)?;
        Ok((
            a.decode(&e[0])?,
            b.decode(&e[1])?,
            c.decode(&e[2])?,
            d.decode(&e[3])?,
        ))
    })
}
