//! Positional decoding of `system.multicall` results.

use sprpc_common::protocol::error::{Result, SprpcError};
use sprpc_common::protocol::schema;
use sprpc_common::protocol::{Fault, MethodCall, Schema, Value};

use crate::bound::TypedMethodCall;

/// A group of typed calls sent in one `system.multicall`.
///
/// Implemented for tuples of up to eight [`TypedMethodCall`]s with
/// independent result types, and for `Vec<TypedMethodCall<R>>`.
pub trait Batch {
    type Output;

    /// The calls in order.
    fn method_calls(&self) -> Vec<MethodCall>;

    /// Decodes `results`, already checked to match the call count.
    fn decode(&self, results: &[Value]) -> Result<Self::Output>;
}

/// Decodes one multicall slot, raising a fault struct as [`SprpcError::Fault`].
fn decode_slot<R: 'static>(results: &[Value], index: usize, schema: &Schema<R>) -> Result<R> {
    let value = results
        .get(index)
        .ok_or_else(|| SprpcError::InvalidResponse(format!("missing multicall result {}", index)))?;

    if let Some(fault) = slot_fault(value)? {
        return Err(SprpcError::Fault(fault));
    }

    schema.decode(value).map_err(|err| match err {
        SprpcError::Schema(message) => {
            SprpcError::Schema(format!("multicall result {}: {}", index, message))
        }
        other => other,
    })
}

fn slot_fault(value: &Value) -> Result<Option<Fault>> {
    let Value::Struct(members) = value else {
        return Ok(None);
    };
    if members.len() != 2 || !members.contains_key("faultCode") || !members.contains_key("faultString") {
        return Ok(None);
    }

    let fault = schema::record(|m| {
        Ok(Fault::new(
            i64::from(m.field("faultCode", &schema::i4())?),
            m.field("faultString", &schema::string())?,
        ))
    });
    fault.decode(value).map(Some)
}

impl<R: 'static> Batch for Vec<TypedMethodCall<R>> {
    type Output = Vec<R>;

    fn method_calls(&self) -> Vec<MethodCall> {
        self.iter().map(|c| c.call.clone()).collect()
    }

    fn decode(&self, results: &[Value]) -> Result<Self::Output> {
        self.iter()
            .enumerate()
            .map(|(i, c)| decode_slot(results, i, &c.schema))
            .collect()
    }
}

macro_rules! impl_batch_for_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: 'static),+> Batch for ($(TypedMethodCall<$name>,)+) {
            type Output = ($($name,)+);

            fn method_calls(&self) -> Vec<MethodCall> {
                vec![$(self.$idx.call.clone()),+]
            }

            fn decode(&self, results: &[Value]) -> Result<Self::Output> {
                Ok(($(decode_slot(results, $idx, &self.$idx.schema)?,)+))
            }
        }
    };
}

impl_batch_for_tuple!(A: 0);
impl_batch_for_tuple!(A: 0, B: 1);
impl_batch_for_tuple!(A: 0, B: 1, C: 2);
impl_batch_for_tuple!(A: 0, B: 1, C: 2, D: 3);
impl_batch_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_batch_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
impl_batch_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
impl_batch_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);

#[cfg(test)]
mod tests {
    use super::*;

    fn typed<R: 'static>(name: &str, schema: Schema<R>) -> TypedMethodCall<R> {
        TypedMethodCall {
            call: MethodCall::new(name),
            schema,
        }
    }

    #[test]
    fn test_tuple_decodes_positionally() {
        let batch = (
            typed("supervisor.getPID", schema::i4()),
            typed("supervisor.getAPIVersion", schema::string()),
        );
        assert_eq!(
            batch
                .method_calls()
                .iter()
                .map(|c| c.method_name.as_str())
                .collect::<Vec<_>>(),
            vec!["supervisor.getPID", "supervisor.getAPIVersion"]
        );

        let (pid, version) = batch
            .decode(&[Value::Int32(42), Value::from("3.0")])
            .unwrap();
        assert_eq!(pid, 42);
        assert_eq!(version, "3.0");
    }

    #[test]
    fn test_slot_fault_is_raised() {
        let batch = vec![typed("a", schema::i4()), typed("b", schema::i4())];
        let fault = Value::structure([
            ("faultCode", Value::Int32(10)),
            ("faultString", Value::from("BAD_NAME: nope")),
        ]);

        let err = batch.decode(&[Value::Int32(1), fault]).unwrap_err();
        assert_eq!(err.fault(), Some(&Fault::new(10, "BAD_NAME: nope")));
    }

    #[test]
    fn test_slot_schema_error_names_position() {
        let batch = (typed("a", schema::i4()), typed("b", schema::i4()));
        let err = batch
            .decode(&[Value::Int32(1), Value::from("x")])
            .unwrap_err();
        assert!(err.to_string().contains("multicall result 1"), "{}", err);
    }

    #[test]
    fn test_struct_result_with_other_members_is_not_a_fault() {
        let batch = vec![typed("a", schema::value())];
        let value = Value::structure([
            ("faultCode", Value::Int32(1)),
            ("faultString", Value::from("x")),
            ("extra", Value::Boolean(true)),
        ]);
        assert_eq!(batch.decode(std::slice::from_ref(&value)).unwrap(), vec![value]);
    }
}
