//! XML-RPC request serialization.
//!
//! Method names, struct member names and string contents are XML-escaped.

use std::fmt::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use quick_xml::escape::escape;

use crate::protocol::value::{MethodCall, Value};

/// Compact ISO 8601 layout used on the wire, e.g. `19980717T14:08:55`.
pub const DATE_TIME_FORMAT: &str = "%Y%m%dT%H:%M:%S";

/// Serializes a method call into a `<methodCall>` document.
pub fn format_method_call(call: &MethodCall) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n");

    out.push_str("<methodCall>");
    let _ = write!(out, "<methodName>{}</methodName>", escape(call.method_name.as_str()));

    out.push_str("<params>");
    for param in &call.params {
        out.push_str("<param><value>");
        format_value(&mut out, param);
        out.push_str("</value></param>");
    }
    out.push_str("</params>");

    out.push_str("</methodCall>");
    out
}

/// Appends the typed inner element of a `<value>` (without the `<value>` tags).
pub fn format_value(out: &mut String, value: &Value) {
    // Writing into a String cannot fail.
    let _ = match value {
        Value::Int32(v) => write!(out, "<i4>{}</i4>", v),
        Value::Boolean(v) => write!(out, "<boolean>{}</boolean>", u8::from(*v)),
        Value::Str(v) => write!(out, "<string>{}</string>", escape(v.as_str())),
        Value::Double(v) => write!(out, "<double>{}</double>", v),
        Value::DateTime(v) => write!(
            out,
            "<dateTime.iso8601>{}</dateTime.iso8601>",
            v.format(DATE_TIME_FORMAT)
        ),
        Value::Bytes(v) => write!(out, "<base64>{}</base64>", STANDARD.encode(v)),
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                let _ = write!(out, "<member><name>{}</name><value>", escape(name.as_str()));
                format_value(out, member);
                out.push_str("</value></member>");
            }
            out.push_str("</struct>");
            Ok(())
        }
        Value::Array(elements) => {
            out.push_str("<array><data>");
            for element in elements {
                out.push_str("<value>");
                format_value(out, element);
                out.push_str("</value>");
            }
            out.push_str("</data></array>");
            Ok(())
        }
    };
}
