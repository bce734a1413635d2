//! sprpc Common Types and Transport
//!
//! The protocol and transport layers shared by the sprpc client and CLI.
//!
//! # Overview
//!
//! sprpc drives XML-RPC calls (for example against a process-supervisor
//! daemon) over a raw TCP or unix-socket connection:
//!
//! - **Protocol Layer**: the XML-RPC value model, request formatting, response
//!   parsing, and validating schemas that project values into Rust types
//! - **Transport Layer**: an HTTP/1.1 request writer and an incremental
//!   response decoder that tolerates arbitrary read fragmentation
//!
//! # Components
//!
//! - [`protocol`] - Values, faults, formatter, parser, schemas, errors
//! - [`transport`] - Request writer, response decoder, connections
//!
//! # Example
//!
//! ```
//! use sprpc_common::protocol::{format_method_call, parse_method_response, MethodCall, Value};
//!
//! let call = MethodCall::new("supervisor.getProcessInfo").arg("web");
//! let body = format_method_call(&call);
//! assert!(body.contains("<methodName>supervisor.getProcessInfo</methodName>"));
//!
//! let response = parse_method_response(
//!     "<methodResponse><params><param><value><i4>42</i4></value></param></params></methodResponse>",
//! )
//! .unwrap();
//! assert_eq!(response.into_result().unwrap(), Value::Int32(42));
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
