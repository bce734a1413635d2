//! sprpc Transport Layer
//!
//! A client-side HTTP/1.1 exchange over an already established byte stream.
//!
//! # Components
//!
//! - **[`write_request`]**: serializes a [`Request`] onto the outbound side
//! - **[`ResponseDecoder`]** / **[`decode`]**: incremental response decoding
//!   with `content-length` and chunked bodies
//! - **[`Connection`]**: one TCP or unix-socket connection, one exchange at a time
//!
//! # Wire Format
//!
//! ```text
//! POST /RPC2 HTTP/1.1\r\n
//! Name: Value\r\n
//! \r\n
//! <body>
//! ```
//!
//! Responses must use `HTTP/1.1`, and their body must be framed by either
//! `content-length` or `transfer-encoding: chunked`.

mod buffer;
pub mod connection;
pub mod headers;
pub mod request;
pub mod response;

pub use connection::Connection;
pub use headers::Headers;
pub use request::{write_request, Request, RequestBody};
pub use response::{decode, Body, Inbound, Response, ResponseDecoder};

#[cfg(test)]
mod tests;
