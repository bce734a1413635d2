//! sprpc Client
//!
//! A typed XML-RPC client over the sprpc HTTP/1.1 transport, plus bindings
//! for the process-supervisor API.
//!
//! - [`XmlRpcClient`] - `call`, `multicall` and `bind`
//! - [`Handler`] - the request/response seam, implemented by [`Connection`](sprpc_common::transport::Connection)
//! - [`BoundMethod`] / [`TypedMethodCall`] - reusable typed methods
//! - [`Supervisor`] - the `supervisor.*` namespace

pub mod batch;
pub mod bound;
pub mod client;
pub mod supervisor;

pub use batch::Batch;
pub use bound::{BoundMethod, TypedMethodCall};
pub use client::{ClientConfig, Handler, XmlRpcClient};
pub use supervisor::{
    ConfigInfo, LogTail, ProcessInfo, ProcessStatus, ReloadChanges, Signal, Supervisor,
    SupervisorState,
};
