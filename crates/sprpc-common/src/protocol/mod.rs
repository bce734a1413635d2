pub mod error;
pub mod fault;
pub mod format;
pub mod lift;
pub mod parse;
pub mod schema;
pub mod value;


pub use error::{Result, SprpcError};
pub use fault::Fault;
pub use format::format_method_call;
pub use parse::parse_method_response;
pub use schema::Schema;
pub use value::{Members, MethodCall, MethodName, MethodResponse, Value};
