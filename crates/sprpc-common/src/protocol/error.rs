use thiserror::Error;

use crate::protocol::fault::Fault;

#[derive(Error, Debug)]
pub enum SprpcError {
    #[error("invalid HTTP/1.1 status line: \"{0}\"")]
    StatusLine(String),

    #[error("invalid header line: \"{0}\"")]
    HeaderLine(String),

    #[error("unknown body encoding")]
    UnknownBodyEncoding,

    #[error("invalid content-length: \"{0}\"")]
    InvalidContentLength(String),

    #[error("invalid chunk size: \"{0}\"")]
    InvalidChunkSize(String),

    #[error("invalid chunked encoding")]
    InvalidChunkedEncoding,

    #[error("trailers not supported")]
    TrailersNotSupported,

    #[error("no more data")]
    NoMoreData,

    #[error("internal decoder error: {0}")]
    Internal(&'static str),

    #[error("http request failed: {status} {status_text}")]
    HttpStatus { status: u16, status_text: String },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("invalid datetime: \"{0}\"")]
    InvalidDateTime(String),

    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("schema mismatch: {0}")]
    Schema(String),

    #[error("overflow: {0} does not fit in a signed 32-bit integer")]
    Int32Overflow(i64),

    #[error("type not allowed: {0}")]
    NotAllowed(&'static str),

    #[error("{0}")]
    Fault(Fault),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("connection poisoned by an unfinished response")]
    ConnectionPoisoned,

    #[error("Request timeout after {0}ms")]
    Timeout(u64),
}

impl SprpcError {
    /// The fault carried by this error, if the server answered with one.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            SprpcError::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    /// Whether the stream position can no longer be trusted after this error.
    ///
    /// Frame and chunk errors leave unread bytes of an unknown shape on the wire,
    /// and a timed out or lost exchange may have stopped anywhere.
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(
            self,
            SprpcError::StatusLine(_)
                | SprpcError::HeaderLine(_)
                | SprpcError::UnknownBodyEncoding
                | SprpcError::InvalidContentLength(_)
                | SprpcError::InvalidChunkSize(_)
                | SprpcError::InvalidChunkedEncoding
                | SprpcError::TrailersNotSupported
                | SprpcError::NoMoreData
                | SprpcError::Internal(_)
                | SprpcError::Io(_)
                | SprpcError::ConnectionPoisoned
                | SprpcError::Connection(_)
                | SprpcError::Timeout(_)
        )
    }
}

impl From<url::ParseError> for SprpcError {
    fn from(err: url::ParseError) -> Self {
        SprpcError::InvalidRequest(err.to_string())
    }
}

impl From<chrono::ParseError> for SprpcError {
    fn from(err: chrono::ParseError) -> Self {
        SprpcError::InvalidDateTime(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SprpcError>;
