use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use url::Url;

use crate::protocol::error::Result;
use crate::transport::headers::Headers;

/// Request payload.
pub enum RequestBody {
    Empty,
    Full(Bytes),
    /// Copied verbatim to the connection until the reader is exhausted.
    Stream(Pin<Box<dyn AsyncRead + Send>>),
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            RequestBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Full(bytes)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Full(Bytes::from(text))
    }
}

/// An HTTP/1.1 request to be written to an established connection.
#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub headers: Headers,
    pub body: RequestBody,
}

impl Request {
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self {
            method: method.into(),
            url,
            headers: Headers::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: Url) -> Self {
        Self::new("POST", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Path plus query, as it appears on the request line.
    pub fn target(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_owned(),
        }
    }

    fn sends_body(&self) -> bool {
        !(self.method.eq_ignore_ascii_case("GET") || self.method.eq_ignore_ascii_case("HEAD"))
    }
}

/// Writes the request line, headers and body to `out`.
///
/// The stream is flushed but never shut down; the caller owns its lifetime.
/// GET and HEAD requests never carry a body.
pub async fn write_request<W>(request: Request, out: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut head = format!(
        "{} {} HTTP/1.1\r\n",
        request.method.to_ascii_uppercase(),
        request.target()
    );
    for (name, value) in request.headers.iter() {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");

    tracing::debug!(method = %request.method, target = %request.target(), "writing request");
    out.write_all(head.as_bytes()).await?;

    if request.sends_body() {
        match request.body {
            RequestBody::Empty => {}
            RequestBody::Full(bytes) => out.write_all(&bytes).await?,
            RequestBody::Stream(mut reader) => {
                tokio::io::copy(&mut reader, out).await?;
            }
        }
    }

    out.flush().await?;
    Ok(())
}
