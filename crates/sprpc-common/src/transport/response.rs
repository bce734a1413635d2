//! Incremental HTTP/1.1 response decoding.
//!
//! # State machine
//!
//! ```text
//! StatusLine -> Headers -> Body
//!                           |- content-length: read exactly N bytes
//!                           '- chunked: (ChunkSizeLine -> ChunkData)* -> ZeroChunk -> Trailers
//! ```
//!
//! The status line and headers are decoded eagerly. A `content-length` body
//! is read before [`ResponseDecoder::decode`] returns; a chunked body is
//! decoded lazily, one chunk per [`Body::chunk`] call.
//!
//! # Read ownership
//!
//! The decoder owns the transport's read side for the whole response. It is
//! released exactly once: after a known-length body is read, or after the
//! terminating zero-size chunk and its (empty) trailer block. A body dropped
//! before that point, or one whose decoding failed, never releases it.

use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, Stream};
use tokio::io::AsyncRead;

use crate::protocol::error::{Result, SprpcError};
use crate::transport::buffer::FragmentBuffer;
use crate::transport::headers::Headers;

/// The transport read side, type-erased.
pub type Inbound = Box<dyn AsyncRead + Unpin + Send>;

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Maximum number of hex digits accepted in a chunk-size line.
const MAX_CHUNK_SIZE_DIGITS: usize = 8;

/// Decodes one response from `reader`.
pub async fn decode<R>(reader: R) -> Result<Response>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    ResponseDecoder::new(reader).decode().await
}

/// A decoded response head plus its lazily read body.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    body: Body,
}

impl Response {
    pub fn into_body(self) -> Body {
        self.body
    }

    pub async fn bytes(self) -> Result<Bytes> {
        self.body.bytes().await
    }

    pub async fn text(self) -> Result<String> {
        self.body.text().await
    }
}

/// Read ownership of the transport plus the hook to run when it is handed back.
struct Source {
    buffer: FragmentBuffer<Inbound>,
    on_release: Option<ReleaseFn>,
}

impl Source {
    fn release(mut self) {
        if let Some(on_release) = self.on_release.take() {
            on_release();
        }
    }
}

pub struct ResponseDecoder {
    source: Source,
}

impl ResponseDecoder {
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let inbound: Inbound = Box::new(reader);
        Self {
            source: Source {
                buffer: FragmentBuffer::new(inbound),
                on_release: None,
            },
        }
    }

    /// Runs `on_release` when read ownership is handed back.
    pub fn on_release<F>(mut self, on_release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.source.on_release = Some(Box::new(on_release));
        self
    }

    pub async fn decode(mut self) -> Result<Response> {
        let buffer = &mut self.source.buffer;

        let line = buffer.read_line().await?;
        let (status, status_text) = parse_status_line(&String::from_utf8_lossy(&line))?;
        let headers = read_headers(buffer).await?;

        tracing::debug!(status, headers = headers.len(), "decoded response head");

        let body = if is_chunked(&headers) {
            Body {
                state: BodyState::Chunked(self.source),
            }
        } else if let Some(length) = headers.get("content-length") {
            let length = parse_content_length(length)?;
            let bytes = buffer.read_exact(length).await?;
            self.source.release();
            Body {
                state: BodyState::Full(Some(bytes)),
            }
        } else {
            return Err(SprpcError::UnknownBodyEncoding);
        };

        Ok(Response {
            status,
            status_text,
            headers,
            body,
        })
    }
}

fn is_chunked(headers: &Headers) -> bool {
    headers
        .get("transfer-encoding")
        .is_some_and(|value| value.eq_ignore_ascii_case("chunked"))
}

fn parse_content_length(value: &str) -> Result<usize> {
    value
        .parse::<usize>()
        .map_err(|_| SprpcError::InvalidContentLength(value.to_owned()))
}

/// Matches `HTTP/1.1 <100..599> <reason>`.
pub fn parse_status_line(line: &str) -> Result<(u16, String)> {
    let invalid = || SprpcError::StatusLine(line.to_owned());

    let rest = line.strip_prefix("HTTP/1.1 ").ok_or_else(invalid)?;
    let code = rest.get(..3).ok_or_else(invalid)?;
    let reason = rest.get(3..).and_then(|r| r.strip_prefix(' ')).ok_or_else(invalid)?;

    let digits_ok = code.bytes().all(|b| b.is_ascii_digit()) && (b'1'..=b'5').contains(&code.as_bytes()[0]);
    if !digits_ok || reason.is_empty() {
        return Err(invalid());
    }

    let status = code.parse::<u16>().map_err(|_| invalid())?;
    Ok((status, reason.to_owned()))
}

/// Splits `name: value` at the first colon and trims the value.
pub fn parse_header_line(line: &str) -> Result<(String, String)> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| SprpcError::HeaderLine(line.to_owned()))?;
    Ok((name.to_owned(), value.trim().to_owned()))
}

async fn read_headers(buffer: &mut FragmentBuffer<Inbound>) -> Result<Headers> {
    let mut headers = Headers::new();
    loop {
        let line = buffer.read_line().await?;
        if line.is_empty() {
            return Ok(headers);
        }
        let (name, value) = parse_header_line(&String::from_utf8_lossy(&line))?;
        headers.append(name, value);
    }
}

/// Parses a chunk-size line, ignoring any chunk extensions.
pub fn parse_chunk_size(line: &str) -> Result<usize> {
    let hex = match line.find(';') {
        Some(i) => &line[..i],
        None => line,
    };
    let hex = hex.trim_matches(|c| c == ' ' || c == '\t');

    let valid = !hex.is_empty()
        && hex.len() <= MAX_CHUNK_SIZE_DIGITS
        && hex.bytes().all(|b| b.is_ascii_hexdigit());
    if !valid {
        return Err(SprpcError::InvalidChunkSize(line.to_owned()));
    }

    u32::from_str_radix(hex, 16)
        .map(|size| size as usize)
        .map_err(|_| SprpcError::InvalidChunkSize(line.to_owned()))
}

enum BodyState {
    Full(Option<Bytes>),
    Chunked(Source),
    Done,
    Failed,
}

/// A response body, pulled one unit at a time.
pub struct Body {
    state: BodyState,
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            BodyState::Full(_) => "Full",
            BodyState::Chunked(_) => "Chunked",
            BodyState::Done => "Done",
            BodyState::Failed => "Failed",
        };
        f.debug_struct("Body").field("state", &state).finish()
    }
}

impl Body {
    /// Whether the body has been fully read and read ownership released.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, BodyState::Done)
    }

    /// Pulls the next piece of the body, or `None` once it is exhausted.
    ///
    /// For a chunked body each call decodes exactly one chunk; the call that
    /// reaches the zero-size chunk also reads the trailer block.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        match std::mem::replace(&mut self.state, BodyState::Failed) {
            BodyState::Full(bytes) => {
                self.state = BodyState::Done;
                Ok(bytes.filter(|b| !b.is_empty()))
            }
            BodyState::Chunked(mut source) => match next_chunk(&mut source.buffer).await {
                Ok(Some(bytes)) => {
                    self.state = BodyState::Chunked(source);
                    Ok(Some(bytes))
                }
                Ok(None) => {
                    self.state = BodyState::Done;
                    source.release();
                    Ok(None)
                }
                Err(SprpcError::TrailersNotSupported) => {
                    // The trailer block was fully consumed, so the stream is still in sync.
                    source.release();
                    Err(SprpcError::TrailersNotSupported)
                }
                Err(err) => Err(err),
            },
            BodyState::Done => {
                self.state = BodyState::Done;
                Ok(None)
            }
            BodyState::Failed => Err(SprpcError::InvalidResponse(
                "body decoding already failed".into(),
            )),
        }
    }

    /// Reads the remaining body into one buffer.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let first = match self.chunk().await? {
            Some(first) => first,
            None => return Ok(Bytes::new()),
        };
        let Some(second) = self.chunk().await? else {
            return Ok(first);
        };

        let mut joined = BytesMut::from(&first[..]);
        joined.extend_from_slice(&second);
        while let Some(chunk) = self.chunk().await? {
            joined.extend_from_slice(&chunk);
        }
        Ok(joined.freeze())
    }

    pub async fn text(self) -> Result<String> {
        Ok(String::from_utf8(self.bytes().await?.to_vec())?)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes>> + Send {
        stream::unfold(Some(self), |body| async move {
            let mut body = body?;
            match body.chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(body))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

async fn next_chunk(buffer: &mut FragmentBuffer<Inbound>) -> Result<Option<Bytes>> {
    let line = buffer.read_line().await?;
    let size = parse_chunk_size(&String::from_utf8_lossy(&line))?;

    if size == 0 {
        let trailers = read_headers(buffer).await?;
        if !trailers.is_empty() {
            return Err(SprpcError::TrailersNotSupported);
        }
        return Ok(None);
    }

    let data = buffer.read_exact(size).await?;
    if !buffer.consume_crlf().await? {
        return Err(SprpcError::InvalidChunkedEncoding);
    }

    tracing::debug!(size, "decoded chunk");
    Ok(Some(data))
}
