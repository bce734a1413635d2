use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::protocol::error::{Result, SprpcError};
use crate::transport::request::{write_request, Request};
use crate::transport::response::{Response, ResponseDecoder};

/// Default timeout for writing a request and decoding the response head (30 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One established connection carrying one exchange at a time.
///
/// [`fetch`](Self::fetch) writes a request and hands exclusive read ownership
/// of the stream to the response decoder. The next exchange waits until that
/// ownership is returned, which happens when the response body is dropped.
///
/// A response that is dropped before its body was fully read, or whose
/// decoding failed, leaves the stream at an unknown position; every later
/// fetch then fails with [`SprpcError::ConnectionPoisoned`] and the connection
/// must be torn down.
///
/// # Example
///
/// ```no_run
/// use sprpc_common::transport::{Connection, Request};
/// use url::Url;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let connection = Connection::connect_tcp("127.0.0.1:9001").await?;
///
/// let url = Url::parse("http://127.0.0.1:9001/")?;
/// let response = connection.fetch(Request::get(url).with_header("Host", "127.0.0.1")).await?;
/// let status = response.status;
/// println!("{} {}", status, response.text().await?);
/// # Ok(())
/// # }
/// ```
pub struct Connection<S> {
    stream: Arc<Mutex<S>>,
    clean: Arc<AtomicBool>,
    timeout: Duration,
}

impl<S> Clone for Connection<S> {
    fn clone(&self) -> Self {
        Self {
            stream: Arc::clone(&self.stream),
            clean: Arc::clone(&self.clean),
            timeout: self.timeout,
        }
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: Arc::new(Mutex::new(stream)),
            clean: Arc::new(AtomicBool::new(true)),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_poisoned(&self) -> bool {
        !self.clean.load(Ordering::SeqCst)
    }

    /// Writes `request` and decodes the response head.
    ///
    /// The timeout covers writing the request and decoding the head (plus a
    /// `content-length` body); a chunked body is read on the caller's schedule.
    pub async fn fetch(&self, request: Request) -> Result<Response> {
        let mut guard = Arc::clone(&self.stream).lock_owned().await;

        // Marked dirty until the decoder hands read ownership back.
        if !self.clean.swap(false, Ordering::SeqCst) {
            tracing::warn!("refusing to reuse a connection left mid-response");
            return Err(SprpcError::ConnectionPoisoned);
        }

        let clean = Arc::clone(&self.clean);
        let exchange = async move {
            write_request(request, &mut *guard)
                .await
                .map_err(|err| map_io_error(err, "writing request"))?;
            ResponseDecoder::new(Leased(guard))
                .on_release(move || clean.store(true, Ordering::SeqCst))
                .decode()
                .await
                .map_err(|err| map_io_error(err, "reading response"))
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(SprpcError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

impl Connection<TcpStream> {
    /// Connects to a TCP endpoint, trying each resolved address in turn.
    pub async fn connect_tcp(addr: &str) -> Result<Self> {
        let socket_addrs = tokio::net::lookup_host(addr)
            .await
            .map_err(|e| SprpcError::Connection(format!("Invalid address '{}': {}", addr, e)))?;

        let mut last_err = None;
        for socket_addr in socket_addrs {
            match tokio::time::timeout(DEFAULT_TIMEOUT, TcpStream::connect(socket_addr)).await {
                Ok(Ok(stream)) => {
                    stream.set_nodelay(true)?;
                    tracing::debug!(%socket_addr, "connected");
                    return Ok(Self::new(stream));
                }
                Ok(Err(e)) => last_err = Some(e.to_string()),
                Err(_) => last_err = Some("connect timed out".to_string()),
            }
        }

        Err(SprpcError::Connection(format!(
            "Failed to connect to {}: {}",
            addr,
            last_err.unwrap_or_else(|| "no addresses resolved".to_string())
        )))
    }
}

#[cfg(unix)]
impl Connection<tokio::net::UnixStream> {
    /// Connects to a local unix socket, e.g. a supervisor's `supervisord.sock`.
    pub async fn connect_unix(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream = tokio::net::UnixStream::connect(path).await.map_err(|e| {
            SprpcError::Connection(format!("Failed to connect to {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "connected");
        Ok(Self::new(stream))
    }
}

/// Exclusive read access to the stream for the duration of one response.
struct Leased<S>(OwnedMutexGuard<S>);

impl<S: AsyncRead + Unpin> AsyncRead for Leased<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut *this.0).poll_read(cx, buf)
    }
}

/// Map IO errors to appropriate SprpcError variants
///
/// - Connection resets -> `Connection`
/// - Everything else passes through unchanged
fn map_io_error(err: SprpcError, context: &str) -> SprpcError {
    match err {
        SprpcError::Io(io_err) => match io_err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => {
                SprpcError::Connection(format!("{}: Connection lost", context))
            }
            _ => SprpcError::Io(io_err),
        },
        other => other,
    }
}
