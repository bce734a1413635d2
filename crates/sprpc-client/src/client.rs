use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sprpc_common::protocol::error::{Result, SprpcError};
use sprpc_common::protocol::{format_method_call, parse_method_response, MethodCall, Schema, Value};
use sprpc_common::transport::{Connection, Request, Response};
use tokio::io::{AsyncRead, AsyncWrite};
use url::Url;

use crate::batch::Batch;
use crate::bound::BoundMethod;

/// Sends one HTTP request and returns its response.
///
/// This is the seam between the XML-RPC client and whatever carries the
/// bytes. [`Connection`] implements it for any duplex stream.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl<S> Handler for Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn handle(&self, request: Request) -> Result<Response> {
        self.fetch(request).await
    }
}

/// Configuration for [`XmlRpcClient`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Endpoint URL; its path is the request target and its host the `Host` header
    pub url: String,
    /// Value of the `User-Agent` header
    pub user_agent: String,
    /// Timeout per call, covering the request, the response head and the body (milliseconds)
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9001/RPC2".to_string(),
            user_agent: concat!("sprpc/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl ClientConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn parsed_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.url)?)
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// XML-RPC client
///
/// Formats method calls, posts them through a [`Handler`], and parses the
/// response. A `<fault>` answer surfaces as [`SprpcError::Fault`].
///
/// # Example
///
/// ```no_run
/// use sprpc_client::{ClientConfig, XmlRpcClient};
/// use sprpc_common::protocol::MethodCall;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = XmlRpcClient::connect(&ClientConfig::default()).await?;
/// let pid = client.call(&MethodCall::new("supervisor.getPID")).await?;
/// println!("{:?}", pid);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct XmlRpcClient {
    url: Url,
    user_agent: String,
    timeout: Duration,
    handler: Arc<dyn Handler>,
}

impl XmlRpcClient {
    /// Create a client posting to `url` through `handler`
    pub fn new(url: Url, handler: impl Handler + 'static) -> Self {
        Self {
            url,
            user_agent: ClientConfig::default().user_agent,
            timeout: ClientConfig::default().timeout(),
            handler: Arc::new(handler),
        }
    }

    /// Create a client from a configuration and an existing handler
    pub fn from_config(config: &ClientConfig, handler: impl Handler + 'static) -> Result<Self> {
        Ok(Self::new(config.parsed_url()?, handler)
            .with_user_agent(config.user_agent.clone())
            .with_timeout(config.timeout()))
    }

    /// Connect over TCP to the host and port named by `config.url`
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let url = config.parsed_url()?;
        let host = url
            .host_str()
            .ok_or_else(|| SprpcError::InvalidRequest(format!("no host in '{}'", url)))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| SprpcError::InvalidRequest(format!("no port in '{}'", url)))?;

        let connection = Connection::connect_tcp(&format!("{}:{}", host, port))
            .await?
            .with_timeout(config.timeout());
        Self::from_config(config, connection)
    }

    /// Connect to a local unix socket; `config.url` still supplies the
    /// request target and `Host` header.
    #[cfg(unix)]
    pub async fn connect_unix(config: &ClientConfig, path: impl AsRef<std::path::Path>) -> Result<Self> {
        let connection = Connection::connect_unix(path)
            .await?
            .with_timeout(config.timeout());
        Self::from_config(config, connection)
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Call a method and return its result value
    ///
    /// # Errors
    ///
    /// - [`SprpcError::HttpStatus`] for any status other than 200
    /// - [`SprpcError::Fault`] when the server answers with a fault
    /// - [`SprpcError::Timeout`] when the whole exchange, body included,
    ///   outlasts the client's timeout
    /// - Transport, decode and parse errors as they occur
    pub async fn call(&self, call: &MethodCall) -> Result<Value> {
        tracing::debug!(method = %call.method_name, params = call.params.len(), "calling");

        let timeout_ms = self.timeout.as_millis() as u64;
        match tokio::time::timeout(self.timeout, self.exchange(call)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(method = %call.method_name, timeout_ms, "call timed out");
                Err(SprpcError::Timeout(timeout_ms))
            }
        }
    }

    async fn exchange(&self, call: &MethodCall) -> Result<Value> {
        let response = self.handler.handle(self.to_http_request(call)).await?;
        if response.status != 200 {
            let status = response.status;
            let status_text = response.status_text.clone();
            // Drained so the connection can carry the next exchange.
            if let Err(err) = response.bytes().await {
                tracing::debug!(status, error = %err, "failed to drain error response");
            }
            return Err(SprpcError::HttpStatus {
                status,
                status_text,
            });
        }

        let body = response.text().await?;
        parse_method_response(&body)?.into_result()
    }

    /// Issue several calls in one `system.multicall` round trip
    ///
    /// Results come back in call order, each decoded with its own schema.
    /// A batch is either a tuple of [`TypedMethodCall`](crate::TypedMethodCall)s
    /// or a `Vec` of calls sharing one result type.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use sprpc_client::{ClientConfig, Supervisor, XmlRpcClient};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let client = XmlRpcClient::connect(&ClientConfig::default()).await?;
    /// let supervisor = Supervisor::bind(&client);
    /// let (pid, state) = client
    ///     .multicall((supervisor.get_pid.build(()), supervisor.get_state.build(())))
    ///     .await?;
    /// println!("{} {}", pid, state.statename);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn multicall<B: Batch>(&self, batch: B) -> Result<B::Output> {
        let calls = batch.method_calls();
        let expected = calls.len();
        let call = MethodCall::new("system.multicall")
            .arg(Value::array(calls.iter().map(MethodCall::to_value)));

        let results = match self.call(&call).await? {
            Value::Array(results) => results,
            other => {
                return Err(SprpcError::InvalidResponse(format!(
                    "system.multicall returned {}, expected Array",
                    other.kind()
                )))
            }
        };
        if results.len() != expected {
            return Err(SprpcError::InvalidResponse(format!(
                "system.multicall returned {} results for {} calls",
                results.len(),
                expected
            )));
        }

        batch.decode(&results)
    }

    /// Pair an argument builder with a result schema
    pub fn bind<A, R, F>(&self, build: F, schema: Schema<R>) -> BoundMethod<A, R>
    where
        R: 'static,
        F: Fn(A) -> MethodCall + Send + Sync + 'static,
    {
        BoundMethod::new(self.clone(), Arc::new(build), schema)
    }

    /// The POST request carrying `call`
    pub fn to_http_request(&self, call: &MethodCall) -> Request {
        let body = format_method_call(call);

        Request::post(self.url.clone())
            .with_header("Host", host_header(&self.url))
            .with_header("User-Agent", self.user_agent.as_str())
            .with_header("Content-Type", "text/xml")
            .with_header("Content-Length", body.len().to_string())
            .with_body(Bytes::from(body))
    }
}

impl std::fmt::Debug for XmlRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlRpcClient")
            .field("url", &self.url.as_str())
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}
