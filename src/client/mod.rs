//! Thin HTTP transport for the content API.
//!
//! [`ResourceClient`] issues one HTTP/1.1 call per invocation against a
//! configured base address with a fixed timeout. It holds no cache and never
//! retries — failure classification is its entire job beyond moving bytes.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::http::response::ResponseError;
use crate::http::{Request, Response, StatusCode};

/// Errors produced while building a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {name} is not set")]
    MissingEnv { name: &'static str },

    #[error("unsupported scheme in base URL {url:?} — only http:// is supported")]
    UnsupportedScheme { url: String },

    #[error("base URL {url:?} has no host")]
    MissingHost { url: String },
}

/// Base address and timeout applied to every transport call.
///
/// # Examples
///
/// ```
/// use folio::client::ClientConfig;
///
/// let config = ClientConfig::new("http://api.example.com/v1").unwrap();
/// assert_eq!(config.host(), "api.example.com");
/// assert_eq!(config.path_prefix(), "/v1");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Authority as written in the base URL, sent as the `Host` header.
    host: String,
    /// `host:port` pair used for the TCP connection.
    addr: String,
    /// Path prefix from the base URL, prepended to every request path.
    path_prefix: String,
    timeout: Duration,
}

impl ClientConfig {
    /// Environment variable holding the content API base URL.
    pub const ENV_BASE_URL: &'static str = "FOLIO_API_URL";

    /// Timeout applied to every call unless overridden.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Parses a base URL of the form `http://host[:port][/prefix]`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnsupportedScheme`] for anything other than `http://`.
    /// - [`ConfigError::MissingHost`] when the authority part is empty.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ConfigError> {
        let url = base_url.as_ref().trim().trim_end_matches('/');

        let rest = url
            .strip_prefix("http://")
            .ok_or_else(|| ConfigError::UnsupportedScheme {
                url: url.to_owned(),
            })?;

        let (authority, prefix) = match rest.find('/') {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => (rest, ""),
        };

        if authority.is_empty() {
            return Err(ConfigError::MissingHost {
                url: url.to_owned(),
            });
        }

        let addr = if authority.contains(':') {
            authority.to_owned()
        } else {
            format!("{authority}:80")
        };

        Ok(Self {
            host: authority.to_owned(),
            addr,
            path_prefix: prefix.to_owned(),
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }

    /// Builds a config from the `FOLIO_API_URL` environment variable.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingEnv`] when the variable is unset, plus the
    /// [`ClientConfig::new`] errors for a malformed value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var(Self::ENV_BASE_URL).map_err(|_| ConfigError::MissingEnv {
            name: Self::ENV_BASE_URL,
        })?;
        Self::new(url)
    }

    /// Replaces the call timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the authority sent as the `Host` header.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the path prefix prepended to every request path.
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }
}

/// Errors surfaced by [`ResourceClient::call`].
///
/// The query and mutation engines store these verbatim — classification
/// happens here, at the transport boundary, and nowhere else.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("network error: {0}")]
    Network(#[source] io::Error),

    #[error("HTTP {status}")]
    HttpStatus { status: StatusCode, body: String },

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Coarse classification of a [`TransportError`], for callers that branch on
/// failure class rather than the concrete error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    Network,
    HttpStatus,
    Decode,
}

impl TransportError {
    /// Returns the failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Network(_) => ErrorKind::Network,
            Self::HttpStatus { .. } => ErrorKind::HttpStatus,
            Self::Decode(_) => ErrorKind::Decode,
        }
    }

    /// Returns the HTTP status for [`TransportError::HttpStatus`] errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the message to show a user.
    ///
    /// For HTTP errors whose body is a JSON object with a `message` field —
    /// the shape the content API uses — that field is returned; everything
    /// else falls back to the error's `Display` form.
    pub fn message(&self) -> String {
        if let Self::HttpStatus { body, .. } = self {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
                if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
                    return message.to_owned();
                }
            }
        }
        self.to_string()
    }
}

/// Maximum size of a complete HTTP response we will buffer before rejecting it (8 MiB).
const MAX_RESPONSE_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per call.
const INITIAL_BUF_SIZE: usize = 4096;

/// The folio HTTP transport.
///
/// Opens one TCP connection per call (`Connection: close`), writes the
/// serialized request, and reads the response until the `Content-Length`
/// body is complete or the server closes the connection.
///
/// # Examples
///
/// ```rust,no_run
/// use folio::client::{ClientConfig, ResourceClient};
/// use folio::http::{Method, Request};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::new("http://127.0.0.1:3001")?;
/// let client = ResourceClient::new(config);
/// let response = client
///     .call(Request::new(Method::Get, "/project").query("page", "1"))
///     .await?;
/// println!("{}", response.body_text());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ResourceClient {
    config: ClientConfig,
}

impl ResourceClient {
    /// Creates a transport over the given config.
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Returns the transport configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Performs one HTTP call and classifies the outcome.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Timeout`] — the whole call (connect, write, read)
    ///   exceeded the configured timeout.
    /// - [`TransportError::Network`] — connection failure, I/O error, or a
    ///   malformed/truncated response.
    /// - [`TransportError::HttpStatus`] — the server answered with a
    ///   non-2xx status; the body is captured for error surfacing.
    pub async fn call(&self, request: Request) -> Result<Response, TransportError> {
        let method = request.method();
        let path = request.path().to_owned();

        let outcome = tokio::time::timeout(self.config.timeout, self.perform(request)).await;

        let response = match outcome {
            Err(_) => {
                warn!(method = %method, path = %path, timeout = ?self.config.timeout, "request timed out");
                return Err(TransportError::Timeout {
                    after: self.config.timeout,
                });
            }
            Ok(Err(e)) => {
                warn!(method = %method, path = %path, error = %e, "transport call failed");
                return Err(e);
            }
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if status.is_success() {
            debug!(method = %method, path = %path, status = status.as_u16(), "call succeeded");
            Ok(response)
        } else {
            warn!(method = %method, path = %path, status = status.as_u16(), "non-success status");
            Err(TransportError::HttpStatus {
                status,
                body: response.body_text(),
            })
        }
    }

    /// Connects, writes the request, and reads one full response.
    async fn perform(&self, request: Request) -> Result<Response, TransportError> {
        let mut stream = TcpStream::connect(&self.config.addr)
            .await
            .map_err(TransportError::Network)?;

        let request = request.prefixed(&self.config.path_prefix);
        let bytes = request.into_bytes(&self.config.host);
        stream
            .write_all(&bytes)
            .await
            .map_err(TransportError::Network)?;
        stream.flush().await.map_err(TransportError::Network)?;

        let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

        loop {
            let bytes_read = stream
                .read_buf(&mut buf)
                .await
                .map_err(TransportError::Network)?;
            let eof = bytes_read == 0;

            if buf.len() > MAX_RESPONSE_SIZE {
                return Err(malformed("response exceeds maximum buffered size"));
            }

            match Response::parse(&buf) {
                Ok((head, body_offset)) => match head.content_length() {
                    Some(length) if buf.len() >= body_offset + length => {
                        // Complete — re-parse on the exact-length slice so the
                        // body holds precisely Content-Length bytes.
                        let (response, _) = Response::parse(&buf[..body_offset + length])
                            .map_err(malformed_parse)?;
                        return Ok(response);
                    }
                    Some(_) if eof => {
                        return Err(malformed("connection closed before body was complete"));
                    }
                    None if eof => {
                        // No Content-Length: body is everything up to close.
                        return Ok(head);
                    }
                    _ => continue,
                },
                Err(ResponseError::Incomplete) if !eof => continue,
                Err(ResponseError::Incomplete) => {
                    return Err(malformed("connection closed before headers were complete"));
                }
                Err(e) => return Err(malformed_parse(e)),
            }
        }
    }
}

/// A malformed or truncated response, classified as a network failure.
fn malformed(reason: &'static str) -> TransportError {
    TransportError::Network(io::Error::new(io::ErrorKind::InvalidData, reason))
}

fn malformed_parse(e: ResponseError) -> TransportError {
    TransportError::Network(io::Error::new(io::ErrorKind::InvalidData, e))
}
