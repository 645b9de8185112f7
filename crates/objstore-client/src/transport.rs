//! HTTP transport abstraction.
//!
//! The client never talks to the network directly. It hands fully prepared and signed
//! [`HttpRequest`]s to an [`HttpTransport`], so tests can inject an in-process store
//! and deployments can swap the HTTP stack.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::config::ClientConfig;

/// A signed request ready to send.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL including the encoded query string.
    pub url: String,
    /// Headers, including `Host`, `Authorization` and `Content-Length`.
    pub headers: HeaderMap,
    /// Body, matching the `Content-Length` header.
    pub body: RequestBody,
}

/// Body of a prepared request.
///
/// File bodies stay on disk until the transport streams them, so large uploads are
/// never held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// In-memory bytes.
    Bytes(Bytes),
    /// `len` bytes of a local file starting at `offset`.
    File {
        /// Path of the file.
        path: PathBuf,
        /// Offset of the first byte.
        offset: u64,
        /// Number of bytes to send.
        len: u64,
    },
}

impl Default for RequestBody {
    fn default() -> Self {
        Self::Bytes(Bytes::new())
    }
}

impl From<Bytes> for RequestBody {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl RequestBody {
    /// Number of bytes the body sends.
    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            Self::Bytes(b) => b.len() as u64,
            Self::File { len, .. } => *len,
        }
    }

    /// Whether the body sends nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a file body as a reader positioned at its offset and limited to its length.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened or seeked.
    pub async fn open_file(
        path: &Path,
        offset: u64,
        len: u64,
    ) -> io::Result<tokio::io::Take<tokio::fs::File>> {
        let mut file = tokio::fs::File::open(path).await?;
        if offset > 0 {
            file.seek(io::SeekFrom::Start(offset)).await?;
        }
        Ok(file.take(len))
    }

    /// Read the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a file body cannot be read.
    pub async fn collect(self) -> io::Result<Bytes> {
        match self {
            Self::Bytes(b) => Ok(b),
            Self::File { path, offset, len } => {
                let mut reader = Self::open_file(&path, offset, len).await?;
                let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or_default());
                reader.read_to_end(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
        }
    }

    async fn into_reqwest(self) -> io::Result<reqwest::Body> {
        match self {
            Self::Bytes(b) => Ok(reqwest::Body::from(b)),
            Self::File { path, offset, len } => {
                let reader = Self::open_file(&path, offset, len).await?;
                Ok(reqwest::Body::wrap_stream(ReaderStream::new(reader)))
            }
        }
    }
}

/// A response as received from the transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Full response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Value of a header as a string, if present and visible ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Failures below the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),
    /// The request timed out.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Any other transport failure (reset connection, truncated body, TLS setup, ...).
    #[error("{0}")]
    Other(String),
}

/// Sends prepared requests.
#[async_trait]
pub trait HttpTransport: Send + Sync + fmt::Debug {
    /// Send a request and return the complete response.
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response was received.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport honoring the configured timeout and an optional CA bundle.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Other`] if the CA bundle cannot be read or parsed or
    /// the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, ca_bundle: Option<&Path>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }
        if let Some(path) = ca_bundle {
            let pem = std::fs::read(path).map_err(|e| {
                TransportError::Other(format!("failed to read CA bundle {}: {e}", path.display()))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| TransportError::Other(format!("invalid CA bundle: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing `reqwest` client.
    #[must_use]
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let HttpRequest {
            method,
            url,
            mut headers,
            body,
        } = request;
        // reqwest derives Host from the URL.
        headers.remove(http::header::HOST);
        let body = body
            .into_reqwest()
            .await
            .map_err(|e| TransportError::Other(format!("failed to open request body: {e}")))?;

        let response = self
            .client
            .request(method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        debug!(%url, status = status.as_u16(), len = body.len(), "received response");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}
