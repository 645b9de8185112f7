//! Request descriptors and bodies.

use std::path::PathBuf;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use objstore_model::{CannedAcl, Operation};
use tracing::debug;

use crate::config::AddressingStyle;
use crate::error::ClientError;
use crate::transport::RequestBody;

/// A byte range of a local file used as a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBody {
    /// Path of the local file.
    pub path: PathBuf,
    /// Offset of the first byte to send.
    pub offset: u64,
    /// Number of bytes to send, or `None` for "to the end of the file".
    pub length: Option<u64>,
}

impl FileBody {
    /// A whole-file body.
    pub fn whole(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            length: None,
        }
    }

    /// A byte range of a file.
    pub fn range(path: impl Into<PathBuf>, offset: u64, length: u64) -> Self {
        Self {
            path: path.into(),
            offset,
            length: Some(length),
        }
    }
}

/// Request body.
#[derive(Debug, Clone, Default)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// In-memory bytes.
    Bytes(Bytes),
    /// A local file (or a range of it), streamed anew on every attempt.
    File(FileBody),
}

impl Body {
    /// Known length of the body without touching the filesystem.
    #[must_use]
    pub fn known_len(&self) -> Option<u64> {
        match self {
            Self::Empty => Some(0),
            Self::Bytes(b) => Some(b.len() as u64),
            Self::File(f) => f.length,
        }
    }

    /// Re-stat a whole-file body before it is sent again.
    ///
    /// Whole-file bodies are read to the current end of the file on every attempt, so
    /// a file that grew since the last attempt is sent at its new size. Returns that
    /// size; ranged and in-memory bodies return their fixed length.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] when the file cannot be stat'd.
    pub async fn restat(&self) -> Result<Option<u64>, ClientError> {
        match self {
            Self::File(file) if file.length.is_none() => {
                let len = tokio::fs::metadata(&file.path).await?.len();
                debug!(path = %file.path.display(), len, "re-stat body file");
                Ok(Some(len))
            }
            _ => Ok(self.known_len()),
        }
    }

    /// Resolve the body for one attempt.
    ///
    /// File bodies are not read: the result names the file range to stream, with its
    /// length taken from the file as it is now. A range reaching past the end of the
    /// file is cut at the end.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] when a file body cannot be stat'd.
    pub async fn resolve(&self) -> Result<RequestBody, ClientError> {
        match self {
            Self::Empty => Ok(RequestBody::default()),
            Self::Bytes(b) => Ok(RequestBody::Bytes(b.clone())),
            Self::File(file) => {
                let available = tokio::fs::metadata(&file.path)
                    .await?
                    .len()
                    .saturating_sub(file.offset);
                Ok(RequestBody::File {
                    path: file.path.clone(),
                    offset: file.offset,
                    len: file.length.map_or(available, |len| len.min(available)),
                })
            }
        }
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<&'static str> for Body {
    fn from(value: &'static str) -> Self {
        Self::Bytes(Bytes::from_static(value.as_bytes()))
    }
}

impl From<FileBody> for Body {
    fn from(value: FileBody) -> Self {
        Self::File(value)
    }
}

/// Everything needed to build, sign and send one logical request.
///
/// Host, path and canonical resource are derived per attempt by the pipeline, so a
/// descriptor can be re-sent after a redirect changed the endpoint.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// The service operation.
    pub operation: Operation,
    /// HTTP method.
    pub method: Method,
    /// Target bucket, absent for service-level calls.
    pub bucket: Option<String>,
    /// Target key.
    pub key: Option<String>,
    /// Query parameters in insertion order; `None` values are bare flags (`?uploads`).
    pub query: Vec<(String, Option<String>)>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Body.
    pub body: Body,
    /// Canned ACL attached as `x-amz-acl`.
    pub acl: Option<CannedAcl>,
    /// Attach a `Content-MD5` header computed from the body.
    pub compute_content_md5: bool,
    /// Per-call addressing override.
    pub addressing: Option<AddressingStyle>,
}

impl RequestDescriptor {
    /// Create a descriptor with no bucket, key, query, headers or body.
    #[must_use]
    pub fn new(operation: Operation, method: Method) -> Self {
        Self {
            operation,
            method,
            bucket: None,
            key: None,
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: Body::Empty,
            acl: None,
            compute_content_md5: false,
            addressing: None,
        }
    }

    /// Set the bucket.
    #[must_use]
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Set the key.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Add a query parameter with a value.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), Some(value.into())));
        self
    }

    /// Add a valueless query flag such as `uploads` or `policy`.
    #[must_use]
    pub fn flag(mut self, name: impl Into<String>) -> Self {
        self.query.push((name.into(), None));
        self
    }

    /// Add a header. Invalid names or values are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] for a malformed header.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ClientError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ClientError::InvalidArgument(format!("invalid header name: {name}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ClientError::InvalidArgument(format!("invalid value for header {name}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Attach a canned ACL.
    #[must_use]
    pub fn acl(mut self, acl: Option<CannedAcl>) -> Self {
        self.acl = acl;
        self
    }

    /// Ask the pipeline to attach `Content-MD5`.
    #[must_use]
    pub fn with_content_md5(mut self) -> Self {
        self.compute_content_md5 = true;
        self
    }

    /// Override the client's addressing style for this call.
    #[must_use]
    pub fn addressing(mut self, style: Option<AddressingStyle>) -> Self {
        self.addressing = style;
        self
    }
}
