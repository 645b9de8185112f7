//! Fault injection for [`MemoryObjectStore`](super::MemoryObjectStore).

use http::Method;

use super::RecordedRequest;
use crate::transport::TransportError;

/// Selects the requests a fault applies to. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMatcher {
    method: Option<Method>,
    bucket: Option<String>,
    key: Option<String>,
    query: Vec<(String, Option<String>)>,
    headers: Vec<(String, String)>,
}

impl RequestMatcher {
    /// Match every request.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Only requests with this method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Only requests addressed to this bucket.
    #[must_use]
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Only requests addressed to this key.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Only requests carrying `name=value` in the query.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), Some(value.into())));
        self
    }

    /// Only requests carrying `name` in the query, with any value.
    #[must_use]
    pub fn flag(mut self, name: impl Into<String>) -> Self {
        self.query.push((name.into(), None));
        self
    }

    /// Only requests carrying header `name` with exactly `value`.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Whether `request` is selected.
    #[must_use]
    pub fn matches(&self, request: &RecordedRequest) -> bool {
        self.method.as_ref().is_none_or(|m| *m == request.method)
            && self
                .bucket
                .as_ref()
                .is_none_or(|b| request.bucket.as_ref() == Some(b))
            && self.key.as_ref().is_none_or(|k| request.key.as_ref() == Some(k))
            && self.query.iter().all(|(name, value)| match value {
                Some(v) => request.query.get(name) == Some(v),
                None => request.query.contains_key(name),
            })
            && self
                .headers
                .iter()
                .all(|(name, value)| request.header(name) == Some(value.as_str()))
    }
}

/// What the store answers instead of handling the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultResponse {
    /// An error document with this status and code.
    Status(u16, String),
    /// The 400 `RequestTimeout` answer to a body that arrived too slowly.
    SocketTimeout,
    /// The 400 `ExpiredToken` answer.
    ExpiredToken,
    /// Fail below HTTP without touching the store.
    Transport(TransportError),
    /// Apply the request, then fail below HTTP so the caller never sees the answer.
    TransportAfterApply(TransportError),
    /// A 307 pointing at `host`, optionally announcing the bucket region.
    Redirect {
        /// Host of the `Location` header.
        host: String,
        /// Value of `x-amz-bucket-region`.
        region: Option<String>,
    },
}

impl FaultResponse {
    /// Shorthand for [`FaultResponse::Status`].
    pub fn status(status: u16, code: impl Into<String>) -> Self {
        Self::Status(status, code.into())
    }
}

#[derive(Debug, Clone)]
pub(super) struct Fault {
    pub(super) matcher: RequestMatcher,
    pub(super) response: FaultResponse,
    pub(super) remaining: usize,
}
