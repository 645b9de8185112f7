//! Client error types.

use objstore_auth::AuthError;
use objstore_model::ErrorResponse;
use objstore_xml::XmlError;

use crate::transport::TransportError;

/// An error response returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code} (status {status}): {message}")]
pub struct ServiceError {
    /// HTTP status code.
    pub status: u16,
    /// Service error code, e.g. `NoSuchKey`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Request id reported by the service.
    pub request_id: Option<String>,
    /// Resource the error refers to.
    pub resource: Option<String>,
}

impl ServiceError {
    /// Build from a parsed `<Error>` document.
    #[must_use]
    pub fn from_response(status: u16, response: ErrorResponse) -> Self {
        Self {
            status,
            code: response.code,
            message: response.message,
            request_id: response.request_id,
            resource: response.resource,
        }
    }

    /// Build from a bare status, e.g. for HEAD responses which carry no body.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        let code = match status {
            301 => "PermanentRedirect",
            400 => "BadRequest",
            403 => "Forbidden",
            404 => "NotFound",
            409 => "Conflict",
            412 => "PreconditionFailed",
            416 => "InvalidRange",
            429 => "SlowDown",
            500 => "InternalError",
            503 => "ServiceUnavailable",
            _ => "UnknownError",
        };
        Self {
            status,
            code: code.to_owned(),
            message: format!("HTTP {status}"),
            request_id: None,
            resource: None,
        }
    }
}

/// Errors returned by the client, the transfer engine and the operations built on them.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A request could not be signed.
    #[error("signing failed: {0}")]
    Signing(#[from] AuthError),

    /// The transport failed to deliver the request or receive a response.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The service returned an error response.
    #[error("service error: {0}")]
    Service(ServiceError),

    /// The bucket, key or upload does not exist.
    #[error("not found: {0}")]
    NotFound(ServiceError),

    /// A downloaded object failed its checksum.
    #[error("integrity check failed for {key}: expected {expected}, got {actual}")]
    Integrity {
        /// Object key.
        key: String,
        /// Expected MD5 (hex).
        expected: String,
        /// MD5 of the local data (hex).
        actual: String,
    },

    /// A response body could not be parsed.
    #[error("invalid response body: {0}")]
    Xml(#[from] XmlError),

    /// Local I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller passed an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A multipart upload failed; the upload id is reported so it can be cleaned up
    /// or resumed when it was left in place.
    #[error(
        "multipart upload {upload_id} failed (part {part_number:?}, aborted: {aborted}): {source}"
    )]
    UploadFailed {
        /// Upload id.
        upload_id: String,
        /// Failing part, if a part failed.
        part_number: Option<u32>,
        /// Whether the abort call was issued successfully.
        aborted: bool,
        /// The underlying failure.
        #[source]
        source: Box<ClientError>,
    },

    /// The transfer was cancelled through its abort handle.
    #[error("transfer cancelled")]
    Cancelled,
}

impl ClientError {
    /// HTTP status of a service error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service(e) | Self::NotFound(e) => Some(e.status),
            Self::UploadFailed { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Service error code.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service(e) | Self::NotFound(e) => Some(&e.code),
            Self::UploadFailed { source, .. } => source.code(),
            _ => None,
        }
    }

    /// Whether this is a not-found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Turn a service error into the matching variant: 404 becomes `NotFound`.
    #[must_use]
    pub fn from_service(error: ServiceError) -> Self {
        if error.status == 404 {
            Self::NotFound(error)
        } else {
            Self::Service(error)
        }
    }
}
