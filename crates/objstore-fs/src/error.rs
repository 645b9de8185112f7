//! Stream wrapper errors and their translation to [`std::io::Error`].

use std::io;

use objstore_client::ClientError;
use objstore_client::TransportError;
use objstore_model::codes;

/// Errors raised by the stream wrapper before they are surfaced as [`io::Error`].
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// A client call failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The URL is not of the form `<scheme>://bucket/key`.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The open mode is unknown or unsupported.
    #[error("invalid open mode: {0}")]
    InvalidMode(String),

    /// The target already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The target does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A directory still holds objects.
    #[error("directory not empty: {0}")]
    NotEmpty(String),

    /// The operation is not supported for this target or stream.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A scheme is already registered.
    #[error("scheme already registered: {0}")]
    SchemeTaken(String),

    /// Local buffer I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FsError {
    /// The [`io::ErrorKind`] this error is reported as.
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::Client(err) => client_error_kind(err),
            Self::InvalidUrl(_) | Self::InvalidMode(_) => io::ErrorKind::InvalidInput,
            Self::AlreadyExists(_) | Self::SchemeTaken(_) => io::ErrorKind::AlreadyExists,
            Self::NotFound(_) => io::ErrorKind::NotFound,
            Self::NotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            Self::Unsupported(_) => io::ErrorKind::Unsupported,
            Self::Io(err) => err.kind(),
        }
    }
}

fn client_error_kind(err: &ClientError) -> io::ErrorKind {
    match err {
        ClientError::NotFound(_) => io::ErrorKind::NotFound,
        ClientError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
        ClientError::Io(io_err) => io_err.kind(),
        ClientError::Transport(TransportError::Timeout(_)) => io::ErrorKind::TimedOut,
        ClientError::Cancelled => io::ErrorKind::Interrupted,
        ClientError::UploadFailed { source, .. } => client_error_kind(source),
        _ if err.status() == Some(403) => io::ErrorKind::PermissionDenied,
        _ => match err.code() {
            Some(codes::BUCKET_ALREADY_OWNED_BY_YOU | codes::BUCKET_ALREADY_EXISTS) => {
                io::ErrorKind::AlreadyExists
            }
            Some(codes::BUCKET_NOT_EMPTY) => io::ErrorKind::DirectoryNotEmpty,
            _ => io::ErrorKind::Other,
        },
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        match err {
            FsError::Io(err) => err,
            other => io::Error::new(other.kind(), other),
        }
    }
}

/// Log a failed wrapper call and turn it into an [`io::Error`].
pub(crate) fn report(operation: &str, url: &str, err: FsError) -> io::Error {
    tracing::warn!(operation, url, error = %err, "stream wrapper call failed");
    err.into()
}
