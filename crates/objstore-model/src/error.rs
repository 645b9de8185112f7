//! Service error bodies and the well-known error codes the client branches on.

/// A parsed `<Error>` document returned by the object store.
///
/// S3 uses `noErrorWrapping`, so the document is a flat `<Error>` element with
/// `Code`, `Message` and optional `Resource` / `RequestId` children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// The bucket or key the error refers to.
    pub resource: Option<String>,
    /// Service-assigned request id.
    pub request_id: Option<String>,
}

/// Error codes with special meaning to the client.
pub mod codes {
    /// The bucket does not exist.
    pub const NO_SUCH_BUCKET: &str = "NoSuchBucket";
    /// The key does not exist.
    pub const NO_SUCH_KEY: &str = "NoSuchKey";
    /// The multipart upload id does not exist (aborted or completed).
    pub const NO_SUCH_UPLOAD: &str = "NoSuchUpload";
    /// The bucket has no policy attached.
    pub const NO_SUCH_BUCKET_POLICY: &str = "NoSuchBucketPolicy";
    /// Generic not-found code used for bodiless (HEAD) responses.
    pub const NOT_FOUND: &str = "NotFound";
    /// The bucket is not empty.
    pub const BUCKET_NOT_EMPTY: &str = "BucketNotEmpty";
    /// The bucket already exists and is owned by the caller.
    pub const BUCKET_ALREADY_OWNED_BY_YOU: &str = "BucketAlreadyOwnedByYou";
    /// The bucket name is taken.
    pub const BUCKET_ALREADY_EXISTS: &str = "BucketAlreadyExists";
    /// Access denied.
    pub const ACCESS_DENIED: &str = "AccessDenied";
    /// The socket was not read from or written to within the timeout period.
    pub const REQUEST_TIMEOUT: &str = "RequestTimeout";
    /// Temporary credentials have expired.
    pub const EXPIRED_TOKEN: &str = "ExpiredToken";
    /// Temporary credentials have expired (alternate spelling used by some services).
    pub const EXPIRED_TOKEN_EXCEPTION: &str = "ExpiredTokenException";
    /// The service asks the caller to refresh its token.
    pub const TOKEN_REFRESH_REQUIRED: &str = "TokenRefreshRequired";
    /// Request throttled.
    pub const SLOW_DOWN: &str = "SlowDown";
    /// Content-MD5 did not match the body.
    pub const BAD_DIGEST: &str = "BadDigest";
    /// Range not satisfiable.
    pub const INVALID_RANGE: &str = "InvalidRange";
    /// Completion listed a part that was never uploaded or has a different ETag.
    pub const INVALID_PART: &str = "InvalidPart";
    /// Completion listed parts out of order.
    pub const INVALID_PART_ORDER: &str = "InvalidPartOrder";
    /// Internal server error.
    pub const INTERNAL_ERROR: &str = "InternalError";
}

impl ErrorResponse {
    /// Build an error response from a code and message.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            resource: None,
            request_id: None,
        }
    }
}
