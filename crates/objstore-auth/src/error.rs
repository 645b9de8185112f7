//! Error types for request signing.

/// Errors that can occur while preparing or signing a request.
///
/// All of them are fatal to the single request and never retried.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The credential has an empty access key id.
    #[error("Missing access key id")]
    MissingAccessKey,

    /// The credential has an empty secret access key.
    #[error("Missing secret access key")]
    MissingSecretKey,

    /// A region-scoped scheme was selected without a region.
    #[error("Missing region for region-scoped signing")]
    MissingRegion,

    /// A header value cannot be represented in a signed request.
    #[error("Invalid header value for {0}")]
    InvalidHeaderValue(String),

    /// The credential provider could not supply credentials.
    #[error("Credentials unavailable: {0}")]
    CredentialsUnavailable(String),

    /// A presigned URL expiry is zero or exceeds the scheme maximum.
    #[error("Invalid presigned URL expiry: {0} seconds")]
    InvalidExpiry(u64),
}
