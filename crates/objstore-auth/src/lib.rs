//! Request signing for the objstore client.
//!
//! Two schemes are supported:
//!
//! - [`sigv2`]: the legacy HMAC-SHA1 scheme (`Authorization: AWS <akid>:<sig>`), still the
//!   only scheme understood by many S3-compatible services.
//! - [`sigv4`]: the region-scoped HMAC-SHA256 scheme (`AWS4-HMAC-SHA256`).
//!
//! [`signer::sign`] is the single entry point used by the request pipeline. It normalizes
//! the date header, attaches the session token and content hash when required, and writes
//! the `Authorization` header. [`presigned`] produces query-string authentication for URLs
//! handed to third parties.
//!
//! Signing is pure and synchronous; credentials are obtained through the async
//! [`CredentialProvider`] trait before signing.

pub mod canonical;
pub mod credentials;
pub mod error;
pub mod presigned;
pub mod signer;
pub mod sigv2;
pub mod sigv4;

pub use credentials::{
    CredentialProvider, Credentials, EnvCredentialProvider, StaticCredentialProvider,
};
pub use error::AuthError;
pub use presigned::{presign_v2, presign_v4};
pub use signer::{PayloadHash, SignableRequest, SigningOutput, SigningScheme, sign};
