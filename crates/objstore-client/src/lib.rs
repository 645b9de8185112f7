//! S3-compatible object-storage client.
//!
//! The crate is organized around the request path:
//!
//! - [`addressing`] decides between virtual-hosted and path-style addressing and
//!   builds the canonical resource the signer depends on.
//! - [`pipeline`] runs the ordered request preparation steps
//!   (resolve-addressing, attach-acl, attach-content-md5, sign).
//! - [`client::ObjectStoreClient`] sends prepared requests through an injected
//!   [`transport::HttpTransport`] and applies the [`retry`] policy.
//! - [`ops`] implements the individual service operations on top of `send`.
//! - [`transfer`] holds the multipart upload and resumable download state machines
//!   and the directory-tree sync built on them.
//!
//! With the `test-util` feature, [`testing::MemoryObjectStore`] provides an in-process
//! transport emulating an object store, with fault injection for retry tests.

pub mod addressing;
pub mod checksums;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod listing;
pub mod ops;
pub mod pipeline;
pub mod request;
pub mod retry;
pub mod transfer;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use client::ObjectStoreClient;
pub use config::{AddressingStyle, ClientConfig, SignatureVersion};
pub use endpoint::{Endpoint, Scheme};
pub use error::{ClientError, ServiceError};
pub use listing::{ListEntry, ListingCursor};
pub use request::{Body, FileBody, RequestDescriptor};
pub use transport::{
    HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, RequestBody, TransportError,
};
