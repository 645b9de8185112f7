//! Wire data types for the objstore S3-compatible client.
//!
//! The types here mirror the RestXml shapes exchanged with an S3-compatible
//! object store. They carry no behavior beyond small helpers; the XML codec
//! lives in `objstore-xml` and the request logic in `objstore-client`.
#![allow(missing_docs)]

pub mod error;
pub mod operations;
pub mod types;

pub use error::{ErrorResponse, codes};
pub use operations::Operation;
pub use types::CannedAcl;
