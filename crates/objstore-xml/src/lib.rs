//! RestXml codec for the objstore client.
//!
//! Object stores speaking the S3 REST dialect exchange small XML documents for
//! listings, multipart bookkeeping, batch deletes and errors. This crate turns
//! the types from `objstore-model` into those documents and back.
//!
//! Both directions are implemented for every type: the client writes request
//! bodies and reads responses, while the in-memory test store does the reverse.
//!
//! # XML conventions
//!
//! - Namespace: `http://s3.amazonaws.com/doc/2006-03-01/`
//! - Booleans: lowercase `true`/`false`
//! - Timestamps: ISO 8601 with milliseconds (`2006-02-03T16:45:09.000Z`)
//! - Errors: a flat `<Error>` element, no outer wrapper

pub mod deserialize;
pub mod error;
pub mod serialize;

pub use deserialize::{XmlDeserialize, from_xml};
pub use error::{XmlError, error_from_xml, error_to_xml};
pub use serialize::{S3_NAMESPACE, XmlSerialize, format_timestamp, to_xml};
