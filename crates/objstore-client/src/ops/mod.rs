//! Service operations.
//!
//! Each submodule adds methods to [`crate::ObjectStoreClient`] for one category of
//! operations. All of them build a [`crate::RequestDescriptor`], go through
//! [`crate::ObjectStoreClient::send`] and decode the XML response.

pub mod bucket;
pub mod exists;
pub mod list;
pub mod multipart;
pub mod object;

pub use list::ListObjectsRequest;
pub use object::{GetObjectOutput, ObjectMetadata, PutObjectOptions};

use objstore_xml::{XmlDeserialize, from_xml};

use crate::error::ClientError;
use crate::transport::HttpResponse;

/// Decode a response body.
pub(crate) fn parse_body<T: XmlDeserialize>(response: &HttpResponse) -> Result<T, ClientError> {
    Ok(from_xml(&response.body)?)
}

/// Serialize a request body.
pub(crate) fn xml_body<T: objstore_xml::XmlSerialize>(
    root: &str,
    value: &T,
) -> Result<Vec<u8>, ClientError> {
    Ok(objstore_xml::to_xml(root, value)?)
}
