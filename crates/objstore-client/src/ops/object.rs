//! Object operations: put, get, head, delete, batch delete and copy.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::Method;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use objstore_model::types::{CopyObjectResult, Delete, DeleteResult, ObjectIdentifier};
use objstore_model::{CannedAcl, Operation};
use objstore_xml::error_from_xml;
use tracing::debug;

use super::{parse_body, xml_body};
use crate::addressing::encode_key;
use crate::client::ObjectStoreClient;
use crate::error::{ClientError, ServiceError};
use crate::request::{Body, RequestDescriptor};
use crate::transport::HttpResponse;

/// Keys per `DeleteObjects` request.
pub const DELETE_BATCH_SIZE: usize = 1000;

const META_PREFIX: &str = "x-amz-meta-";

/// Options of a single-request upload.
#[derive(Debug, Clone, Default)]
pub struct PutObjectOptions {
    /// `Content-Type` of the object.
    pub content_type: Option<String>,
    /// Canned ACL.
    pub acl: Option<CannedAcl>,
    /// User metadata, sent as `x-amz-meta-<name>`.
    pub metadata: BTreeMap<String, String>,
    /// Send `Content-MD5` so the service verifies the body.
    pub content_md5: bool,
}

/// Object metadata from a HEAD or GET response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Size of the object (or of the returned range for a ranged GET).
    pub content_length: u64,
    /// ETag, quoted as returned by the service.
    pub e_tag: Option<String>,
    /// Content type.
    pub content_type: Option<String>,
    /// Last modification time.
    pub last_modified: Option<DateTime<Utc>>,
    /// Base64 `Content-MD5` of the whole object, when the service stores one.
    pub content_md5: Option<String>,
    /// User metadata without the `x-amz-meta-` prefix.
    pub metadata: BTreeMap<String, String>,
}

impl ObjectMetadata {
    /// Extract metadata from response headers.
    #[must_use]
    pub fn from_response(response: &HttpResponse) -> Self {
        let metadata = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                let name = name.as_str().strip_prefix(META_PREFIX)?;
                Some((name.to_owned(), value.to_str().ok()?.to_owned()))
            })
            .collect();
        Self {
            content_length: response
                .header(CONTENT_LENGTH.as_str())
                .and_then(|v| v.parse().ok())
                .unwrap_or(response.body.len() as u64),
            e_tag: response.header(ETAG.as_str()).map(str::to_owned),
            content_type: response.header(CONTENT_TYPE.as_str()).map(str::to_owned),
            last_modified: response
                .header(LAST_MODIFIED.as_str())
                .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
                .map(|d| d.with_timezone(&Utc)),
            content_md5: response.header("content-md5").map(str::to_owned),
            metadata,
        }
    }
}

/// Result of a GET.
#[derive(Debug, Clone)]
pub struct GetObjectOutput {
    /// Response body.
    pub body: Bytes,
    /// Response metadata.
    pub metadata: ObjectMetadata,
}

/// Format a `Range` header for `start..=end` (or `start..` when `end` is `None`).
#[must_use]
pub fn range_header(start: u64, end: Option<u64>) -> String {
    match end {
        Some(end) => format!("bytes={start}-{end}"),
        None => format!("bytes={start}-"),
    }
}

impl ObjectStoreClient {
    /// Upload an object in one request. Returns the ETag.
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: impl Into<Body>,
        options: &PutObjectOptions,
    ) -> Result<Option<String>, ClientError> {
        let mut desc = RequestDescriptor::new(Operation::PutObject, Method::PUT)
            .bucket(bucket)
            .key(key)
            .body(body)
            .acl(options.acl);
        if let Some(ct) = &options.content_type {
            desc = desc.header(CONTENT_TYPE.as_str(), ct)?;
        }
        for (name, value) in &options.metadata {
            desc = desc.header(&format!("{META_PREFIX}{name}"), value)?;
        }
        if options.content_md5 {
            desc = desc.with_content_md5();
        }

        let response = self.send(desc).await?;
        let etag = response.header(ETAG.as_str()).map(str::to_owned);
        debug!(bucket, key, ?etag, "put_object completed");
        Ok(etag)
    }

    /// Download an object, or the inclusive byte range `start..=end` of it.
    pub async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<(u64, Option<u64>)>,
    ) -> Result<GetObjectOutput, ClientError> {
        let mut desc = RequestDescriptor::new(Operation::GetObject, Method::GET)
            .bucket(bucket)
            .key(key);
        if let Some((start, end)) = range {
            desc = desc.header("range", &range_header(start, end))?;
        }
        let response = self.send(desc).await?;
        let metadata = ObjectMetadata::from_response(&response);
        Ok(GetObjectOutput {
            body: response.body,
            metadata,
        })
    }

    /// Fetch object metadata.
    pub async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectMetadata, ClientError> {
        let response = self
            .send(
                RequestDescriptor::new(Operation::HeadObject, Method::HEAD)
                    .bucket(bucket)
                    .key(key),
            )
            .await?;
        Ok(ObjectMetadata::from_response(&response))
    }

    /// Delete an object. Deleting a missing key succeeds.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ClientError> {
        self.send(
            RequestDescriptor::new(Operation::DeleteObject, Method::DELETE)
                .bucket(bucket)
                .key(key),
        )
        .await?;
        debug!(bucket, key, "delete_object completed");
        Ok(())
    }

    /// Delete many objects, batching by [`DELETE_BATCH_SIZE`]. Per-key failures are
    /// reported in the result rather than as an error.
    pub async fn delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<DeleteResult, ClientError> {
        let mut result = DeleteResult::default();
        for chunk in keys.chunks(DELETE_BATCH_SIZE) {
            let delete = Delete {
                objects: chunk
                    .iter()
                    .map(|k| ObjectIdentifier { key: k.clone() })
                    .collect(),
                quiet: false,
            };
            let desc = RequestDescriptor::new(Operation::DeleteObjects, Method::POST)
                .bucket(bucket)
                .flag("delete")
                .body(xml_body("Delete", &delete)?)
                .with_content_md5();
            let response = self.send(desc).await?;
            let page: DeleteResult = parse_body(&response)?;
            result.deleted.extend(page.deleted);
            result.errors.extend(page.errors);
        }
        debug!(
            bucket,
            deleted = result.deleted.len(),
            errors = result.errors.len(),
            "delete_objects completed"
        );
        Ok(result)
    }

    /// Server-side copy.
    pub async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        bucket: &str,
        key: &str,
        acl: Option<CannedAcl>,
    ) -> Result<CopyObjectResult, ClientError> {
        let source = format!("/{source_bucket}/{}", encode_key(source_key));
        let desc = RequestDescriptor::new(Operation::CopyObject, Method::PUT)
            .bucket(bucket)
            .key(key)
            .acl(acl)
            .header("x-amz-copy-source", &source)?;
        let response = self.send(desc).await?;
        // A copy can fail after the 200 status line was sent.
        if let Some(error) = error_from_xml(&response.body) {
            return Err(ClientError::Service(ServiceError::from_response(
                response.status.as_u16(),
                error,
            )));
        }
        parse_body(&response)
    }
}
