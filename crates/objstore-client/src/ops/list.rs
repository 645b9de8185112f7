//! Object listing and prefix-wide deletion.

use http::Method;
use objstore_model::Operation;
use objstore_model::types::{ListObjectsV2Result, Object};
use tracing::debug;

use super::parse_body;
use crate::client::ObjectStoreClient;
use crate::error::{ClientError, ServiceError};
use crate::request::RequestDescriptor;

/// Parameters of one `ListObjectsV2` page request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsRequest {
    /// Bucket to list.
    pub bucket: String,
    /// Only keys starting with this prefix.
    pub prefix: Option<String>,
    /// Group keys sharing a prefix up to this delimiter into common prefixes.
    pub delimiter: Option<String>,
    /// Continuation token of the previous page.
    pub continuation_token: Option<String>,
    /// Start listing after this key.
    pub start_after: Option<String>,
    /// Maximum number of entries per page.
    pub max_keys: Option<u32>,
}

impl ListObjectsRequest {
    /// List a whole bucket.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// Restrict to a prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Group by a delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }
}

impl ObjectStoreClient {
    /// Fetch one page of a listing.
    pub async fn list_objects_v2(
        &self,
        request: &ListObjectsRequest,
    ) -> Result<ListObjectsV2Result, ClientError> {
        let mut desc = RequestDescriptor::new(Operation::ListObjects, Method::GET)
            .bucket(&request.bucket)
            .query("list-type", "2");
        if let Some(prefix) = request.prefix.as_deref().filter(|p| !p.is_empty()) {
            desc = desc.query("prefix", prefix);
        }
        if let Some(delimiter) = &request.delimiter {
            desc = desc.query("delimiter", delimiter);
        }
        if let Some(token) = &request.continuation_token {
            desc = desc.query("continuation-token", token);
        }
        if let Some(start_after) = &request.start_after {
            desc = desc.query("start-after", start_after);
        }
        if let Some(max) = request.max_keys {
            desc = desc.query("max-keys", max.to_string());
        }

        let response = self.send(desc).await?;
        let page: ListObjectsV2Result = parse_body(&response)?;
        debug!(
            bucket = %request.bucket,
            prefix = ?request.prefix,
            objects = page.contents.len(),
            prefixes = page.common_prefixes.len(),
            truncated = page.is_truncated,
            "list_objects_v2 page"
        );
        Ok(page)
    }

    /// List every object under a prefix, following continuation tokens.
    pub async fn list_all_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<Object>, ClientError> {
        let mut request = ListObjectsRequest::new(bucket);
        request.prefix = prefix.map(str::to_owned);
        let mut objects = Vec::new();
        loop {
            let page = self.list_objects_v2(&request).await?;
            objects.extend(page.contents);
            match page.next_continuation_token {
                Some(token) if page.is_truncated => request.continuation_token = Some(token),
                _ => return Ok(objects),
            }
        }
    }

    /// Delete every object under `prefix` whose entry satisfies `predicate`.
    ///
    /// Returns the number of deleted keys. Per-key failures reported by the batch
    /// delete are surfaced as an error naming the first failing key.
    pub async fn delete_matching<F>(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        predicate: F,
    ) -> Result<usize, ClientError>
    where
        F: Fn(&Object) -> bool,
    {
        let keys: Vec<String> = self
            .list_all_objects(bucket, prefix)
            .await?
            .into_iter()
            .filter(|o| predicate(o))
            .map(|o| o.key)
            .collect();
        if keys.is_empty() {
            return Ok(0);
        }

        let result = self.delete_objects(bucket, &keys).await?;
        if let Some(err) = result.errors.first() {
            // Per-key errors arrive inside a 200 response.
            return Err(ClientError::Service(ServiceError {
                status: 200,
                code: err.code.clone(),
                message: err.message.clone(),
                request_id: None,
                resource: Some(err.key.clone()),
            }));
        }
        debug!(bucket, ?prefix, deleted = result.deleted.len(), "delete_matching completed");
        Ok(result.deleted.len())
    }
}
