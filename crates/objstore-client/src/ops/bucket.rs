//! Bucket operations: list, create, head, delete and policy retrieval.

use http::Method;
use objstore_model::types::{CreateBucketConfiguration, ListBucketsResult};
use objstore_model::{CannedAcl, Operation};
use tracing::debug;

use super::{parse_body, xml_body};
use crate::client::ObjectStoreClient;
use crate::error::ClientError;
use crate::request::RequestDescriptor;

impl ObjectStoreClient {
    /// List the buckets owned by the caller.
    pub async fn list_buckets(&self) -> Result<ListBucketsResult, ClientError> {
        let response = self
            .send(RequestDescriptor::new(Operation::ListBuckets, Method::GET))
            .await?;
        parse_body(&response)
    }

    /// Create a bucket, optionally in a specific region and with a canned ACL.
    ///
    /// `us-east-1` (or no location) sends an empty body, as that region rejects an
    /// explicit constraint.
    pub async fn create_bucket(
        &self,
        bucket: &str,
        location: Option<&str>,
        acl: Option<CannedAcl>,
    ) -> Result<(), ClientError> {
        let mut desc = RequestDescriptor::new(Operation::CreateBucket, Method::PUT)
            .bucket(bucket)
            .acl(acl);
        if let Some(region) = location.filter(|r| !r.is_empty() && *r != "us-east-1") {
            let config = CreateBucketConfiguration {
                location_constraint: Some(region.to_owned()),
            };
            desc = desc.body(xml_body("CreateBucketConfiguration", &config)?);
        }
        self.send(desc).await?;
        debug!(bucket, ?location, "create_bucket completed");
        Ok(())
    }

    /// Check that a bucket exists and is accessible.
    pub async fn head_bucket(&self, bucket: &str) -> Result<(), ClientError> {
        self.send(RequestDescriptor::new(Operation::HeadBucket, Method::HEAD).bucket(bucket))
            .await?;
        Ok(())
    }

    /// Delete an empty bucket.
    pub async fn delete_bucket(&self, bucket: &str) -> Result<(), ClientError> {
        self.send(RequestDescriptor::new(Operation::DeleteBucket, Method::DELETE).bucket(bucket))
            .await?;
        debug!(bucket, "delete_bucket completed");
        Ok(())
    }

    /// Fetch the bucket policy document (JSON, returned verbatim).
    pub async fn get_bucket_policy(&self, bucket: &str) -> Result<String, ClientError> {
        let response = self
            .send(
                RequestDescriptor::new(Operation::GetBucketPolicy, Method::GET)
                    .bucket(bucket)
                    .flag("policy"),
            )
            .await?;
        Ok(String::from_utf8_lossy(&response.body).into_owned())
    }
}
