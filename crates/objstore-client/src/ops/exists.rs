//! Existence checks.
//!
//! A 2xx answer means "exists", a 404 means "does not exist" and a 403 is answered
//! with the caller's `accept_403` choice: a caller that may lack read permission on
//! an existing resource can opt to treat "forbidden" as "exists". Any other failure
//! propagates.

use http::Method;
use objstore_model::Operation;

use crate::client::ObjectStoreClient;
use crate::error::ClientError;
use crate::request::RequestDescriptor;

impl ObjectStoreClient {
    /// Whether a bucket exists.
    pub async fn does_bucket_exist(
        &self,
        bucket: &str,
        accept_403: bool,
    ) -> Result<bool, ClientError> {
        let desc = RequestDescriptor::new(Operation::HeadBucket, Method::HEAD).bucket(bucket);
        self.check_existence(desc, accept_403).await
    }

    /// Whether an object exists.
    pub async fn does_object_exist(
        &self,
        bucket: &str,
        key: &str,
        accept_403: bool,
    ) -> Result<bool, ClientError> {
        let desc = RequestDescriptor::new(Operation::HeadObject, Method::HEAD)
            .bucket(bucket)
            .key(key);
        self.check_existence(desc, accept_403).await
    }

    /// Whether a bucket has a policy attached.
    pub async fn does_bucket_policy_exist(
        &self,
        bucket: &str,
        accept_403: bool,
    ) -> Result<bool, ClientError> {
        let desc = RequestDescriptor::new(Operation::GetBucketPolicy, Method::GET)
            .bucket(bucket)
            .flag("policy");
        self.check_existence(desc, accept_403).await
    }

    async fn check_existence(
        &self,
        desc: RequestDescriptor,
        accept_403: bool,
    ) -> Result<bool, ClientError> {
        match self.send(desc).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) if e.status() == Some(403) => Ok(accept_403),
            Err(e) => Err(e),
        }
    }
}
