//! Error mapping integration tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::Method;
    use objstore_auth::{Credentials, StaticCredentialProvider};
    use objstore_client::ops::PutObjectOptions;
    use objstore_client::testing::{FaultResponse, RequestMatcher};
    use objstore_client::transfer::TransferOptions;
    use objstore_client::ClientError;
    use objstore_model::types::CompletedPart;

    use crate::{create_test_bucket, test_config, test_env, test_env_with_provider};

    #[tokio::test]
    async fn test_should_map_missing_key_to_not_found() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "missing").await;

        let err = env
            .client
            .get_object(&bucket, "nope", None)
            .await
            .expect_err("missing key");
        assert!(err.is_not_found());
        assert_eq!(err.code(), Some("NoSuchKey"));
        assert_eq!(err.status(), Some(404));

        let err = env.client.head_object(&bucket, "nope").await.expect_err("missing key");
        assert!(err.is_not_found());
        // HEAD answers carry no body, so only the status is known.
        assert_eq!(err.code(), Some("NotFound"));
    }

    #[tokio::test]
    async fn test_should_not_retry_client_errors() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "once").await;
        env.store.clear_requests();

        env.client
            .get_object(&bucket, "nope", None)
            .await
            .expect_err("missing key");
        assert_eq!(env.store.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_should_report_unknown_upload() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "upload").await;

        let err = env
            .client
            .abort_multipart_upload(&bucket, "k", "no-such-upload")
            .await
            .expect_err("unknown upload");
        assert_eq!(err.code(), Some("NoSuchUpload"));
        assert!(err.is_not_found());

        let parts = [CompletedPart {
            part_number: 1,
            e_tag: "\"abc\"".to_owned(),
        }];
        let err = env
            .client
            .complete_multipart_upload(&bucket, "k", "no-such-upload", &parts)
            .await
            .expect_err("unknown upload");
        assert_eq!(err.code(), Some("NoSuchUpload"));
    }

    #[tokio::test]
    async fn test_should_reject_invalid_completion_without_sending() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "invalid").await;
        env.store.clear_requests();

        let err = env
            .client
            .complete_multipart_upload(&bucket, "k", "u", &[])
            .await
            .expect_err("empty part list");
        assert!(matches!(err, ClientError::InvalidArgument(_)));
        assert!(env.store.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_reject_unsigned_requests() {
        let env = test_env_with_provider(
            test_config(),
            Arc::new(StaticCredentialProvider::new(Credentials::new("", ""))),
        );

        let err = env.client.list_buckets().await.expect_err("no credentials");
        assert!(matches!(err, ClientError::Signing(_)));
        assert!(env.store.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_surface_bad_digest() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "digest").await;
        env.store.inject(
            RequestMatcher::any().method(Method::PUT).key("k"),
            FaultResponse::status(400, "BadDigest"),
            1,
        );

        let err = env
            .client
            .put_object(&bucket, "k", "data", &PutObjectOptions::default())
            .await
            .expect_err("bad digest");
        assert_eq!(err.code(), Some("BadDigest"));
        assert_eq!(err.status(), Some(400));
    }

    #[tokio::test]
    async fn test_should_surface_io_errors_of_missing_source_file() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "io").await;
        let dir = tempfile::tempdir().expect("tempdir");

        let err = env
            .client
            .upload_file(&bucket, "k", dir.path().join("absent"), TransferOptions::default())
            .await
            .expect_err("missing source");
        assert!(matches!(err, ClientError::Io(_)));
    }
}
