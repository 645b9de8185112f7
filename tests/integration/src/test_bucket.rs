//! Bucket integration tests.

#[cfg(test)]
mod tests {
    use objstore_client::testing::{FaultResponse, RequestMatcher};

    use crate::{create_test_bucket, test_bucket_name, test_env};

    #[tokio::test]
    async fn test_should_create_list_and_delete_bucket() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "crud").await;

        let listed = env.client.list_buckets().await.expect("list_buckets");
        assert!(listed.buckets.iter().any(|b| b.name == bucket));

        env.client.head_bucket(&bucket).await.expect("head_bucket");
        env.client.delete_bucket(&bucket).await.expect("delete_bucket");

        let err = env.client.head_bucket(&bucket).await.expect_err("bucket is gone");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_should_send_location_constraint_outside_us_east_1() {
        let env = test_env();
        let bucket = test_bucket_name("eu");
        env.client
            .create_bucket(&bucket, Some("eu-west-1"), None)
            .await
            .expect("create_bucket");

        let request = env.store.requests().pop().expect("recorded");
        let body = String::from_utf8_lossy(&request.body).into_owned();
        assert!(body.contains("<LocationConstraint>eu-west-1</LocationConstraint>"));

        env.client
            .create_bucket(&test_bucket_name("us"), Some("us-east-1"), None)
            .await
            .expect("create_bucket");
        assert!(env.store.requests().pop().expect("recorded").body.is_empty());
    }

    #[tokio::test]
    async fn test_should_reject_duplicate_and_non_empty_buckets() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "dup").await;

        let err = env
            .client
            .create_bucket(&bucket, None, None)
            .await
            .expect_err("duplicate");
        assert_eq!(err.code(), Some("BucketAlreadyOwnedByYou"));
        assert_eq!(err.status(), Some(409));

        env.store.put_raw(&bucket, "k", &b"x"[..]);
        let err = env.client.delete_bucket(&bucket).await.expect_err("not empty");
        assert_eq!(err.code(), Some("BucketNotEmpty"));
    }

    #[tokio::test]
    async fn test_should_report_bucket_existence() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "exists").await;

        assert!(env.client.does_bucket_exist(&bucket, false).await.expect("existence check"));
        assert!(
            !env.client
                .does_bucket_exist("test-missing-bucket", false)
                .await
                .expect("existence check")
        );
    }

    #[tokio::test]
    async fn test_should_answer_forbidden_with_caller_choice() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "denied").await;
        env.store.inject(
            RequestMatcher::any().bucket(bucket.clone()),
            FaultResponse::status(403, "AccessDenied"),
            2,
        );

        assert!(env.client.does_bucket_exist(&bucket, true).await.expect("existence check"));
        assert!(!env.client.does_bucket_exist(&bucket, false).await.expect("existence check"));
        // A forbidden answer is not retried.
        assert_eq!(env.store.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_should_report_bucket_policy() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "policy").await;

        assert!(
            !env.client
                .does_bucket_policy_exist(&bucket, false)
                .await
                .expect("existence check")
        );
        let err = env.client.get_bucket_policy(&bucket).await.expect_err("no policy");
        assert_eq!(err.code(), Some("NoSuchBucketPolicy"));

        let policy = r#"{"Version":"2012-10-17","Statement":[]}"#;
        env.store.set_bucket_policy(&bucket, policy);
        assert!(
            env.client
                .does_bucket_policy_exist(&bucket, false)
                .await
                .expect("existence check")
        );
        assert_eq!(env.client.get_bucket_policy(&bucket).await.expect("policy"), policy);
    }
}
