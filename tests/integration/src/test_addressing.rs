//! Addressing and signing integration tests.

#[cfg(test)]
mod tests {
    use objstore_client::config::{AddressingStyle, SignatureVersion};
    use objstore_client::ops::PutObjectOptions;
    use objstore_client::testing::{FaultResponse, RequestMatcher};
    use objstore_client::ClientConfig;

    use crate::{create_test_bucket, test_env, test_env_with};

    #[tokio::test]
    async fn test_should_address_dns_compatible_buckets_virtually() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "vhost").await;

        env.client
            .put_object(&bucket, "a/b.txt", "x", &PutObjectOptions::default())
            .await
            .expect("put_object");
        let request = env.store.requests().pop().expect("recorded");
        assert_eq!(request.host, format!("{bucket}.s3.amazonaws.com"));
        assert_eq!(request.url, format!("https://{bucket}.s3.amazonaws.com/a/b.txt"));
    }

    #[tokio::test]
    async fn test_should_fall_back_to_path_style_for_dotted_names() {
        let env = test_env();
        env.client
            .create_bucket("my.bucket", None, None)
            .await
            .expect("create_bucket");
        env.client
            .put_object("my.bucket", "k", "x", &PutObjectOptions::default())
            .await
            .expect("put_object");

        let request = env.store.requests().pop().expect("recorded");
        assert_eq!(request.host, "s3.amazonaws.com");
        assert_eq!(request.url, "https://s3.amazonaws.com/my.bucket/k");
        assert_eq!(env.store.keys("my.bucket"), vec!["k".to_owned()]);
    }

    #[tokio::test]
    async fn test_should_honor_path_style_configuration() {
        let env = test_env_with(
            ClientConfig::builder()
                .addressing_style(AddressingStyle::Path)
                .build(),
        );
        let bucket = create_test_bucket(&env.client, "path").await;

        let request = env.store.requests().pop().expect("recorded");
        assert_eq!(request.url, format!("https://s3.amazonaws.com/{bucket}"));
        assert_eq!(request.bucket.as_deref(), Some(bucket.as_str()));
    }

    #[tokio::test]
    async fn test_should_sign_with_legacy_scheme_when_configured() {
        let env = test_env_with(
            ClientConfig::builder()
                .signature_version(SignatureVersion::V2)
                .build(),
        );
        let bucket = create_test_bucket(&env.client, "v2").await;
        env.client
            .put_object(&bucket, "k", "x", &PutObjectOptions::default())
            .await
            .expect("put_object");

        let request = env.store.requests().pop().expect("recorded");
        let auth = request.header("authorization").expect("signed");
        assert!(auth.starts_with("AWS AKIDEXAMPLE:"));
        assert!(request.header("date").is_some());
    }

    #[tokio::test]
    async fn test_should_sign_with_region_scope_by_default() {
        let env = test_env();
        create_test_bucket(&env.client, "v4").await;

        let request = env.store.requests().pop().expect("recorded");
        let auth = request.header("authorization").expect("signed");
        assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
        assert!(auth.contains("/us-east-1/s3/aws4_request"));
        assert!(request.header("x-amz-content-sha256").is_some());
    }

    #[tokio::test]
    async fn test_should_follow_temporary_redirect_to_regional_host() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "moved").await;
        let regional = format!("{bucket}.s3-eu-west-1.amazonaws.com");
        env.store.inject(
            RequestMatcher::any().bucket(bucket.clone()).key("k"),
            FaultResponse::Redirect {
                host: regional.clone(),
                region: Some("eu-west-1".to_owned()),
            },
            1,
        );

        env.client
            .put_object(&bucket, "k", "moved", &PutObjectOptions::default())
            .await
            .expect("put_object after redirect");

        let requests = env.store.requests();
        let [.., redirected, followed] = requests.as_slice() else {
            panic!("expected the redirected and the followed request");
        };
        assert_eq!(redirected.host, format!("{bucket}.s3.amazonaws.com"));
        assert_eq!(followed.host, regional);
        let auth = followed.header("authorization").expect("signed");
        assert!(auth.contains("/eu-west-1/s3/aws4_request"));
        assert_eq!(
            env.store.get_raw(&bucket, "k").as_deref(),
            Some(&b"moved"[..])
        );
    }
}
