//! Retry integration tests.

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use http::Method;
    use objstore_client::ops::PutObjectOptions;
    use objstore_client::testing::{FaultResponse, RequestMatcher};
    use objstore_client::{ClientConfig, FileBody, TransportError};

    use crate::{
        create_test_bucket, test_config, test_env, test_env_with, test_env_with_provider,
        RotatingCredentialProvider,
    };

    fn requests_for(env: &crate::TestEnv, key: &str) -> usize {
        env.store
            .requests()
            .iter()
            .filter(|r| r.key.as_deref() == Some(key))
            .count()
    }

    #[tokio::test]
    async fn test_should_retry_server_errors_until_success() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "flaky").await;
        env.store.put_raw(&bucket, "k", &b"value"[..]);
        env.store.inject(
            RequestMatcher::any().method(Method::GET).key("k"),
            FaultResponse::status(503, "ServiceUnavailable"),
            2,
        );

        let got = env.client.get_object(&bucket, "k", None).await.expect("get after retries");
        assert_eq!(&got.body[..], b"value");
        assert_eq!(requests_for(&env, "k"), 3);
    }

    #[tokio::test]
    async fn test_should_give_up_after_max_retries() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "down").await;
        env.store.inject(
            RequestMatcher::any().key("k"),
            FaultResponse::status(503, "ServiceUnavailable"),
            100,
        );

        let err = env
            .client
            .put_object(&bucket, "k", "v", &PutObjectOptions::default())
            .await
            .expect_err("retries exhausted");
        assert_eq!(err.status(), Some(503));
        assert_eq!(requests_for(&env, "k"), 4);
    }

    #[tokio::test]
    async fn test_should_retry_throttling() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "throttle").await;
        env.store.inject(
            RequestMatcher::any().key("k"),
            FaultResponse::status(429, "SlowDown"),
            1,
        );

        env.client
            .put_object(&bucket, "k", "v", &PutObjectOptions::default())
            .await
            .expect("put after throttling");
        assert_eq!(requests_for(&env, "k"), 2);
    }

    #[tokio::test]
    async fn test_should_retry_transport_errors_of_idempotent_requests() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "reset").await;
        env.store.put_raw(&bucket, "k", &b"value"[..]);
        env.store.inject(
            RequestMatcher::any().method(Method::GET).key("k"),
            FaultResponse::Transport(TransportError::Timeout("read timed out".to_owned())),
            2,
        );

        env.client.get_object(&bucket, "k", None).await.expect("get after resets");
        assert_eq!(requests_for(&env, "k"), 3);
    }

    #[tokio::test]
    async fn test_should_resend_growing_file_after_socket_timeout() {
        let env = test_env_with(
            ClientConfig::builder()
                .max_retries(1)
                .socket_timeout_retries(2)
                .retry_base_delay_ms(1)
                .retry_max_delay_ms(5)
                .build(),
        );
        let bucket = create_test_bucket(&env.client, "grow").await;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("growing.log");
        std::fs::write(&path, vec![b'a'; 100]).expect("write file");

        let appended = Arc::new(AtomicBool::new(false));
        let hook_path = path.clone();
        let hook_flag = appended.clone();
        env.store.on_request(move |request| {
            if request.method == Method::PUT && !hook_flag.swap(true, Ordering::SeqCst) {
                let mut file = std::fs::OpenOptions::new()
                    .append(true)
                    .open(&hook_path)
                    .expect("open for append");
                file.write_all(&[b'b'; 50]).expect("append");
            }
        });
        env.store.inject(
            RequestMatcher::any().method(Method::PUT).key("growing.log"),
            FaultResponse::SocketTimeout,
            1,
        );

        env.client
            .put_object(
                &bucket,
                "growing.log",
                FileBody::whole(&path),
                &PutObjectOptions::default(),
            )
            .await
            .expect("put after socket timeout");

        let puts: Vec<_> = env
            .store
            .requests_with(&Method::PUT)
            .into_iter()
            .filter(|r| r.key.as_deref() == Some("growing.log"))
            .collect();
        assert_eq!(puts.len(), 2);
        assert_eq!(puts[0].body.len(), 100);
        assert_eq!(puts[1].body.len(), 150);
        assert_eq!(puts[1].header("content-length"), Some("150"));
        assert_eq!(env.store.get_raw(&bucket, "growing.log").map(|b| b.len()), Some(150));
    }

    #[tokio::test]
    async fn test_should_surface_socket_timeout_without_retry_budget() {
        let env = test_env_with(
            ClientConfig::builder()
                .max_retries(0)
                .socket_timeout_retries(3)
                .retry_base_delay_ms(1)
                .retry_max_delay_ms(5)
                .build(),
        );
        let bucket = create_test_bucket(&env.client, "nobudget").await;
        env.store.inject(
            RequestMatcher::any().method(Method::PUT).key("slow.txt"),
            FaultResponse::SocketTimeout,
            1,
        );

        let err = env
            .client
            .put_object(&bucket, "slow.txt", "payload", &PutObjectOptions::default())
            .await
            .expect_err("socket timeout surfaces");
        assert_eq!(err.status(), Some(400));
        assert_eq!(requests_for(&env, "slow.txt"), 1);
        assert!(env.store.get_raw(&bucket, "slow.txt").is_none());
    }

    #[tokio::test]
    async fn test_should_bound_socket_timeout_retries() {
        let env = test_env_with(
            ClientConfig::builder()
                .socket_timeout_retries(2)
                .retry_base_delay_ms(1)
                .retry_max_delay_ms(5)
                .build(),
        );
        let bucket = create_test_bucket(&env.client, "slow").await;
        env.store.inject(
            RequestMatcher::any().key("k"),
            FaultResponse::SocketTimeout,
            100,
        );

        let err = env
            .client
            .put_object(&bucket, "k", "v", &PutObjectOptions::default())
            .await
            .expect_err("socket timeouts exhausted");
        assert_eq!(err.code(), Some("RequestTimeout"));
        assert_eq!(requests_for(&env, "k"), 3);
    }

    #[tokio::test]
    async fn test_should_refresh_expired_session_token() {
        let provider = Arc::new(RotatingCredentialProvider::new());
        let env = test_env_with_provider(test_config(), provider.clone());
        env.store.expire_session_token("token-0");

        let bucket = create_test_bucket(&env.client, "token").await;
        env.client
            .put_object(&bucket, "k", "v", &PutObjectOptions::default())
            .await
            .expect("put with refreshed token");

        assert_eq!(provider.refreshes(), 1);
        let requests = env.store.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].header("x-amz-security-token"), Some("token-0"));
        assert!(
            requests[1..]
                .iter()
                .all(|r| r.header("x-amz-security-token") == Some("token-1"))
        );
    }
}
