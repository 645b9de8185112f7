//! Multipart upload integration tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use chrono::{Duration as ChronoDuration, Utc};
    use http::Method;
    use objstore_client::testing::{FaultResponse, RequestMatcher};
    use objstore_client::transfer::upload::UploadSource;
    use objstore_client::transfer::{
        AbortHandle, PartPlan, TransferObserver, TransferOptions, UploadSession, UploadState,
    };
    use objstore_client::{ClientError, TransportError};

    use crate::{create_test_bucket, pattern_bytes, test_env, TestEnv};

    const MIB: usize = 1024 * 1024;

    #[derive(Debug, Default)]
    struct CountingObserver {
        parts: AtomicUsize,
        cancel_at: Option<(u32, AbortHandle)>,
    }

    impl TransferObserver for CountingObserver {
        fn before_part(&self, _key: &str, part: &PartPlan) {
            self.parts.fetch_add(1, Ordering::SeqCst);
            if let Some((number, handle)) = &self.cancel_at {
                if part.number == *number {
                    handle.abort();
                }
            }
        }
    }

    fn session(
        env: &TestEnv,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        options: TransferOptions,
    ) -> UploadSession {
        UploadSession::new(
            env.client.clone(),
            bucket,
            key,
            UploadSource::Bytes(Bytes::from(data)),
            options,
        )
    }

    fn complete_requests(env: &TestEnv) -> usize {
        env.store
            .requests_with(&Method::POST)
            .iter()
            .filter(|r| r.query.contains_key("uploadId"))
            .count()
    }

    #[tokio::test]
    async fn test_should_upload_large_object_in_parts() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "mpu").await;
        let data = pattern_bytes(50 * MIB);
        let observer = Arc::new(CountingObserver::default());
        let options = TransferOptions {
            observer: Some(observer.clone()),
            ..TransferOptions::default()
        };

        let mut upload = session(&env, &bucket, "big.bin", data.clone(), options);
        let outcome = upload.run().await.expect("upload");

        assert_eq!(outcome.parts, 10);
        assert_eq!(outcome.size, (50 * MIB) as u64);
        assert!(outcome.upload_id.is_some());
        assert!(outcome.e_tag.is_some_and(|e| e.ends_with("-10\"")));
        assert_eq!(observer.parts.load(Ordering::SeqCst), 10);
        assert_eq!(
            upload.history(),
            [
                UploadState::Init,
                UploadState::MultipartInitiated,
                UploadState::PartsUploading,
                UploadState::Completing,
                UploadState::Done,
            ]
        );
        assert_eq!(env.store.get_raw(&bucket, "big.bin"), Some(Bytes::from(data)));
        assert!(env.store.list_uploads(&bucket).is_empty());
    }

    #[tokio::test]
    async fn test_should_use_single_put_below_part_size() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "small").await;

        let mut upload = session(
            &env,
            &bucket,
            "small.bin",
            pattern_bytes(1024),
            TransferOptions::default(),
        );
        let outcome = upload.run().await.expect("upload");

        assert_eq!(outcome.parts, 1);
        assert_eq!(outcome.upload_id, None);
        assert_eq!(
            upload.history(),
            [UploadState::Init, UploadState::SimplePut, UploadState::Done]
        );
        assert!(env.store.requests_with(&Method::POST).is_empty());
    }

    #[tokio::test]
    async fn test_should_read_parts_from_file_ranges() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "file").await;
        let data = pattern_bytes(12 * MIB + 3);
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("upload.bin");
        std::fs::write(&path, &data).expect("write source");

        let outcome = env
            .client
            .upload_file(&bucket, "from-file.bin", &path, TransferOptions::default())
            .await
            .expect("upload");

        assert_eq!(outcome.parts, 2);
        let mut sizes: Vec<(String, usize)> = env
            .store
            .requests_with(&Method::PUT)
            .into_iter()
            .filter_map(|r| Some((r.query.get("partNumber")?.clone(), r.body.len())))
            .collect();
        sizes.sort();
        assert_eq!(
            sizes,
            [("1".to_owned(), 5 * MIB), ("2".to_owned(), 7 * MIB + 3)]
        );
        assert_eq!(env.store.get_raw(&bucket, "from-file.bin"), Some(Bytes::from(data)));
    }

    fn requests_with_upload_id(env: &TestEnv, method: &Method) -> usize {
        env.store
            .requests_with(method)
            .iter()
            .filter(|r| r.query.contains_key("uploadId"))
            .count()
    }

    #[tokio::test]
    async fn test_should_abort_upload_when_any_part_fails() {
        // 20 MiB in 5 MiB parts: the first, middle and last parts all fail in turn.
        for failing in 1..=4u32 {
            let env = test_env();
            let bucket = create_test_bucket(&env.client, "fail").await;
            // Every attempt of the part fails, retries included.
            env.store.inject(
                RequestMatcher::any()
                    .method(Method::PUT)
                    .query("partNumber", failing.to_string()),
                FaultResponse::status(500, "InternalError"),
                10,
            );

            let mut upload = session(
                &env,
                &bucket,
                "doomed.bin",
                pattern_bytes(20 * MIB),
                TransferOptions::default(),
            );
            let err = upload.run().await.expect_err("part fails");

            let ClientError::UploadFailed {
                part_number,
                aborted,
                source,
                ..
            } = err
            else {
                panic!("expected an upload failure for part {failing}");
            };
            assert_eq!(part_number, Some(failing));
            assert!(aborted, "part {failing}");
            assert_eq!(source.status(), Some(500));
            assert_eq!(upload.state(), UploadState::Aborted, "part {failing}");
            assert!(upload.history().contains(&UploadState::Aborting));
            assert_eq!(requests_with_upload_id(&env, &Method::DELETE), 1, "part {failing}");
            assert_eq!(requests_with_upload_id(&env, &Method::POST), 0, "part {failing}");
            assert!(env.store.list_uploads(&bucket).is_empty());
            assert!(env.store.keys(&bucket).is_empty());
        }
    }

    #[tokio::test]
    async fn test_should_leave_partial_upload_when_asked() {
        for failing in 1..=2u32 {
            let env = test_env();
            let bucket = create_test_bucket(&env.client, "partial").await;
            env.store.inject(
                RequestMatcher::any()
                    .method(Method::PUT)
                    .query("partNumber", failing.to_string()),
                FaultResponse::status(500, "InternalError"),
                10,
            );
            let options = TransferOptions {
                leave_partial_on_failure: true,
                ..TransferOptions::default()
            };

            let mut upload = session(&env, &bucket, "kept.bin", pattern_bytes(10 * MIB), options);
            let err = upload.run().await.expect_err("part fails");

            let ClientError::UploadFailed { upload_id, aborted, .. } = err else {
                panic!("expected an upload failure for part {failing}");
            };
            assert!(!aborted);
            assert_eq!(upload.state(), UploadState::Failed, "part {failing}");
            assert_eq!(env.store.list_uploads(&bucket), vec![upload_id.clone()]);
            assert!(env.store.requests_with(&Method::DELETE).is_empty());
            assert_eq!(requests_with_upload_id(&env, &Method::POST), 0, "part {failing}");

            let parts = env
                .client
                .list_parts(&bucket, "kept.bin", &upload_id)
                .await
                .expect("list_parts");
            assert!(parts.parts.iter().all(|p| p.part_number != failing));
        }
    }

    #[tokio::test]
    async fn test_should_abort_on_cancellation() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "cancel").await;
        let handle = AbortHandle::new();
        let observer = Arc::new(CountingObserver {
            parts: AtomicUsize::new(0),
            cancel_at: Some((2, handle.clone())),
        });
        let options = TransferOptions {
            concurrency: 1,
            observer: Some(observer.clone()),
            abort: Some(handle),
            ..TransferOptions::default()
        };

        let mut upload = session(&env, &bucket, "cancelled.bin", pattern_bytes(20 * MIB), options);
        let err = upload.run().await.expect_err("cancelled");

        let ClientError::UploadFailed { aborted, source, .. } = err else {
            panic!("expected an upload failure");
        };
        assert!(aborted);
        assert!(matches!(*source, ClientError::Cancelled));
        assert!(observer.parts.load(Ordering::SeqCst) < 4);
        assert_eq!(upload.state(), UploadState::Aborted);
        assert!(env.store.list_uploads(&bucket).is_empty());
        assert!(env.store.get_raw(&bucket, "cancelled.bin").is_none());
    }

    #[tokio::test]
    async fn test_should_confirm_completion_after_lost_response() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "lost").await;
        env.store.inject(
            RequestMatcher::any().method(Method::POST).flag("uploadId"),
            FaultResponse::TransportAfterApply(TransportError::Other(
                "connection reset".to_owned(),
            )),
            1,
        );
        let data = pattern_bytes(10 * MIB);

        let outcome = env
            .client
            .upload_bytes(
                &bucket,
                "lost.bin",
                Bytes::from(data.clone()),
                TransferOptions::default(),
            )
            .await
            .expect("completion confirmed");

        assert_eq!(complete_requests(&env), 1);
        assert_eq!(outcome.e_tag, env.store.etag_raw(&bucket, "lost.bin"));
        assert_eq!(env.store.get_raw(&bucket, "lost.bin"), Some(Bytes::from(data)));
        assert_eq!(env.store.requests_with(&Method::HEAD).len(), 1);
    }

    #[tokio::test]
    async fn test_should_reissue_completion_while_upload_is_pending() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "retry").await;
        env.store.inject(
            RequestMatcher::any().method(Method::POST).flag("uploadId"),
            FaultResponse::Transport(TransportError::Connect("refused".to_owned())),
            1,
        );

        env.client
            .upload_bytes(
                &bucket,
                "again.bin",
                Bytes::from(pattern_bytes(10 * MIB)),
                TransferOptions::default(),
            )
            .await
            .expect("completion re-issued");

        assert_eq!(complete_requests(&env), 2);
        assert!(env.store.list_uploads(&bucket).is_empty());
        assert!(env.store.etag_raw(&bucket, "again.bin").is_some());
    }

    #[tokio::test]
    async fn test_should_abort_stale_uploads() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "stale").await;
        for key in ["tmp/a", "tmp/b", "keep/c"] {
            env.client
                .create_multipart_upload(&bucket, key, None, None)
                .await
                .expect("create upload");
        }

        let none = env
            .client
            .abort_multipart_uploads_before(&bucket, None, Utc::now() - ChronoDuration::hours(1))
            .await
            .expect("abort");
        assert_eq!(none, 0);

        let aborted = env
            .client
            .abort_multipart_uploads_before(
                &bucket,
                Some("tmp/"),
                Utc::now() + ChronoDuration::minutes(1),
            )
            .await
            .expect("abort");
        assert_eq!(aborted, 2);
        let remaining = env
            .client
            .list_multipart_uploads(&bucket, None)
            .await
            .expect("list uploads");
        assert_eq!(remaining.uploads.len(), 1);
        assert_eq!(remaining.uploads[0].key, "keep/c");
    }

    #[tokio::test]
    async fn test_should_list_uploaded_parts() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "parts").await;
        let upload_id = env
            .client
            .create_multipart_upload(&bucket, "k", Some("application/octet-stream"), None)
            .await
            .expect("create upload");
        for n in 1..=3u32 {
            env.client
                .upload_part(&bucket, "k", &upload_id, n, Bytes::from(vec![b'x'; 16]))
                .await
                .expect("upload_part");
        }

        let parts = env
            .client
            .list_parts(&bucket, "k", &upload_id)
            .await
            .expect("list_parts");
        let numbers: Vec<u32> = parts.parts.iter().map(|p| p.part_number).collect();
        assert_eq!(numbers, [1, 2, 3]);
        assert!(parts.parts.iter().all(|p| p.size == 16 && p.e_tag.is_some()));
    }
}
