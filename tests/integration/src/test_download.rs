//! Resumable download integration tests.

#[cfg(test)]
mod tests {
    use http::Method;
    use objstore_client::transfer::{DownloadSession, DownloadState, TransferOptions};
    use objstore_client::ClientError;
    use objstore_client::testing::{FaultResponse, RequestMatcher};

    use crate::{create_test_bucket, pattern_bytes, test_env};

    #[tokio::test]
    async fn test_should_download_into_fresh_file_and_verify() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "dl").await;
        let data = pattern_bytes(64 * 1024);
        env.store.put_raw(&bucket, "blob.bin", data.clone());
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = dir.path().join("blob.bin");

        let mut session = DownloadSession::new(
            env.client.clone(),
            &bucket,
            "blob.bin",
            &sink,
            TransferOptions::default(),
        );
        let outcome = session.run().await.expect("download");

        assert_eq!(outcome.size, data.len() as u64);
        assert_eq!(outcome.fetched, data.len() as u64);
        assert!(outcome.verified);
        assert_eq!(std::fs::read(&sink).expect("read sink"), data);
        assert_eq!(
            session.history(),
            [
                DownloadState::Init,
                DownloadState::HeadIssued,
                DownloadState::RangeGetIssued,
                DownloadState::IntegrityChecked,
                DownloadState::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_should_resume_from_partial_file() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "resume").await;
        let data = pattern_bytes(10_000);
        env.store.put_raw(&bucket, "blob.bin", data.clone());
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = dir.path().join("blob.bin");
        std::fs::write(&sink, &data[..4000]).expect("seed partial file");

        let outcome = env
            .client
            .download_file(&bucket, "blob.bin", &sink, TransferOptions::default())
            .await
            .expect("download");

        assert_eq!(outcome.fetched, 6000);
        assert!(outcome.verified);
        assert_eq!(std::fs::read(&sink).expect("read sink"), data);
        let get = env.store.requests_with(&Method::GET).pop().expect("recorded");
        assert_eq!(get.header("range"), Some("bytes=4000-9999"));
    }

    #[tokio::test]
    async fn test_should_keep_written_windows_when_later_window_fails() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "window").await;
        let data = pattern_bytes(10_000);
        env.store.put_raw(&bucket, "blob.bin", data.clone());
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = dir.path().join("blob.bin");
        env.store.inject(
            RequestMatcher::any()
                .method(Method::GET)
                .key("blob.bin")
                .header("range", "bytes=4096-8191"),
            FaultResponse::status(403, "AccessDenied"),
            1,
        );
        let options = TransferOptions {
            download_window: 4096,
            ..TransferOptions::default()
        };

        let err = env
            .client
            .download_file(&bucket, "blob.bin", &sink, options.clone())
            .await
            .expect_err("second window denied");
        assert_eq!(err.status(), Some(403));
        assert_eq!(std::fs::read(&sink).expect("read sink"), &data[..4096]);

        let outcome = env
            .client
            .download_file(&bucket, "blob.bin", &sink, options)
            .await
            .expect("resumed download");
        assert_eq!(outcome.fetched, 10_000 - 4096);
        assert!(outcome.verified);
        assert_eq!(std::fs::read(&sink).expect("read sink"), data);
        let ranges: Vec<_> = env
            .store
            .requests_with(&Method::GET)
            .iter()
            .filter_map(|r| r.header("range").map(str::to_owned))
            .collect();
        assert_eq!(
            ranges,
            [
                "bytes=0-4095",
                "bytes=4096-8191",
                "bytes=4096-8191",
                "bytes=8192-9999",
            ]
        );
    }

    #[tokio::test]
    async fn test_should_not_refetch_complete_file() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "done").await;
        let data = pattern_bytes(2048);
        env.store.put_raw(&bucket, "blob.bin", data.clone());
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = dir.path().join("blob.bin");
        std::fs::write(&sink, &data).expect("seed complete file");

        let mut session = DownloadSession::new(
            env.client.clone(),
            &bucket,
            "blob.bin",
            &sink,
            TransferOptions::default(),
        );
        let outcome = session.run().await.expect("download");

        assert_eq!(outcome.fetched, 0);
        assert_eq!(session.state(), DownloadState::AlreadyComplete);
        assert!(env.store.requests_with(&Method::GET).is_empty());
    }

    #[tokio::test]
    async fn test_should_report_integrity_failure_and_keep_data() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "corrupt").await;
        let data = pattern_bytes(4096);
        env.store.put_raw(&bucket, "blob.bin", data.clone());
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = dir.path().join("blob.bin");
        // A wrong prefix: the range GET completes the length but not the content.
        std::fs::write(&sink, vec![0u8; 1000]).expect("seed corrupt prefix");

        let err = env
            .client
            .download_file(&bucket, "blob.bin", &sink, TransferOptions::default())
            .await
            .expect_err("checksum mismatch");

        let ClientError::Integrity { key, expected, actual } = err else {
            panic!("expected an integrity error");
        };
        assert_eq!(key, "blob.bin");
        assert_ne!(expected, actual);
        assert_eq!(std::fs::metadata(&sink).expect("sink kept").len(), 4096);
    }

    #[tokio::test]
    async fn test_should_skip_verification_for_multipart_objects() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "mpdl").await;
        let data = pattern_bytes(11 * 1024 * 1024);
        env.client
            .upload_bytes(&bucket, "big.bin", data.clone().into(), TransferOptions::default())
            .await
            .expect("multipart upload");
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = dir.path().join("big.bin");

        let outcome = env
            .client
            .download_file(&bucket, "big.bin", &sink, TransferOptions::default())
            .await
            .expect("download");

        assert!(!outcome.verified);
        assert!(outcome.e_tag.is_some_and(|e| e.ends_with("-2\"")));
        assert_eq!(std::fs::read(&sink).expect("read sink"), data);
    }

    #[tokio::test]
    async fn test_should_fail_for_missing_object() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "nokey").await;
        let dir = tempfile::tempdir().expect("tempdir");

        let err = env
            .client
            .download_file(&bucket, "nope", dir.path().join("nope"), TransferOptions::default())
            .await
            .expect_err("missing");
        assert!(err.is_not_found());
        assert!(!dir.path().join("nope").exists());
    }
}
