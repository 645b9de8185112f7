//! Stream wrapper integration tests.

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;
    use std::sync::Arc;

    use http::Method;
    use objstore_client::testing::{FaultResponse, RequestMatcher};
    use objstore_client::transfer::TransferOptions;
    use objstore_fs::{StreamRegistry, StreamWrapper, WrapperOptions};

    use crate::{create_test_bucket, pattern_bytes, test_env};

    #[tokio::test]
    async fn test_should_round_trip_through_registered_scheme() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "fs").await;
        let registry = StreamRegistry::new();
        registry
            .register("s3", Arc::new(StreamWrapper::new(env.client.clone())))
            .expect("register");

        let url = format!("s3://{bucket}/reports/q1.csv");
        let (fs, parsed) = registry.resolve(&url).expect("resolve");
        assert_eq!(parsed.key(), Some("reports/q1.csv"));

        let mut file = fs.open(&url, "wb").await.expect("open");
        file.write(b"region,total\n").await.expect("write");
        file.write(b"north,42\n").await.expect("write");
        file.close().await.expect("close");

        let put = env.store.requests_with(&Method::PUT).pop().expect("put");
        assert_eq!(put.header("content-type"), Some("text/csv"));

        let dir_url = format!("s3://{bucket}/reports");
        let mut dir = fs.opendir(&dir_url).await.expect("opendir");
        assert_eq!(dir.read_all().await.expect("readdir"), ["q1.csv"]);

        let stat = fs.stat(&url).await.expect("stat");
        assert_eq!(stat.size, 22);
        assert!(fs.stat(&dir_url).await.expect("stat dir").is_dir());
    }

    #[tokio::test]
    async fn test_should_write_large_stream_as_multipart_upload() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "fsbig").await;
        let options = WrapperOptions::builder()
            .transfer(TransferOptions::from_config(env.client.config()))
            .build();
        let fs = StreamWrapper::with_options(env.client.clone(), options);
        let data = pattern_bytes(11 * 1024 * 1024);

        let url = format!("s3://{bucket}/big.bin");
        let mut file = fs.open(&url, "w").await.expect("open");
        for chunk in data.chunks(1024 * 1024) {
            file.write(chunk).await.expect("write");
        }
        file.close().await.expect("close");

        assert!(
            env.store
                .etag_raw(&bucket, "big.bin")
                .is_some_and(|e| e.ends_with("-2\""))
        );
        let mut file = fs.open(&url, "r").await.expect("reopen");
        assert_eq!(file.read_to_end().await.expect("read"), data);
    }

    #[tokio::test]
    async fn test_should_surface_failed_flush_as_io_error() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "fsfail").await;
        env.store.inject(
            RequestMatcher::any().method(Method::PUT).key("denied.txt"),
            FaultResponse::status(403, "AccessDenied"),
            1,
        );
        let fs = StreamWrapper::new(env.client.clone());

        let mut file = fs
            .open(&format!("s3://{bucket}/denied.txt"), "w")
            .await
            .expect("open");
        file.write(b"secret").await.expect("buffered write");
        let err = file.flush().await.expect_err("upload denied");
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        // The data is still buffered, so a later flush retries the upload.
        file.close().await.expect("close uploads");
        assert_eq!(
            env.store.get_raw(&bucket, "denied.txt").as_deref(),
            Some(&b"secret"[..])
        );
    }
}
