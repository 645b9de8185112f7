//! Object integration tests.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::Method;
    use objstore_client::checksums::{content_md5, md5_hex};
    use objstore_client::ops::PutObjectOptions;
    use objstore_client::testing::{FaultResponse, RequestMatcher};
    use objstore_model::CannedAcl;

    use crate::{create_test_bucket, test_env};

    #[tokio::test]
    async fn test_should_put_get_head_and_delete_object() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "obj").await;

        let mut options = PutObjectOptions {
            content_type: Some("text/plain".to_owned()),
            acl: Some(CannedAcl::PublicRead),
            ..PutObjectOptions::default()
        };
        options.metadata.insert("owner".to_owned(), "alice".to_owned());
        let etag = env
            .client
            .put_object(&bucket, "docs/readme.txt", "hello world", &options)
            .await
            .expect("put_object");
        assert_eq!(etag, Some(format!("\"{}\"", md5_hex(b"hello world"))));

        let put = env.store.requests_with(&Method::PUT).pop().expect("recorded");
        assert_eq!(put.header("x-amz-acl"), Some("public-read"));
        assert_eq!(put.header("x-amz-meta-owner"), Some("alice"));

        let got = env
            .client
            .get_object(&bucket, "docs/readme.txt", None)
            .await
            .expect("get_object");
        assert_eq!(got.body, Bytes::from_static(b"hello world"));
        assert_eq!(got.metadata.content_type.as_deref(), Some("text/plain"));
        assert_eq!(got.metadata.metadata.get("owner").map(String::as_str), Some("alice"));

        let head = env
            .client
            .head_object(&bucket, "docs/readme.txt")
            .await
            .expect("head_object");
        assert_eq!(head.content_length, 11);
        assert!(head.last_modified.is_some());

        env.client
            .delete_object(&bucket, "docs/readme.txt")
            .await
            .expect("delete_object");
        assert!(
            !env.client
                .does_object_exist(&bucket, "docs/readme.txt", false)
                .await
                .expect("existence check")
        );
        // Deleting again still succeeds.
        env.client
            .delete_object(&bucket, "docs/readme.txt")
            .await
            .expect("delete_object");
    }

    #[tokio::test]
    async fn test_should_answer_object_existence_by_status() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "objexists").await;
        env.store.put_raw(&bucket, "present.txt", &b"here"[..]);
        env.store.inject(
            RequestMatcher::any().method(Method::HEAD).key("present.txt"),
            FaultResponse::status(403, "AccessDenied"),
            2,
        );

        assert!(
            env.client
                .does_object_exist(&bucket, "present.txt", true)
                .await
                .expect("existence check")
        );
        assert!(
            !env.client
                .does_object_exist(&bucket, "present.txt", false)
                .await
                .expect("existence check")
        );
        // A forbidden answer is not retried.
        assert_eq!(env.store.requests_with(&Method::HEAD).len(), 2);

        for accept_403 in [true, false] {
            assert!(
                !env.client
                    .does_object_exist(&bucket, "absent.txt", accept_403)
                    .await
                    .expect("existence check")
            );
        }
        assert!(
            env.client
                .does_object_exist(&bucket, "present.txt", false)
                .await
                .expect("existence check")
        );
    }

    #[tokio::test]
    async fn test_should_fetch_byte_ranges() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "range").await;
        env.store.put_raw(&bucket, "digits", &b"0123456789"[..]);

        let middle = env
            .client
            .get_object(&bucket, "digits", Some((2, Some(5))))
            .await
            .expect("ranged get");
        assert_eq!(middle.body, Bytes::from_static(b"2345"));
        assert_eq!(middle.metadata.content_length, 4);

        let tail = env
            .client
            .get_object(&bucket, "digits", Some((7, None)))
            .await
            .expect("ranged get");
        assert_eq!(tail.body, Bytes::from_static(b"789"));

        let err = env
            .client
            .get_object(&bucket, "digits", Some((10, None)))
            .await
            .expect_err("unsatisfiable");
        assert_eq!(err.code(), Some("InvalidRange"));
        assert_eq!(err.status(), Some(416));
    }

    #[tokio::test]
    async fn test_should_encode_keys_with_special_characters() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "keys").await;
        let key = "photos/2024 summer/a+b=c&d.jpg";

        env.client
            .put_object(&bucket, key, "img", &PutObjectOptions::default())
            .await
            .expect("put_object");
        let put = env.store.requests_with(&Method::PUT).pop().expect("recorded");
        assert!(put.url.ends_with("/photos/2024%20summer/a%2Bb%3Dc%26d.jpg"));
        assert_eq!(env.store.keys(&bucket), vec![key.to_owned()]);
    }

    #[tokio::test]
    async fn test_should_copy_object_server_side() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "copy").await;
        env.store.put_raw(&bucket, "src dir/original.bin", &b"payload"[..]);

        let result = env
            .client
            .copy_object(&bucket, "src dir/original.bin", &bucket, "dst/copy.bin", None)
            .await
            .expect("copy_object");
        assert_eq!(result.e_tag, Some(format!("\"{}\"", md5_hex(b"payload"))));
        assert_eq!(
            env.store.get_raw(&bucket, "dst/copy.bin"),
            Some(Bytes::from_static(b"payload"))
        );

        let copy = env.store.requests_with(&Method::PUT).pop().expect("recorded");
        assert_eq!(
            copy.header("x-amz-copy-source").map(str::to_owned),
            Some(format!("/{bucket}/src%20dir/original.bin"))
        );
    }

    #[tokio::test]
    async fn test_should_send_content_md5_when_asked() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "md5").await;
        let options = PutObjectOptions {
            content_md5: true,
            ..PutObjectOptions::default()
        };
        env.client
            .put_object(&bucket, "k", "checked", &options)
            .await
            .expect("put_object");

        let put = env.store.requests_with(&Method::PUT).pop().expect("recorded");
        assert_eq!(
            put.header("content-md5").map(str::to_owned),
            Some(content_md5(b"checked"))
        );
    }

    #[tokio::test]
    async fn test_should_batch_delete_in_chunks_of_one_thousand() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "batch").await;
        let keys: Vec<String> = (0..1500).map(|i| format!("logs/{i:05}.log")).collect();
        for key in &keys {
            env.store.put_raw(&bucket, key, &b"."[..]);
        }

        let result = env.client.delete_objects(&bucket, &keys).await.expect("delete_objects");
        assert_eq!(result.deleted.len(), 1500);
        assert!(result.errors.is_empty());
        assert!(env.store.keys(&bucket).is_empty());

        let posts = env.store.requests_with(&Method::POST);
        assert_eq!(posts.len(), 2);
        assert!(posts.iter().all(|r| r.header("content-md5").is_some()));
    }
}
