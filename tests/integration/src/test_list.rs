//! Listing integration tests.

#[cfg(test)]
mod tests {
    use http::Method;
    use objstore_client::ops::ListObjectsRequest;
    use objstore_client::ListEntry;

    use crate::{create_test_bucket, test_env, TestEnv};

    async fn seeded(prefix: &str) -> (TestEnv, String) {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, prefix).await;
        for key in [
            "a.txt",
            "docs/guide.md",
            "docs/intro.md",
            "docs/img/logo.png",
            "logs/2024-01-01.log",
            "logs/2024-01-02.log",
            "z.txt",
        ] {
            env.store.put_raw(&bucket, key, &b"data"[..]);
        }
        (env, bucket)
    }

    fn keys(entries: &[ListEntry]) -> Vec<&str> {
        entries.iter().map(ListEntry::key).collect()
    }

    #[tokio::test]
    async fn test_should_group_common_prefixes_by_delimiter() {
        let (env, bucket) = seeded("delim").await;

        let page = env
            .client
            .list_objects_v2(&ListObjectsRequest::new(&bucket).with_delimiter("/"))
            .await
            .expect("list");
        let objects: Vec<&str> = page.contents.iter().map(|o| o.key.as_str()).collect();
        let prefixes: Vec<&str> = page.common_prefixes.iter().map(|p| p.prefix.as_str()).collect();
        assert_eq!(objects, ["a.txt", "z.txt"]);
        assert_eq!(prefixes, ["docs/", "logs/"]);
        assert!(!page.is_truncated);

        let nested = env
            .client
            .list_objects_v2(
                &ListObjectsRequest::new(&bucket)
                    .with_prefix("docs/")
                    .with_delimiter("/"),
            )
            .await
            .expect("list");
        assert_eq!(nested.contents.len(), 2);
        assert_eq!(nested.common_prefixes[0].prefix, "docs/img/");
    }

    #[tokio::test]
    async fn test_should_page_through_listing_with_cursor() {
        let (env, bucket) = seeded("pages").await;
        let request = ListObjectsRequest {
            max_keys: Some(2),
            ..ListObjectsRequest::new(&bucket)
        };

        let mut cursor = env.client.cursor(request);
        let entries = cursor.collect_all().await.expect("listing");
        assert_eq!(
            keys(&entries),
            [
                "a.txt",
                "docs/guide.md",
                "docs/img/logo.png",
                "docs/intro.md",
                "logs/2024-01-01.log",
                "logs/2024-01-02.log",
                "z.txt",
            ]
        );
        assert_eq!(env.store.requests_with(&Method::GET).len(), 4);
        assert!(cursor.next().await.expect("end").is_none());
    }

    #[tokio::test]
    async fn test_should_merge_prefixes_and_objects_across_pages() {
        let (env, bucket) = seeded("merge").await;
        let request = ListObjectsRequest {
            max_keys: Some(3),
            ..ListObjectsRequest::new(&bucket).with_delimiter("/")
        };

        let entries = env.client.cursor(request).collect_all().await.expect("listing");
        assert_eq!(keys(&entries), ["a.txt", "docs/", "logs/", "z.txt"]);
        assert!(entries[1].is_prefix());
        assert!(!entries[3].is_prefix());
    }

    #[tokio::test]
    async fn test_should_rewind_to_first_page() {
        let (env, bucket) = seeded("rewind").await;
        let request = ListObjectsRequest {
            max_keys: Some(2),
            ..ListObjectsRequest::new(&bucket)
        };
        let mut cursor = env.client.cursor(request);

        let first = cursor.next().await.expect("page").expect("entry");
        cursor.next().await.expect("page");
        cursor.next().await.expect("page");
        cursor.rewind();
        let again = cursor.next().await.expect("page").expect("entry");

        assert_eq!(first.key(), "a.txt");
        assert_eq!(again, first);
        assert!(cursor.request().continuation_token.is_some());
    }

    #[tokio::test]
    async fn test_should_filter_cursor_entries() {
        let (env, bucket) = seeded("filter").await;

        let entries = env
            .client
            .cursor(ListObjectsRequest::new(&bucket))
            .with_filter(|e| e.key().ends_with(".md"))
            .collect_all()
            .await
            .expect("listing");
        assert_eq!(keys(&entries), ["docs/guide.md", "docs/intro.md"]);
    }

    #[tokio::test]
    async fn test_should_list_all_objects_under_prefix() {
        let (env, bucket) = seeded("all").await;

        let objects = env
            .client
            .list_all_objects(&bucket, Some("logs/"))
            .await
            .expect("list_all_objects");
        assert_eq!(objects.len(), 2);
        assert!(objects.iter().all(|o| o.size == 4 && o.e_tag.is_some()));
    }

    #[tokio::test]
    async fn test_should_delete_matching_objects() {
        let (env, bucket) = seeded("purge").await;

        let deleted = env
            .client
            .delete_matching(&bucket, Some("logs/"), |o| o.key.contains("01-01"))
            .await
            .expect("delete_matching");
        assert_eq!(deleted, 1);
        assert!(!env.store.keys(&bucket).contains(&"logs/2024-01-01.log".to_owned()));

        let none = env
            .client
            .delete_matching(&bucket, Some("tmp/"), |_| true)
            .await
            .expect("delete_matching");
        assert_eq!(none, 0);
        assert_eq!(env.store.requests_with(&Method::POST).len(), 1);
    }
}
