//! Directory sync integration tests.

#[cfg(test)]
mod tests {
    use std::path::Path;

    use http::Method;
    use objstore_client::transfer::SyncOptions;

    use crate::{create_test_bucket, test_env};

    fn write(root: &Path, relative: &str, data: &[u8]) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, data).expect("write");
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "index.html", b"<html></html>");
        write(dir.path(), "css/site.css", b"body {}");
        write(dir.path(), "img/logo/small.png", b"png-bytes");
        dir
    }

    #[tokio::test]
    async fn test_should_upload_tree_then_skip_unchanged_files() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "syncup").await;
        let dir = tree();
        let options = SyncOptions {
            key_prefix: "site/".to_owned(),
            ..SyncOptions::default()
        };

        let first = env
            .client
            .upload_directory(dir.path(), &bucket, &options)
            .await
            .expect("first sync");
        assert_eq!(
            first.transferred,
            ["site/css/site.css", "site/img/logo/small.png", "site/index.html"]
        );
        assert!(first.skipped.is_empty());
        assert_eq!(env.store.keys(&bucket).len(), 3);

        env.store.clear_requests();
        let second = env
            .client
            .upload_directory(dir.path(), &bucket, &options)
            .await
            .expect("second sync");
        assert!(second.transferred.is_empty());
        assert_eq!(second.skipped.len(), 3);
        assert!(env.store.requests_with(&Method::PUT).is_empty());
    }

    #[tokio::test]
    async fn test_should_upload_only_modified_files() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "modified").await;
        let dir = tree();
        let options = SyncOptions::default();
        env.client
            .upload_directory(dir.path(), &bucket, &options)
            .await
            .expect("first sync");

        // Same size, different content: only the checksum tells them apart.
        write(dir.path(), "css/site.css", b"BODY {}");
        write(dir.path(), "new.txt", b"fresh");

        let report = env
            .client
            .upload_directory(dir.path(), &bucket, &options)
            .await
            .expect("second sync");
        assert_eq!(report.transferred, ["css/site.css", "new.txt"]);
        assert_eq!(report.skipped, ["img/logo/small.png", "index.html"]);
        assert_eq!(
            env.store.get_raw(&bucket, "css/site.css").as_deref(),
            Some(&b"BODY {}"[..])
        );
    }

    #[tokio::test]
    async fn test_should_upload_everything_when_forced() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "force").await;
        let dir = tree();
        env.client
            .upload_directory(dir.path(), &bucket, &SyncOptions::default())
            .await
            .expect("first sync");

        let forced = SyncOptions {
            force: true,
            ..SyncOptions::default()
        };
        let report = env
            .client
            .upload_directory(dir.path(), &bucket, &forced)
            .await
            .expect("forced sync");
        assert_eq!(report.transferred.len(), 3);
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_should_key_files_relative_to_base_dir() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "base").await;
        let dir = tree();
        let options = SyncOptions {
            base_dir: Some(dir.path().to_path_buf()),
            ..SyncOptions::default()
        };

        let report = env
            .client
            .upload_directory(&dir.path().join("img"), &bucket, &options)
            .await
            .expect("sync subtree");
        assert_eq!(report.transferred, ["img/logo/small.png"]);
    }

    #[tokio::test]
    async fn test_should_download_tree_and_skip_existing_files() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "syncdown").await;
        env.store.put_raw(&bucket, "backup/a.txt", &b"alpha"[..]);
        env.store.put_raw(&bucket, "backup/nested/b.txt", &b"bravo"[..]);
        env.store.put_raw(&bucket, "backup/empty/", &b""[..]);
        env.store.put_raw(&bucket, "other/c.txt", &b"charlie"[..]);
        let dir = tempfile::tempdir().expect("tempdir");
        let options = SyncOptions {
            key_prefix: "backup/".to_owned(),
            ..SyncOptions::default()
        };

        let report = env
            .client
            .download_directory(&bucket, dir.path(), &options)
            .await
            .expect("download sync");
        assert_eq!(report.transferred, ["backup/a.txt", "backup/nested/b.txt"]);
        assert_eq!(std::fs::read(dir.path().join("a.txt")).expect("a"), b"alpha");
        assert_eq!(std::fs::read(dir.path().join("nested/b.txt")).expect("b"), b"bravo");
        assert!(dir.path().join("empty").is_dir());
        assert!(!dir.path().join("other").exists());

        // A stale local copy is replaced, an identical one is left alone.
        write(dir.path(), "a.txt", b"stale");
        let report = env
            .client
            .download_directory(&bucket, dir.path(), &options)
            .await
            .expect("second download sync");
        assert_eq!(report.transferred, ["backup/a.txt"]);
        assert_eq!(report.skipped, ["backup/nested/b.txt"]);
        assert_eq!(std::fs::read(dir.path().join("a.txt")).expect("a"), b"alpha");
    }

    #[tokio::test]
    async fn test_should_skip_key_equal_to_prefix() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "syncprefix").await;
        env.store.put_raw(&bucket, "logs", &b"marker"[..]);
        env.store.put_raw(&bucket, "logs/", &b""[..]);
        env.store.put_raw(&bucket, "logs/app.log", &b"started"[..]);
        let dir = tempfile::tempdir().expect("tempdir");
        let options = SyncOptions {
            key_prefix: "logs".to_owned(),
            ..SyncOptions::default()
        };

        let report = env
            .client
            .download_directory(&bucket, dir.path(), &options)
            .await
            .expect("download sync");
        assert_eq!(report.transferred, ["logs/app.log"]);
        assert!(dir.path().is_dir());
        assert_eq!(std::fs::read(dir.path().join("app.log")).expect("log"), b"started");
    }

    #[tokio::test]
    async fn test_should_refuse_keys_escaping_target_directory() {
        let env = test_env();
        let bucket = create_test_bucket(&env.client, "escape").await;
        env.store.put_raw(&bucket, "../outside.txt", &b"x"[..]);
        let dir = tempfile::tempdir().expect("tempdir");

        let err = env
            .client
            .download_directory(&bucket, dir.path(), &SyncOptions::default())
            .await
            .expect_err("escaping key");
        assert!(matches!(err, objstore_client::ClientError::InvalidArgument(_)));
    }
}
