//! Directory-tree sync between a local directory and a key prefix.
//!
//! A file is skipped when the remote object has the same size and either its ETag is
//! the plain MD5 of the local content or the ETag is multipart-shaped (its MD5
//! cannot be recomputed without the original part boundaries). `force` disables
//! skipping.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use futures::{StreamExt, TryStreamExt};
use objstore_model::types::Object;
use tracing::{debug, info};

use super::TransferOptions;
use crate::checksums::{is_plain_md5_etag, md5_file_hex, unquote_etag};
use crate::client::ObjectStoreClient;
use crate::error::ClientError;

/// Options of a directory sync.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Transfer every file, even unchanged ones.
    pub force: bool,
    /// Directory that keys are made relative to; defaults to the synced directory.
    pub base_dir: Option<PathBuf>,
    /// Prefix prepended to every key (upload) or stripped from every key (download).
    pub key_prefix: String,
    /// Files transferred concurrently.
    pub concurrency: usize,
    /// Options of each single-file transfer.
    pub transfer: TransferOptions,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            force: false,
            base_dir: None,
            key_prefix: String::new(),
            concurrency: 4,
            transfer: TransferOptions::default(),
        }
    }
}

/// Keys transferred and skipped by a sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Keys that were uploaded or downloaded.
    pub transferred: Vec<String>,
    /// Keys that were already up to date.
    pub skipped: Vec<String>,
}

#[derive(Debug)]
enum SyncStep {
    Transferred(String),
    Skipped(String),
}

impl SyncReport {
    fn from_steps(steps: Vec<SyncStep>) -> Self {
        let mut report = Self::default();
        for step in steps {
            match step {
                SyncStep::Transferred(key) => report.transferred.push(key),
                SyncStep::Skipped(key) => report.skipped.push(key),
            }
        }
        report.transferred.sort();
        report.skipped.sort();
        report
    }
}

/// Whether a local file and a remote object hold the same data.
async fn is_unchanged(local: &Path, local_size: u64, remote: &Object) -> Result<bool, ClientError> {
    if local_size != remote.size {
        return Ok(false);
    }
    let Some(etag) = remote.e_tag.as_deref() else {
        return Ok(false);
    };
    if !is_plain_md5_etag(etag) {
        return Ok(true);
    }
    let local_md5 = md5_file_hex(local).await?;
    Ok(unquote_etag(etag).eq_ignore_ascii_case(&local_md5))
}

/// Every regular file under `dir`, recursively.
async fn walk_files(dir: &Path) -> Result<Vec<PathBuf>, ClientError> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Key of a local file: the prefix followed by its `/`-joined path relative to `base`.
fn key_for(base: &Path, file: &Path, prefix: &str) -> Result<String, ClientError> {
    let relative = file.strip_prefix(base).map_err(|_| {
        ClientError::InvalidArgument(format!(
            "{} is not under {}",
            file.display(),
            base.display()
        ))
    })?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(s) => segments.push(s.to_string_lossy().into_owned()),
            _ => {
                return Err(ClientError::InvalidArgument(format!(
                    "unsupported path component in {}",
                    relative.display()
                )));
            }
        }
    }
    Ok(format!("{prefix}{}", segments.join("/")))
}

/// Local path of a key below `dir`. Keys that would escape `dir` are rejected, and
/// keys naming `dir` itself (such as the prefix without a trailing slash) map to `None`.
fn local_path_for(dir: &Path, key: &str, prefix: &str) -> Result<Option<PathBuf>, ClientError> {
    let relative = key.strip_prefix(prefix).unwrap_or(key);
    let mut path = dir.to_path_buf();
    let mut segments = 0;
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        if segment == ".." || segment == "." || segment.contains('\\') {
            return Err(ClientError::InvalidArgument(format!(
                "key {key} does not map to a path inside {}",
                dir.display()
            )));
        }
        path.push(segment);
        segments += 1;
    }
    Ok((segments > 0).then_some(path))
}

impl ObjectStoreClient {
    /// Upload every file under `dir` to `bucket`.
    ///
    /// # Errors
    ///
    /// Returns the first listing, I/O or upload error.
    pub async fn upload_directory(
        &self,
        dir: &Path,
        bucket: &str,
        options: &SyncOptions,
    ) -> Result<SyncReport, ClientError> {
        let base = options.base_dir.as_deref().unwrap_or(dir);
        let prefix = options.key_prefix.as_str();
        let remote: HashMap<String, Object> = self
            .list_all_objects(bucket, Some(prefix).filter(|p| !p.is_empty()))
            .await?
            .into_iter()
            .map(|o| (o.key.clone(), o))
            .collect();

        let mut jobs = Vec::new();
        for file in walk_files(dir).await? {
            let key = key_for(base, &file, prefix)?;
            jobs.push((file, key));
        }

        let steps: Vec<SyncStep> = futures::stream::iter(jobs)
            .map(|(file, key)| {
                let remote = remote.get(&key);
                async move {
                    let size = tokio::fs::metadata(&file).await?.len();
                    if !options.force {
                        if let Some(remote) = remote {
                            if is_unchanged(&file, size, remote).await? {
                                debug!(bucket, %key, "unchanged, skipping upload");
                                return Ok(SyncStep::Skipped(key));
                            }
                        }
                    }
                    self.upload_file(bucket, &key, file, options.transfer.clone())
                        .await?;
                    Ok::<_, ClientError>(SyncStep::Transferred(key))
                }
            })
            .buffer_unordered(options.concurrency.max(1))
            .try_collect()
            .await?;

        let report = SyncReport::from_steps(steps);
        info!(
            bucket,
            dir = %dir.display(),
            transferred = report.transferred.len(),
            skipped = report.skipped.len(),
            "directory upload finished"
        );
        Ok(report)
    }

    /// Download every object under the key prefix of `options` into `dir`.
    ///
    /// Keys ending in `/` are treated as directory markers and only create the
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns the first listing, I/O or download error, or
    /// [`ClientError::InvalidArgument`] for a key that would land outside `dir`.
    pub async fn download_directory(
        &self,
        bucket: &str,
        dir: &Path,
        options: &SyncOptions,
    ) -> Result<SyncReport, ClientError> {
        let prefix = options.key_prefix.as_str();
        let objects = self
            .list_all_objects(bucket, Some(prefix).filter(|p| !p.is_empty()))
            .await?;

        let mut jobs = Vec::new();
        for object in objects {
            let Some(path) = local_path_for(dir, &object.key, prefix)? else {
                debug!(bucket, key = %object.key, "key names the target directory, skipping");
                continue;
            };
            if object.key.ends_with('/') {
                tokio::fs::create_dir_all(&path).await?;
                continue;
            }
            jobs.push((object, path));
        }

        let steps: Vec<SyncStep> = futures::stream::iter(jobs)
            .map(|(object, path)| async move {
                if let Ok(meta) = tokio::fs::metadata(&path).await {
                    if !options.force && is_unchanged(&path, meta.len(), &object).await? {
                        debug!(bucket, key = %object.key, "unchanged, skipping download");
                        return Ok(SyncStep::Skipped(object.key));
                    }
                    // Downloads resume from existing bytes, so stale content must go.
                    tokio::fs::remove_file(&path).await?;
                }
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                self.download_file(bucket, &object.key, path, options.transfer.clone())
                    .await?;
                Ok::<_, ClientError>(SyncStep::Transferred(object.key))
            })
            .buffer_unordered(options.concurrency.max(1))
            .try_collect()
            .await?;

        let report = SyncReport::from_steps(steps);
        info!(
            bucket,
            dir = %dir.display(),
            transferred = report.transferred.len(),
            skipped = report.skipped.len(),
            "directory download finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::checksums::md5_hex;

    #[test]
    fn test_should_build_keys_relative_to_base() {
        let base = Path::new("/data/site");
        assert_eq!(
            key_for(base, Path::new("/data/site/css/app.css"), "www/").expect("key"),
            "www/css/app.css"
        );
        assert!(key_for(base, Path::new("/elsewhere/x"), "").is_err());
    }

    #[test]
    fn test_should_reject_keys_escaping_directory() {
        let dir = Path::new("/tmp/out");
        assert_eq!(
            local_path_for(dir, "logs/2024/a.txt", "logs/").expect("path"),
            Some(PathBuf::from("/tmp/out/2024/a.txt"))
        );
        assert!(local_path_for(dir, "logs/../../etc/passwd", "logs/").is_err());
    }

    #[test]
    fn test_should_map_prefix_keys_to_no_path() {
        let dir = Path::new("/tmp/out");
        assert_eq!(local_path_for(dir, "logs", "logs").expect("path"), None);
        assert_eq!(local_path_for(dir, "logs/", "logs/").expect("path"), None);
        assert_eq!(
            local_path_for(dir, "logs/a.txt", "logs").expect("path"),
            Some(PathBuf::from("/tmp/out/a.txt"))
        );
    }

    #[tokio::test]
    async fn test_should_compare_by_size_and_md5() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"hello").expect("write");

        let mut remote = Object {
            key: "k".to_owned(),
            size: 5,
            e_tag: Some(format!("\"{}\"", md5_hex(b"hello"))),
            ..Object::default()
        };
        assert!(is_unchanged(file.path(), 5, &remote).await.expect("compare"));

        remote.e_tag = Some(format!("\"{}\"", md5_hex(b"world")));
        assert!(!is_unchanged(file.path(), 5, &remote).await.expect("compare"));

        remote.e_tag = Some("\"0123456789abcdef0123456789abcdef-2\"".to_owned());
        assert!(is_unchanged(file.path(), 5, &remote).await.expect("compare"));

        remote.size = 6;
        assert!(!is_unchanged(file.path(), 5, &remote).await.expect("compare"));
    }
}
