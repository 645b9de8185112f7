//! Filesystem operations over buckets and keys.

use std::io;
use std::sync::Arc;

use objstore_client::ObjectStoreClient;
use objstore_client::ops::{ListObjectsRequest, PutObjectOptions};
use objstore_client::transfer::TransferOptions;
use objstore_model::CannedAcl;
use tracing::{debug, info};
use typed_builder::TypedBuilder;

use crate::dir::ObjectDir;
use crate::error::{FsError, report};
use crate::file::ObjectFile;
use crate::mode::OpenMode;
use crate::stat::{FileStat, StatCache};
use crate::url::ObjectUrl;

/// Size of each ranged GET issued by read streams.
pub const DEFAULT_READ_WINDOW: u64 = 1024 * 1024;

/// Options of a [`StreamWrapper`], also accepted per call by
/// [`StreamWrapper::open_with`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct WrapperOptions {
    /// Retain consumed bytes of read streams so they can seek backwards freely.
    #[builder(default = false)]
    pub seekable: bool,

    /// Separator between directory levels in keys.
    #[builder(default = String::from("/"))]
    pub delimiter: String,

    /// Size of each ranged GET issued by read streams.
    #[builder(default = DEFAULT_READ_WINDOW)]
    pub read_window: u64,

    /// Canned ACL of written objects and created buckets.
    #[builder(default)]
    pub acl: Option<CannedAcl>,

    /// Content type of written objects; guessed from the key extension when unset.
    #[builder(default)]
    pub content_type: Option<String>,

    /// Options of the uploads and downloads behind write streams.
    #[builder(default)]
    pub transfer: TransferOptions,
}

impl Default for WrapperOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Exposes buckets as directories and objects as files.
///
/// Keys are split into directory levels by the configured delimiter. A directory
/// exists when a `key/` marker object exists or any key starts with its prefix.
/// Every call returns an [`io::Error`] whose kind follows the underlying failure and
/// logs a warning when it fails.
#[derive(Debug)]
pub struct StreamWrapper {
    client: ObjectStoreClient,
    options: WrapperOptions,
    cache: Arc<StatCache>,
}

impl StreamWrapper {
    /// Create a wrapper with default options.
    #[must_use]
    pub fn new(client: ObjectStoreClient) -> Self {
        Self::with_options(client, WrapperOptions::default())
    }

    /// Create a wrapper with explicit options.
    #[must_use]
    pub fn with_options(client: ObjectStoreClient, options: WrapperOptions) -> Self {
        Self {
            client,
            options,
            cache: Arc::new(StatCache::default()),
        }
    }

    /// The underlying client.
    #[must_use]
    pub fn client(&self) -> &ObjectStoreClient {
        &self.client
    }

    /// The wrapper's options.
    #[must_use]
    pub fn options(&self) -> &WrapperOptions {
        &self.options
    }

    /// The next-stat cache shared with directory handles.
    #[must_use]
    pub fn stat_cache(&self) -> &StatCache {
        &self.cache
    }

    /// Open an object with the wrapper's options.
    ///
    /// `mode` is an `fopen`-style string: `r`, `w`, `a` or `x`.
    pub async fn open(&self, url: &str, mode: &str) -> io::Result<ObjectFile> {
        self.open_with(url, mode, &self.options).await
    }

    /// Open an object with per-call options.
    pub async fn open_with(
        &self,
        url: &str,
        mode: &str,
        options: &WrapperOptions,
    ) -> io::Result<ObjectFile> {
        let result: Result<_, FsError> = async {
            let parsed = ObjectUrl::parse(url)?;
            let mode: OpenMode = mode.parse()?;
            ObjectFile::open(self.client.clone(), parsed, mode, options, self.cache.clone()).await
        }
        .await;
        result.map_err(|err| report("open", url, err))
    }

    /// Stat a key, pseudo-directory, bucket or the root.
    pub async fn stat(&self, url: &str) -> io::Result<FileStat> {
        let result: Result<_, FsError> = async {
            let parsed = ObjectUrl::parse(url)?;
            if let Some(stat) = self.cache.take(&parsed.to_string()) {
                debug!(url, "stat served from cache");
                return Ok(stat);
            }
            self.stat_uncached(&parsed).await
        }
        .await;
        result.map_err(|err| report("stat", url, err))
    }

    async fn stat_uncached(&self, url: &ObjectUrl) -> Result<FileStat, FsError> {
        let Some(bucket) = url.bucket() else {
            return Ok(FileStat::directory());
        };
        let Some(key) = url.key() else {
            self.client.head_bucket(bucket).await?;
            return Ok(FileStat::directory());
        };
        match self.client.head_object(bucket, key).await {
            Ok(meta) => return Ok(FileStat::file(meta.content_length, meta.last_modified)),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }
        if self.has_children(bucket, &url.dir_prefix(&self.options.delimiter)).await? {
            return Ok(FileStat::directory());
        }
        Err(FsError::NotFound(url.to_string()))
    }

    /// Whether any key, the marker included, starts with `prefix`.
    async fn has_children(&self, bucket: &str, prefix: &str) -> Result<bool, FsError> {
        let request = ListObjectsRequest {
            max_keys: Some(1),
            ..ListObjectsRequest::new(bucket).with_prefix(prefix)
        };
        let page = self.client.list_objects_v2(&request).await?;
        Ok(!page.contents.is_empty() || !page.common_prefixes.is_empty())
    }

    /// Delete an object.
    pub async fn unlink(&self, url: &str) -> io::Result<()> {
        let result: Result<_, FsError> = async {
            let parsed = ObjectUrl::parse(url)?;
            let (bucket, key) = object_parts(&parsed)?;
            self.client.delete_object(bucket, key).await?;
            self.cache.invalidate(&parsed.to_string());
            debug!(url, "unlinked object");
            Ok(())
        }
        .await;
        result.map_err(|err| report("unlink", url, err))
    }

    /// Rename an object or a directory.
    ///
    /// Objects are copied server-side and the source deleted. A directory is renamed by
    /// copying every key under its prefix; this only works within one bucket.
    pub async fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let result: Result<_, FsError> = async {
            let source = ObjectUrl::parse(from)?;
            let target = ObjectUrl::parse(to)?;
            let (src_bucket, src_key) = object_parts(&source)?;
            let (dst_bucket, dst_key) = object_parts(&target)?;

            match self.client.head_object(src_bucket, src_key).await {
                Ok(_) => {
                    self.client
                        .copy_object(src_bucket, src_key, dst_bucket, dst_key, self.options.acl)
                        .await?;
                    self.client.delete_object(src_bucket, src_key).await?;
                }
                Err(err) if err.is_not_found() => {
                    self.rename_directory(&source, &target).await?;
                }
                Err(err) => return Err(err.into()),
            }
            self.cache.invalidate(&source.to_string());
            self.cache.invalidate(&target.to_string());
            info!(from, to, "renamed");
            Ok(())
        }
        .await;
        result.map_err(|err| report("rename", from, err))
    }

    async fn rename_directory(
        &self,
        source: &ObjectUrl,
        target: &ObjectUrl,
    ) -> Result<(), FsError> {
        let (src_bucket, _) = object_parts(source)?;
        let (dst_bucket, _) = object_parts(target)?;
        let delimiter = &self.options.delimiter;
        let src_prefix = source.dir_prefix(delimiter);
        let dst_prefix = target.dir_prefix(delimiter);

        let objects = self.client.list_all_objects(src_bucket, Some(&src_prefix)).await?;
        if objects.is_empty() {
            return Err(FsError::NotFound(source.to_string()));
        }
        if src_bucket != dst_bucket {
            return Err(FsError::Unsupported(format!(
                "cannot rename directory {source} across buckets to {target}"
            )));
        }

        let mut copied = Vec::with_capacity(objects.len());
        for object in &objects {
            let Some(rest) = object.key.strip_prefix(&src_prefix) else {
                continue;
            };
            let new_key = format!("{dst_prefix}{rest}");
            self.client
                .copy_object(src_bucket, &object.key, dst_bucket, &new_key, self.options.acl)
                .await?;
            copied.push(object.key.clone());
        }
        let deleted = self.client.delete_objects(src_bucket, &copied).await?;
        if let Some(failed) = deleted.errors.first() {
            return Err(FsError::Io(io::Error::other(format!(
                "renamed {source} but could not delete {}: {}",
                failed.key, failed.code
            ))));
        }
        debug!(%source, %target, keys = copied.len(), "renamed directory");
        Ok(())
    }

    /// Create a bucket, or a directory marker object `key/`.
    pub async fn mkdir(&self, url: &str) -> io::Result<()> {
        let result: Result<_, FsError> = async {
            let parsed = ObjectUrl::parse(url)?;
            let Some(bucket) = parsed.bucket() else {
                return Err(FsError::AlreadyExists(url.to_owned()));
            };
            match parsed.key() {
                None => {
                    let region = self.client.config().region.clone();
                    self.client
                        .create_bucket(bucket, Some(&region), self.options.acl)
                        .await?;
                }
                Some(_) => {
                    let marker = parsed.dir_prefix(&self.options.delimiter);
                    if self.client.does_object_exist(bucket, &marker, false).await? {
                        return Err(FsError::AlreadyExists(url.to_owned()));
                    }
                    let options = PutObjectOptions {
                        acl: self.options.acl,
                        ..PutObjectOptions::default()
                    };
                    self.client.put_object(bucket, &marker, Vec::new(), &options).await?;
                }
            }
            self.cache.invalidate(&parsed.to_string());
            debug!(url, "created directory");
            Ok(())
        }
        .await;
        result.map_err(|err| report("mkdir", url, err))
    }

    /// Delete a bucket, or a directory marker.
    ///
    /// A marker is only deleted when no other object shares its prefix.
    pub async fn rmdir(&self, url: &str) -> io::Result<()> {
        let result: Result<_, FsError> = async {
            let parsed = ObjectUrl::parse(url)?;
            let Some(bucket) = parsed.bucket() else {
                return Err(FsError::Unsupported("cannot remove the root".to_owned()));
            };
            if parsed.key().is_none() {
                self.client.delete_bucket(bucket).await?;
            } else {
                let marker = parsed.dir_prefix(&self.options.delimiter);
                let request = ListObjectsRequest {
                    max_keys: Some(2),
                    ..ListObjectsRequest::new(bucket).with_prefix(&marker)
                };
                let page = self.client.list_objects_v2(&request).await?;
                if page.contents.iter().any(|o| o.key != marker) {
                    return Err(FsError::NotEmpty(url.to_owned()));
                }
                if page.contents.is_empty() {
                    return Err(FsError::NotFound(url.to_owned()));
                }
                self.client.delete_object(bucket, &marker).await?;
            }
            self.cache.invalidate(&parsed.to_string());
            debug!(url, "removed directory");
            Ok(())
        }
        .await;
        result.map_err(|err| report("rmdir", url, err))
    }

    /// Open a directory listing: buckets for the root, otherwise the keys and
    /// sub-directories directly below the path.
    pub async fn opendir(&self, url: &str) -> io::Result<ObjectDir> {
        let result: Result<_, FsError> = async {
            let parsed = ObjectUrl::parse(url)?;
            if parsed.is_root() {
                let buckets = self.client.list_buckets().await?;
                let names = buckets.buckets.into_iter().map(|b| b.name).collect();
                return Ok(ObjectDir::buckets(parsed, names, self.cache.clone()));
            }
            let delimiter = self.options.delimiter.clone();
            let prefix = parsed.dir_prefix(&delimiter);
            let bucket = parsed
                .bucket()
                .ok_or_else(|| FsError::InvalidUrl(url.to_owned()))?;
            let request = ListObjectsRequest::new(bucket)
                .with_prefix(prefix.clone())
                .with_delimiter(delimiter.clone());
            let cursor = self.client.cursor(request);
            Ok(ObjectDir::keys(parsed, cursor, prefix, delimiter, self.cache.clone()))
        }
        .await;
        result.map_err(|err| report("opendir", url, err))
    }
}

fn object_parts(url: &ObjectUrl) -> Result<(&str, &str), FsError> {
    match (url.bucket(), url.key()) {
        (Some(bucket), Some(key)) => Ok((bucket, key)),
        _ => Err(FsError::InvalidUrl(format!("{url} does not name an object"))),
    }
}
