//! Resumable download state machine.
//!
//! A download appends to its sink. When the sink already holds a prefix of the
//! object, only the missing suffix is fetched, in ranged GETs of at most
//! [`TransferOptions::download_window`] bytes that are each flushed to the sink before
//! the next is sent; when the sink is already as long as the object nothing is
//! fetched at all. The finished sink is verified
//! against the object's MD5 whenever the service exposes one.

use std::fmt;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::TransferOptions;
use crate::checksums::{content_md5_to_hex, is_plain_md5_etag, md5_file_hex, unquote_etag};
use crate::client::ObjectStoreClient;
use crate::error::ClientError;
use crate::ops::ObjectMetadata;

/// States of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    /// Nothing sent yet.
    Init,
    /// The object's metadata is known.
    HeadIssued,
    /// The sink already holds the whole object; no GET was sent.
    AlreadyComplete,
    /// The missing bytes were fetched and appended, window by window.
    RangeGetIssued,
    /// The sink was compared against the object's checksum.
    IntegrityChecked,
    /// Finished.
    Done,
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Size of the object.
    pub size: u64,
    /// Bytes fetched by this run.
    pub fetched: u64,
    /// Whether the sink was verified against a checksum.
    pub verified: bool,
    /// ETag of the object.
    pub e_tag: Option<String>,
}

/// One download into a local file.
#[derive(Debug)]
pub struct DownloadSession {
    client: ObjectStoreClient,
    bucket: String,
    key: String,
    sink: PathBuf,
    options: TransferOptions,
    state: DownloadState,
    history: Vec<DownloadState>,
}

impl DownloadSession {
    /// Prepare a download of `bucket/key` into `sink`.
    pub fn new(
        client: ObjectStoreClient,
        bucket: impl Into<String>,
        key: impl Into<String>,
        sink: impl Into<PathBuf>,
        options: TransferOptions,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key: key.into(),
            sink: sink.into(),
            options,
            state: DownloadState::Init,
            history: vec![DownloadState::Init],
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> DownloadState {
        self.state
    }

    /// Every state visited so far.
    #[must_use]
    pub fn history(&self) -> &[DownloadState] {
        &self.history
    }

    fn transition(&mut self, next: DownloadState) {
        debug!(
            bucket = %self.bucket,
            key = %self.key,
            from = %self.state,
            to = %next,
            "download state"
        );
        self.state = next;
        self.history.push(next);
        self.options.notify_download(&self.key, next);
    }

    /// Run the download.
    ///
    /// # Errors
    ///
    /// Returns the HEAD or GET error, [`ClientError::Io`] for sink failures, and
    /// [`ClientError::Integrity`] when the finished sink does not match the object's
    /// checksum. The sink is left as written in every case, so a later run resumes.
    pub async fn run(&mut self) -> Result<DownloadOutcome, ClientError> {
        let meta = self.client.head_object(&self.bucket, &self.key).await?;
        self.transition(DownloadState::HeadIssued);

        let mut sink = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.sink)
            .await?;
        let written = sink.metadata().await?.len();
        let size = meta.content_length;

        if written >= size {
            self.transition(DownloadState::AlreadyComplete);
            debug!(bucket = %self.bucket, key = %self.key, written, size, "sink already complete");
            return Ok(DownloadOutcome {
                size,
                fetched: 0,
                verified: false,
                e_tag: meta.e_tag,
            });
        }

        let window = self.options.download_window.max(1);
        let mut offset = written;
        while offset < size {
            let end = offset.saturating_add(window).min(size);
            let output = self
                .client
                .get_object(&self.bucket, &self.key, Some((offset, Some(end - 1))))
                .await?;
            if output.body.is_empty() {
                warn!(bucket = %self.bucket, key = %self.key, offset, "object ended early");
                break;
            }
            sink.write_all(&output.body).await?;
            sink.flush().await?;
            offset += output.body.len() as u64;
            debug!(bucket = %self.bucket, key = %self.key, offset, size, "window written");
        }
        drop(sink);
        let fetched = offset - written;
        self.transition(DownloadState::RangeGetIssued);

        let verified = verify_sink(&self.key, &self.sink, &meta).await?;
        self.transition(DownloadState::IntegrityChecked);
        self.transition(DownloadState::Done);

        info!(
            bucket = %self.bucket,
            key = %self.key,
            size,
            fetched,
            resumed_at = written,
            "download finished"
        );
        Ok(DownloadOutcome {
            size,
            fetched,
            verified,
            e_tag: meta.e_tag,
        })
    }
}

/// The object's MD5 as hex, from `Content-MD5` or a single-part ETag.
fn expected_md5(meta: &ObjectMetadata) -> Option<String> {
    if let Some(hex) = meta.content_md5.as_deref().and_then(content_md5_to_hex) {
        return Some(hex);
    }
    meta.e_tag
        .as_deref()
        .filter(|etag| is_plain_md5_etag(etag))
        .map(|etag| unquote_etag(etag).to_ascii_lowercase())
}

async fn verify_sink(key: &str, sink: &Path, meta: &ObjectMetadata) -> Result<bool, ClientError> {
    let Some(expected) = expected_md5(meta) else {
        return Ok(false);
    };
    let actual = md5_file_hex(sink).await?;
    if actual != expected {
        warn!(key, %expected, %actual, "downloaded data does not match checksum");
        return Err(ClientError::Integrity {
            key: key.to_owned(),
            expected,
            actual,
        });
    }
    Ok(true)
}

impl ObjectStoreClient {
    /// Download an object into `path`, resuming from the bytes already there.
    pub async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        path: impl Into<PathBuf>,
        options: TransferOptions,
    ) -> Result<DownloadOutcome, ClientError> {
        DownloadSession::new(self.clone(), bucket, key, path, options)
            .run()
            .await
    }
}
