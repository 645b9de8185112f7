//! Upload state machine.
//!
//! ```text
//! Init ──size < min_part_size──▶ SimplePut ──▶ Done
//!   │
//!   └──▶ MultipartInitiated ──▶ PartsUploading ──▶ Completing ──▶ Done
//!                                   │                  │
//!                                   └──part failure / cancel──▶ Aborting ──▶ Aborted
//!                                                      (or Failed when the partial
//!                                                       upload is left in place)
//! ```

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use futures::StreamExt;
use objstore_model::types::CompletedPart;
use tracing::{debug, info, warn};

use super::plan::{PartPlan, plan_parts};
use super::TransferOptions;
use crate::client::ObjectStoreClient;
use crate::error::ClientError;
use crate::ops::PutObjectOptions;
use crate::request::{Body, FileBody};

/// States of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// Nothing sent yet.
    Init,
    /// Uploading with a single PUT.
    SimplePut,
    /// The multipart upload was created.
    MultipartInitiated,
    /// Parts are being uploaded.
    PartsUploading,
    /// The completion request is in flight.
    Completing,
    /// The object was written.
    Done,
    /// A failure occurred; the abort call is in flight.
    Aborting,
    /// The multipart upload was aborted.
    Aborted,
    /// The upload failed and was left in place.
    Failed,
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Where the uploaded bytes come from.
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// A local file; parts are read from it on demand.
    File(PathBuf),
    /// In-memory bytes.
    Bytes(Bytes),
}

impl UploadSource {
    async fn len(&self) -> Result<u64, ClientError> {
        match self {
            Self::File(path) => Ok(tokio::fs::metadata(path).await?.len()),
            Self::Bytes(b) => Ok(b.len() as u64),
        }
    }

    fn whole(&self) -> Body {
        match self {
            Self::File(path) => Body::File(FileBody::whole(path)),
            Self::Bytes(b) => Body::Bytes(b.clone()),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn part(&self, part: &PartPlan) -> Body {
        match self {
            Self::File(path) => Body::File(FileBody::range(path, part.offset, part.length)),
            // The source is in memory, so offsets fit in usize.
            Self::Bytes(b) => Body::Bytes(
                b.slice(part.offset as usize..(part.offset + part.length) as usize),
            ),
        }
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Object key.
    pub key: String,
    /// Uploaded size.
    pub size: u64,
    /// ETag of the object.
    pub e_tag: Option<String>,
    /// Multipart upload id, if the multipart path was taken.
    pub upload_id: Option<String>,
    /// Number of parts (1 for a simple PUT).
    pub parts: usize,
}

/// One upload, driven to completion by [`run`](Self::run).
#[derive(Debug)]
pub struct UploadSession {
    client: ObjectStoreClient,
    bucket: String,
    key: String,
    source: UploadSource,
    options: TransferOptions,
    state: UploadState,
    history: Vec<UploadState>,
}

impl UploadSession {
    /// Prepare an upload.
    pub fn new(
        client: ObjectStoreClient,
        bucket: impl Into<String>,
        key: impl Into<String>,
        source: UploadSource,
        options: TransferOptions,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key: key.into(),
            source,
            options,
            state: UploadState::Init,
            history: vec![UploadState::Init],
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Every state visited so far.
    #[must_use]
    pub fn history(&self) -> &[UploadState] {
        &self.history
    }

    fn transition(&mut self, next: UploadState) {
        debug!(
            bucket = %self.bucket,
            key = %self.key,
            from = %self.state,
            to = %next,
            "upload state"
        );
        self.state = next;
        self.history.push(next);
        self.options.notify_upload(&self.key, next);
    }

    /// Run the upload.
    ///
    /// # Errors
    ///
    /// A failed simple PUT returns the request error. A failed or cancelled
    /// multipart upload returns [`ClientError::UploadFailed`] after the abort call
    /// (unless the partial upload is left in place).
    pub async fn run(&mut self) -> Result<UploadOutcome, ClientError> {
        let size = self.source.len().await?;
        if size < self.options.min_part_size {
            return self.simple_put(size).await;
        }

        let upload_id = self
            .client
            .create_multipart_upload(
                &self.bucket,
                &self.key,
                self.options.content_type.as_deref(),
                self.options.acl,
            )
            .await?;
        self.transition(UploadState::MultipartInitiated);

        let plan = plan_parts(size, self.options.min_part_size);
        self.transition(UploadState::PartsUploading);
        let mut completed = match self.upload_parts(&upload_id, &plan).await {
            Ok(parts) => parts,
            Err((part_number, err)) => return Err(self.fail(upload_id, part_number, err).await),
        };
        completed.sort_by_key(|p| p.part_number);

        self.transition(UploadState::Completing);
        let result = match self
            .client
            .complete_multipart_upload(&self.bucket, &self.key, &upload_id, &completed)
            .await
        {
            Ok(result) => result,
            Err(err) => return Err(self.fail(upload_id, None, err).await),
        };
        self.transition(UploadState::Done);

        info!(
            bucket = %self.bucket,
            key = %self.key,
            size,
            parts = plan.len(),
            "multipart upload finished"
        );
        Ok(UploadOutcome {
            key: self.key.clone(),
            size,
            e_tag: result.e_tag,
            upload_id: Some(upload_id),
            parts: plan.len(),
        })
    }

    async fn simple_put(&mut self, size: u64) -> Result<UploadOutcome, ClientError> {
        self.transition(UploadState::SimplePut);
        let options = PutObjectOptions {
            content_type: self.options.content_type.clone(),
            acl: self.options.acl,
            ..PutObjectOptions::default()
        };
        let e_tag = self
            .client
            .put_object(&self.bucket, &self.key, self.source.whole(), &options)
            .await?;
        self.transition(UploadState::Done);
        Ok(UploadOutcome {
            key: self.key.clone(),
            size,
            e_tag,
            upload_id: None,
            parts: 1,
        })
    }

    async fn upload_parts(
        &self,
        upload_id: &str,
        plan: &[PartPlan],
    ) -> Result<Vec<CompletedPart>, (Option<u32>, ClientError)> {
        let abort = self.options.abort.clone();
        let cancelled = async move {
            match abort {
                Some(handle) => handle.aborted().await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(cancelled);

        let mut parts = futures::stream::iter(plan.iter().copied())
            .map(|part| {
                let body = self.source.part(&part);
                let observer = self.options.observer.clone();
                async move {
                    if let Some(observer) = &observer {
                        observer.before_part(&self.key, &part);
                    }
                    self.client
                        .upload_part(&self.bucket, &self.key, upload_id, part.number, body)
                        .await
                        .map(|e_tag| CompletedPart {
                            part_number: part.number,
                            e_tag,
                        })
                        .map_err(|e| (Some(part.number), e))
                }
            })
            .buffer_unordered(self.options.concurrency.max(1));

        let mut completed = Vec::with_capacity(plan.len());
        loop {
            tokio::select! {
                biased;
                () = &mut cancelled => return Err((None, ClientError::Cancelled)),
                next = parts.next() => match next {
                    Some(Ok(part)) => completed.push(part),
                    Some(Err(failure)) => return Err(failure),
                    None => return Ok(completed),
                },
            }
        }
    }

    async fn fail(
        &mut self,
        upload_id: String,
        part_number: Option<u32>,
        err: ClientError,
    ) -> ClientError {
        warn!(
            bucket = %self.bucket,
            key = %self.key,
            %upload_id,
            ?part_number,
            error = %err,
            "multipart upload failed"
        );
        if self.options.leave_partial_on_failure {
            self.transition(UploadState::Failed);
            return ClientError::UploadFailed {
                upload_id,
                part_number,
                aborted: false,
                source: Box::new(err),
            };
        }

        self.transition(UploadState::Aborting);
        let aborted = match self
            .client
            .abort_multipart_upload(&self.bucket, &self.key, &upload_id)
            .await
        {
            Ok(()) => {
                self.transition(UploadState::Aborted);
                true
            }
            Err(abort_err) => {
                warn!(%upload_id, error = %abort_err, "abort of failed upload also failed");
                self.transition(UploadState::Failed);
                false
            }
        };
        ClientError::UploadFailed {
            upload_id,
            part_number,
            aborted,
            source: Box::new(err),
        }
    }
}

impl ObjectStoreClient {
    /// Upload a local file, choosing between a simple PUT and a multipart upload.
    pub async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: impl Into<PathBuf>,
        options: TransferOptions,
    ) -> Result<UploadOutcome, ClientError> {
        UploadSession::new(self.clone(), bucket, key, UploadSource::File(path.into()), options)
            .run()
            .await
    }

    /// Upload in-memory bytes, choosing between a simple PUT and a multipart upload.
    pub async fn upload_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        options: TransferOptions,
    ) -> Result<UploadOutcome, ClientError> {
        UploadSession::new(self.clone(), bucket, key, UploadSource::Bytes(data), options)
            .run()
            .await
    }
}
