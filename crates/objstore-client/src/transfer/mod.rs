//! Multipart uploads, resumable downloads and directory-tree sync.
//!
//! Transfers are explicit state machines ([`upload::UploadState`],
//! [`download::DownloadState`]) driven by the client operations. Progress is
//! reported to an optional [`TransferObserver`], and a running upload can be
//! cancelled through an [`AbortHandle`]; cancellation always aborts the server-side
//! upload so no orphaned parts are left behind.

pub mod download;
pub mod plan;
pub mod sync;
pub mod upload;

use std::fmt;
use std::sync::Arc;

use objstore_model::CannedAcl;
use tokio::sync::watch;

pub use download::{DownloadOutcome, DownloadSession, DownloadState};
pub use plan::{MAX_PARTS, PartPlan, plan_parts};
pub use sync::{SyncOptions, SyncReport};
pub use upload::{UploadOutcome, UploadSession, UploadState};

use crate::config::ClientConfig;

/// Default size of the ranged GETs of a download.
pub const DEFAULT_DOWNLOAD_WINDOW: u64 = 8 * 1024 * 1024;

/// Hooks called as a transfer progresses.
///
/// All methods have empty defaults.
pub trait TransferObserver: Send + Sync + fmt::Debug {
    /// Called before a part is sent.
    fn before_part(&self, _key: &str, _part: &PartPlan) {}

    /// Called on every upload state transition.
    fn on_upload_state(&self, _key: &str, _state: UploadState) {}

    /// Called on every download state transition.
    fn on_download_state(&self, _key: &str, _state: DownloadState) {}
}

/// Cancels a running transfer.
///
/// Clones share the same signal.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortHandle {
    /// Create an un-triggered handle.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once cancellation is requested.
    pub async fn aborted(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so `wait_for` cannot observe a closed channel.
        let _ = rx.wait_for(|aborted| *aborted).await;
    }
}

/// Options of a single-object transfer.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Maximum number of parts in flight.
    pub concurrency: usize,
    /// Minimum part size; smaller objects are uploaded with one PUT.
    pub min_part_size: u64,
    /// Size of each ranged GET of a download. Every window reaches the sink before the
    /// next one is requested.
    pub download_window: u64,
    /// On failure, leave the multipart upload in place instead of aborting it.
    pub leave_partial_on_failure: bool,
    /// Canned ACL of the uploaded object.
    pub acl: Option<CannedAcl>,
    /// Content type of the uploaded object.
    pub content_type: Option<String>,
    /// Progress observer.
    pub observer: Option<Arc<dyn TransferObserver>>,
    /// Cancellation handle.
    pub abort: Option<AbortHandle>,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl TransferOptions {
    /// Concurrency and part size from the client configuration.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            min_part_size: config.min_part_size,
            download_window: DEFAULT_DOWNLOAD_WINDOW,
            leave_partial_on_failure: false,
            acl: None,
            content_type: None,
            observer: None,
            abort: None,
        }
    }

    pub(crate) fn notify_upload(&self, key: &str, state: UploadState) {
        if let Some(observer) = &self.observer {
            observer.on_upload_state(key, state);
        }
    }

    pub(crate) fn notify_download(&self, key: &str, state: DownloadState) {
        if let Some(observer) = &self.observer {
            observer.on_download_state(key, state);
        }
    }
}
