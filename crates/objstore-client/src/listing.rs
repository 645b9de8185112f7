//! Pull-based listing cursor.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use objstore_model::types::{ListObjectsV2Result, Object};

use crate::client::ObjectStoreClient;
use crate::error::ClientError;
use crate::ops::ListObjectsRequest;

/// One listing entry: an object or a common prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntry {
    /// An object.
    Object(Object),
    /// A prefix grouping keys that share it up to the delimiter.
    CommonPrefix(String),
}

impl ListEntry {
    /// Key of the object, or the prefix itself.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Object(o) => &o.key,
            Self::CommonPrefix(p) => p,
        }
    }

    /// Whether this entry is a common prefix.
    #[must_use]
    pub fn is_prefix(&self) -> bool {
        matches!(self, Self::CommonPrefix(_))
    }
}

type EntryFilter = Arc<dyn Fn(&ListEntry) -> bool + Send + Sync>;

/// Iterates a bucket listing one entry at a time, fetching pages on demand.
///
/// Within a page, objects and common prefixes are merged in key order. The cursor can
/// be [rewound](Self::rewind) to restart from the first page.
pub struct ListingCursor {
    client: ObjectStoreClient,
    request: ListObjectsRequest,
    buffer: VecDeque<ListEntry>,
    exhausted: bool,
    filter: Option<EntryFilter>,
}

impl fmt::Debug for ListingCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListingCursor")
            .field("request", &self.request)
            .field("buffered", &self.buffer.len())
            .field("exhausted", &self.exhausted)
            .field("filtered", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}

impl ListingCursor {
    /// Create a cursor for `request`. No request is sent until [`next`](Self::next).
    #[must_use]
    pub fn new(client: ObjectStoreClient, request: ListObjectsRequest) -> Self {
        Self {
            client,
            request,
            buffer: VecDeque::new(),
            exhausted: false,
            filter: None,
        }
    }

    /// Only yield entries accepted by `filter`.
    #[must_use]
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&ListEntry) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// The listing parameters.
    #[must_use]
    pub fn request(&self) -> &ListObjectsRequest {
        &self.request
    }

    /// Next entry, or `None` at the end of the listing.
    ///
    /// # Errors
    ///
    /// Returns the error of a failed page request; the cursor can be retried.
    pub async fn next(&mut self) -> Result<Option<ListEntry>, ClientError> {
        loop {
            while let Some(entry) = self.buffer.pop_front() {
                if self.filter.as_ref().is_none_or(|f| f(&entry)) {
                    return Ok(Some(entry));
                }
            }
            if self.exhausted {
                return Ok(None);
            }
            let page = self.client.list_objects_v2(&self.request).await?;
            self.absorb(page);
        }
    }

    /// Restart from the first page.
    pub fn rewind(&mut self) {
        self.request.continuation_token = None;
        self.buffer.clear();
        self.exhausted = false;
    }

    /// Drain the remaining entries.
    ///
    /// # Errors
    ///
    /// Returns the first page error.
    pub async fn collect_all(&mut self) -> Result<Vec<ListEntry>, ClientError> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next().await? {
            entries.push(entry);
        }
        Ok(entries)
    }

    fn absorb(&mut self, page: ListObjectsV2Result) {
        let prefixes = page.common_prefixes.into_iter().map(|p| p.prefix);
        self.buffer.extend(merge_page(page.contents, prefixes));
        match page.next_continuation_token {
            Some(token) if page.is_truncated => self.request.continuation_token = Some(token),
            _ => self.exhausted = true,
        }
    }
}

impl ObjectStoreClient {
    /// A lazily paginated listing.
    #[must_use]
    pub fn cursor(&self, request: ListObjectsRequest) -> ListingCursor {
        ListingCursor::new(self.clone(), request)
    }
}

/// Merge objects and prefixes of one page in key order.
fn merge_page<I>(objects: Vec<Object>, prefixes: I) -> Vec<ListEntry>
where
    I: IntoIterator<Item = String>,
{
    let mut entries: Vec<ListEntry> = objects
        .into_iter()
        .map(ListEntry::Object)
        .chain(prefixes.into_iter().map(ListEntry::CommonPrefix))
        .collect();
    entries.sort_by(|a, b| a.key().cmp(b.key()));
    entries
}
