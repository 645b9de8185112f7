//! Directory handles returned by [`StreamWrapper::opendir`](crate::StreamWrapper::opendir).

use std::io;
use std::sync::Arc;

use objstore_client::{ListEntry, ListingCursor};

use crate::error::{FsError, report};
use crate::stat::{FileStat, StatCache};
use crate::url::ObjectUrl;

/// An open directory.
///
/// Entries are names relative to the directory, without the trailing delimiter of
/// sub-directories. Each entry's stat is left in the wrapper's next-stat cache.
#[derive(Debug)]
pub struct ObjectDir {
    url: ObjectUrl,
    source: Source,
    cache: Arc<StatCache>,
}

#[derive(Debug)]
enum Source {
    Buckets {
        names: Vec<String>,
        next: usize,
    },
    Keys {
        cursor: ListingCursor,
        prefix: String,
        delimiter: String,
    },
}

impl ObjectDir {
    pub(crate) fn buckets(url: ObjectUrl, names: Vec<String>, cache: Arc<StatCache>) -> Self {
        Self {
            url,
            source: Source::Buckets { names, next: 0 },
            cache,
        }
    }

    pub(crate) fn keys(
        url: ObjectUrl,
        cursor: ListingCursor,
        prefix: String,
        delimiter: String,
        cache: Arc<StatCache>,
    ) -> Self {
        Self {
            url,
            source: Source::Keys {
                cursor,
                prefix,
                delimiter,
            },
            cache,
        }
    }

    /// The directory's URL.
    #[must_use]
    pub fn url(&self) -> &ObjectUrl {
        &self.url
    }

    /// Next entry name, or `None` at the end.
    pub async fn read(&mut self) -> io::Result<Option<String>> {
        match self.next_entry().await {
            Ok(entry) => Ok(entry),
            Err(err) => Err(report("readdir", &self.url.to_string(), err)),
        }
    }

    /// All remaining entry names.
    pub async fn read_all(&mut self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        while let Some(name) = self.read().await? {
            names.push(name);
        }
        Ok(names)
    }

    /// Restart from the first entry.
    pub fn rewind(&mut self) {
        match &mut self.source {
            Source::Buckets { next, .. } => *next = 0,
            Source::Keys { cursor, .. } => cursor.rewind(),
        }
    }

    /// Release the handle.
    pub fn close(self) {}

    async fn next_entry(&mut self) -> Result<Option<String>, FsError> {
        match &mut self.source {
            Source::Buckets { names, next } => {
                let Some(name) = names.get(*next).cloned() else {
                    return Ok(None);
                };
                *next += 1;
                self.cache
                    .put(self.url.with_bucket(&name).to_string(), FileStat::directory());
                Ok(Some(name))
            }
            Source::Keys {
                cursor,
                prefix,
                delimiter,
            } => loop {
                let Some(entry) = cursor.next().await? else {
                    return Ok(None);
                };
                let Some(name) = entry.key().strip_prefix(prefix.as_str()) else {
                    continue;
                };
                let name = name.strip_suffix(delimiter.as_str()).unwrap_or(name);
                if name.is_empty() {
                    // The directory's own marker object.
                    continue;
                }
                let stat = match &entry {
                    ListEntry::Object(object) if !entry.key().ends_with(delimiter.as_str()) => {
                        FileStat::file(object.size, object.last_modified)
                    }
                    _ => FileStat::directory(),
                };
                let path = self.url.with_key(&format!("{prefix}{name}"));
                self.cache.put(path.to_string(), stat);
                return Ok(Some(name.to_owned()));
            },
        }
    }
}
