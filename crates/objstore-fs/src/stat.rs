//! `stat` results and the next-stat cache.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Mode bits reported for objects: a regular file, readable and writable by all.
pub const FILE_MODE: u32 = 0o100_777;
/// Mode bits reported for buckets, pseudo-directories and the root.
pub const DIR_MODE: u32 = 0o040_777;

/// What a path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// An object.
    File,
    /// A bucket, a pseudo-directory or the root.
    Directory,
}

/// Result of a `stat` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    /// Object or directory.
    pub kind: FileKind,
    /// Unix mode bits, [`FILE_MODE`] or [`DIR_MODE`].
    pub mode: u32,
    /// Object size; zero for directories.
    pub size: u64,
    /// Last modification time, when known.
    pub modified: Option<DateTime<Utc>>,
}

impl FileStat {
    /// Stat of an object.
    #[must_use]
    pub fn file(size: u64, modified: Option<DateTime<Utc>>) -> Self {
        Self {
            kind: FileKind::File,
            mode: FILE_MODE,
            size,
            modified,
        }
    }

    /// Stat of a directory.
    #[must_use]
    pub fn directory() -> Self {
        Self {
            kind: FileKind::Directory,
            mode: DIR_MODE,
            size: 0,
            modified: None,
        }
    }

    /// Whether this is an object.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    /// Whether this is a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

/// Remembers the stat of the last entry returned by `readdir`, so the `stat` call that
/// usually follows needs no request.
///
/// The cache holds a single entry and is consumed by the lookup that hits it.
#[derive(Debug, Default)]
pub struct StatCache {
    entry: Mutex<Option<(String, FileStat)>>,
}

impl StatCache {
    /// Replace the cached entry.
    pub fn put(&self, path: impl Into<String>, stat: FileStat) {
        *self.entry.lock() = Some((path.into(), stat));
    }

    /// Take the cached stat of `path`, if it is the cached entry.
    pub fn take(&self, path: &str) -> Option<FileStat> {
        let mut entry = self.entry.lock();
        if entry.as_ref().is_some_and(|(cached, _)| cached == path) {
            return entry.take().map(|(_, stat)| stat);
        }
        None
    }

    /// Drop the cached entry if it is `path` or lies below it.
    pub fn invalidate(&self, path: &str) {
        let mut entry = self.entry.lock();
        let stale = entry.as_ref().is_some_and(|(cached, _)| {
            cached == path
                || cached
                    .strip_prefix(path)
                    .is_some_and(|rest| rest.starts_with('/'))
        });
        if stale {
            *entry = None;
        }
    }

    /// Whether an entry is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entry.lock().is_none()
    }
}
