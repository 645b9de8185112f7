//! Object streams returned by [`StreamWrapper::open`](crate::StreamWrapper::open).

use std::io::{self, SeekFrom};
use std::sync::Arc;

use bytes::Bytes;
use objstore_client::ObjectStoreClient;
use objstore_client::transfer::TransferOptions;
use tempfile::TempPath;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{FsError, report};
use crate::mode::OpenMode;
use crate::stat::StatCache;
use crate::url::ObjectUrl;
use crate::wrapper::WrapperOptions;

/// An open object.
///
/// Read streams fetch the object in ranged windows as they advance. Write streams
/// collect data in a local temporary file and upload it on [`flush`](Self::flush) or
/// [`close`](Self::close); dropping a dirty stream without closing it discards the
/// buffered data.
#[derive(Debug)]
pub struct ObjectFile {
    client: ObjectStoreClient,
    url: ObjectUrl,
    bucket: String,
    key: String,
    mode: OpenMode,
    stream: Stream,
    cache: Arc<StatCache>,
}

#[derive(Debug)]
enum Stream {
    Read(ReadWindow),
    Write(WriteSink),
}

#[derive(Debug)]
struct ReadWindow {
    size: u64,
    position: u64,
    window_size: u64,
    window: Bytes,
    window_start: u64,
    /// Every byte from offset zero up to the furthest read, for seekable streams.
    retained: Option<Vec<u8>>,
}

#[derive(Debug)]
struct WriteSink {
    file: tokio::fs::File,
    path: TempPath,
    position: u64,
    len: u64,
    dirty: bool,
    /// Writes always land at the end; the position cannot move.
    append: bool,
    transfer: TransferOptions,
}

impl ObjectFile {
    pub(crate) async fn open(
        client: ObjectStoreClient,
        url: ObjectUrl,
        mode: OpenMode,
        options: &WrapperOptions,
        cache: Arc<StatCache>,
    ) -> Result<Self, FsError> {
        let (Some(bucket), Some(key)) = (url.bucket(), url.key()) else {
            return Err(FsError::InvalidUrl(format!("{url} does not name an object")));
        };
        let (bucket, key) = (bucket.to_owned(), key.to_owned());
        if mode == OpenMode::CreateNew && client.does_object_exist(&bucket, &key, false).await? {
            return Err(FsError::AlreadyExists(url.to_string()));
        }

        let stream = match mode {
            OpenMode::Read => {
                let meta = client.head_object(&bucket, &key).await?;
                Stream::Read(ReadWindow {
                    size: meta.content_length,
                    position: 0,
                    window_size: options.read_window.max(1),
                    window: Bytes::new(),
                    window_start: 0,
                    retained: options.seekable.then(Vec::new),
                })
            }
            OpenMode::Write | OpenMode::CreateNew => {
                Stream::Write(WriteSink::create(&key, options, false).await?)
            }
            OpenMode::Append => {
                let mut sink = WriteSink::create(&key, options, true).await?;
                sink.preload(&client, &bucket, &key).await?;
                Stream::Write(sink)
            }
        };
        debug!(%url, %mode, "opened object stream");
        Ok(Self {
            client,
            url,
            bucket,
            key,
            mode,
            stream,
            cache,
        })
    }

    /// The URL this stream was opened with.
    #[must_use]
    pub fn url(&self) -> &ObjectUrl {
        &self.url
    }

    /// The open mode.
    #[must_use]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Read up to `buf.len()` bytes at the current position. Returns 0 at the end of
    /// the object.
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Stream::Read(window) = &mut self.stream else {
            return Err(self.fail("read", not_readable()));
        };
        match window.read(&self.client, &self.bucket, &self.key, buf).await {
            Ok(n) => Ok(n),
            Err(err) => Err(self.fail("read", err)),
        }
    }

    /// Read from the current position to the end of the object.
    pub async fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut chunk = vec![0u8; 64 * 1024];
        loop {
            let n = self.read(&mut chunk).await?;
            if n == 0 {
                return Ok(data);
            }
            data.extend_from_slice(&chunk[..n]);
        }
    }

    /// Write `data` at the current position.
    pub async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let Stream::Write(sink) = &mut self.stream else {
            return Err(self.fail("write", not_writable()));
        };
        match sink.write(data).await {
            Ok(()) => Ok(data.len()),
            Err(err) => Err(self.fail("write", err)),
        }
    }

    /// Move the position. Read streams that are not seekable can only move backwards
    /// within the current window, and append streams stay at the end.
    pub async fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let result = match &mut self.stream {
            Stream::Read(window) => window.seek(pos),
            Stream::Write(sink) => sink.seek(pos).await,
        };
        result.map_err(|err| self.fail("seek", err))
    }

    /// The current position.
    #[must_use]
    pub fn tell(&self) -> u64 {
        match &self.stream {
            Stream::Read(window) => window.position,
            Stream::Write(sink) => sink.position,
        }
    }

    /// Whether the position is at or past the end of the data.
    #[must_use]
    pub fn eof(&self) -> bool {
        match &self.stream {
            Stream::Read(window) => window.position >= window.size,
            Stream::Write(sink) => sink.position >= sink.len,
        }
    }

    /// Upload buffered writes. A no-op for read streams and clean write streams.
    pub async fn flush(&mut self) -> io::Result<()> {
        let Stream::Write(sink) = &mut self.stream else {
            return Ok(());
        };
        if !sink.dirty {
            return Ok(());
        }
        match sink.upload(&self.client, &self.bucket, &self.key).await {
            Ok(()) => {
                self.cache.invalidate(&self.url.to_string());
                Ok(())
            }
            Err(err) => Err(self.fail("flush", err)),
        }
    }

    /// Flush and release the stream.
    pub async fn close(mut self) -> io::Result<()> {
        self.flush().await
    }

    fn fail(&self, operation: &str, err: FsError) -> io::Error {
        report(operation, &self.url.to_string(), err)
    }
}

impl Drop for ObjectFile {
    fn drop(&mut self) {
        if let Stream::Write(sink) = &self.stream {
            if sink.dirty {
                warn!(url = %self.url, "object stream dropped with unflushed writes");
            }
        }
    }
}

impl ReadWindow {
    async fn read(
        &mut self,
        client: &ObjectStoreClient,
        bucket: &str,
        key: &str,
        buf: &mut [u8],
    ) -> Result<usize, FsError> {
        if buf.is_empty() || self.position >= self.size {
            return Ok(0);
        }

        let n = if let Some(retained) = &mut self.retained {
            let have = retained.len() as u64;
            if have <= self.position {
                let end = (self.position + 1).max(have + self.window_size).min(self.size);
                let chunk = fetch(client, bucket, key, have, end).await?;
                retained.extend_from_slice(&chunk);
            }
            copy_from(retained, to_index(self.position), buf)
        } else {
            let window_end = self.window_start + self.window.len() as u64;
            if self.position < self.window_start || self.position >= window_end {
                let end = (self.position + self.window_size).min(self.size);
                self.window = fetch(client, bucket, key, self.position, end).await?;
                self.window_start = self.position;
            }
            copy_from(&self.window, to_index(self.position - self.window_start), buf)
        };
        if n == 0 {
            // The object shrank since it was opened.
            self.size = self.position;
        }
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, FsError> {
        let target = resolve_seek(pos, self.position, self.size)?;
        if self.retained.is_none() && target < self.window_start {
            return Err(FsError::Unsupported(format!(
                "backward seek to {target} on a forward-only stream"
            )));
        }
        self.position = target;
        Ok(target)
    }
}

impl WriteSink {
    async fn create(key: &str, options: &WrapperOptions, append: bool) -> Result<Self, FsError> {
        let (file, path) = tempfile::NamedTempFile::new()?.into_parts();
        let content_type = options
            .content_type
            .clone()
            .or_else(|| guess_content_type(key));
        Ok(Self {
            file: tokio::fs::File::from_std(file),
            path,
            position: 0,
            len: 0,
            dirty: !append,
            append,
            transfer: TransferOptions {
                acl: options.acl.or(options.transfer.acl),
                content_type,
                ..options.transfer.clone()
            },
        })
    }

    async fn preload(
        &mut self,
        client: &ObjectStoreClient,
        bucket: &str,
        key: &str,
    ) -> Result<(), FsError> {
        match client
            .download_file(bucket, key, self.path.to_path_buf(), self.transfer.clone())
            .await
        {
            Ok(outcome) => debug!(bucket, key, size = outcome.size, "preloaded object for append"),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }
        self.len = self.file.seek(SeekFrom::End(0)).await?;
        self.position = self.len;
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), FsError> {
        self.file.write_all(data).await?;
        self.position += data.len() as u64;
        self.len = self.len.max(self.position);
        self.dirty = true;
        Ok(())
    }

    async fn seek(&mut self, pos: SeekFrom) -> Result<u64, FsError> {
        let target = resolve_seek(pos, self.position, self.len)?;
        if self.append && target != self.len {
            return Err(FsError::Unsupported(format!(
                "seek to {target} on an append stream of {} bytes",
                self.len
            )));
        }
        self.position = self.file.seek(SeekFrom::Start(target)).await?;
        Ok(self.position)
    }

    async fn upload(
        &mut self,
        client: &ObjectStoreClient,
        bucket: &str,
        key: &str,
    ) -> Result<(), FsError> {
        self.file.flush().await?;
        let outcome = client
            .upload_file(bucket, key, self.path.to_path_buf(), self.transfer.clone())
            .await?;
        debug!(bucket, key, size = outcome.size, parts = outcome.parts, "uploaded object stream");
        self.dirty = false;
        Ok(())
    }
}

/// Content type guessed from the extension of `key`.
#[must_use]
pub fn guess_content_type(key: &str) -> Option<String> {
    mime_guess::from_path(key)
        .first()
        .map(|mime| mime.essence_str().to_owned())
}

/// GET `start..end` (exclusive end).
async fn fetch(
    client: &ObjectStoreClient,
    bucket: &str,
    key: &str,
    start: u64,
    end: u64,
) -> Result<Bytes, FsError> {
    if end <= start {
        return Ok(Bytes::new());
    }
    let output = client.get_object(bucket, key, Some((start, Some(end - 1)))).await?;
    debug!(bucket, key, start, len = output.body.len(), "fetched read window");
    Ok(output.body)
}

fn resolve_seek(pos: SeekFrom, current: u64, end: u64) -> Result<u64, FsError> {
    let target = match pos {
        SeekFrom::Start(offset) => Some(offset),
        SeekFrom::Current(delta) => current.checked_add_signed(delta),
        SeekFrom::End(delta) => end.checked_add_signed(delta),
    };
    target.ok_or_else(|| {
        FsError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek to a negative or overflowing position",
        ))
    })
}

/// Copy the bytes of `data` from `offset` into `buf`.
fn copy_from(data: &[u8], offset: usize, buf: &mut [u8]) -> usize {
    let available = data.get(offset..).unwrap_or_default();
    let n = available.len().min(buf.len());
    buf[..n].copy_from_slice(&available[..n]);
    n
}

fn to_index(offset: u64) -> usize {
    usize::try_from(offset).unwrap_or(usize::MAX)
}

fn not_readable() -> FsError {
    FsError::Unsupported("stream is not open for reading".to_owned())
}

fn not_writable() -> FsError {
    FsError::Unsupported("stream is not open for writing".to_owned())
}
