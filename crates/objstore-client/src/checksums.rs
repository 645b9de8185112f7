//! Checksums for `Content-MD5`, payload signing, ETag comparison and download
//! verification.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use md5::{Digest, Md5};
use sha2::Sha256;
use tokio::io::AsyncReadExt;

use crate::transport::RequestBody;

const READ_CHUNK: usize = 1024 * 1024;

/// Hex MD5 of `data`.
///
/// # Examples
///
/// ```
/// use objstore_client::checksums::md5_hex;
///
/// assert_eq!(md5_hex(b"hello"), "5d41402abc4b2a76b9719d911017c592");
/// ```
#[must_use]
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Base64 MD5 of `data`, the `Content-MD5` header format.
#[must_use]
pub fn content_md5(data: &[u8]) -> String {
    BASE64_STANDARD.encode(Md5::digest(data))
}

/// Convert a base64 `Content-MD5` value to hex, if it decodes to 16 bytes.
#[must_use]
pub fn content_md5_to_hex(value: &str) -> Option<String> {
    let raw = BASE64_STANDARD.decode(value.trim()).ok()?;
    (raw.len() == 16).then(|| hex::encode(raw))
}

/// Hex MD5 of a local file, read in chunks.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub async fn md5_file_hex(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Digests of a file range, computed while reading it in chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeDigests {
    /// Base64 MD5, when requested.
    pub content_md5: Option<String>,
    /// Hex SHA-256, when requested.
    pub sha256: Option<String>,
}

/// Hash `len` bytes of `path` from `offset` without holding them in memory.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read or is shorter than the range.
pub async fn digest_file_range(
    path: &Path,
    offset: u64,
    len: u64,
    md5: bool,
    sha256: bool,
) -> std::io::Result<RangeDigests> {
    let mut reader = RequestBody::open_file(path, offset, len).await?;
    let mut md5_hasher = md5.then(Md5::new);
    let mut sha_hasher = sha256.then(Sha256::new);
    let mut buf = vec![0u8; READ_CHUNK];
    let mut read = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        read += n as u64;
        if let Some(h) = md5_hasher.as_mut() {
            h.update(&buf[..n]);
        }
        if let Some(h) = sha_hasher.as_mut() {
            h.update(&buf[..n]);
        }
    }
    if read != len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("{} ended after {read} of {len} bytes", path.display()),
        ));
    }
    Ok(RangeDigests {
        content_md5: md5_hasher.map(|h| BASE64_STANDARD.encode(h.finalize())),
        sha256: sha_hasher.map(|h| hex::encode(h.finalize())),
    })
}

/// Strip the surrounding quotes from an ETag.
#[must_use]
pub fn unquote_etag(etag: &str) -> &str {
    etag.trim().trim_matches('"')
}

/// Whether an ETag is a plain MD5 of the whole object (32 hex digits, no `-N` suffix).
///
/// # Examples
///
/// ```
/// use objstore_client::checksums::is_plain_md5_etag;
///
/// assert!(is_plain_md5_etag("\"5d41402abc4b2a76b9719d911017c592\""));
/// assert!(!is_plain_md5_etag("\"5d41402abc4b2a76b9719d911017c592-3\""));
/// ```
#[must_use]
pub fn is_plain_md5_etag(etag: &str) -> bool {
    let etag = unquote_etag(etag);
    etag.len() == 32 && etag.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Multipart ETag: MD5 of the concatenated binary part MD5s, suffixed with `-<count>`.
///
/// Part ETags may be quoted. Parts whose ETag is not valid hex are skipped.
#[must_use]
pub fn multipart_etag<'a, I>(part_etags: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut combined = Vec::new();
    let mut count = 0usize;
    for etag in part_etags {
        if let Ok(raw) = hex::decode(unquote_etag(etag)) {
            combined.extend_from_slice(&raw);
        }
        count += 1;
    }
    format!("\"{}-{count}\"", md5_hex(&combined))
}
