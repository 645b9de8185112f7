//! `<scheme>://bucket/key` URLs.

use std::fmt;
use std::str::FromStr;

use crate::error::FsError;

/// A parsed stream URL.
///
/// `s3://` addresses the root (all buckets), `s3://bucket` a bucket and
/// `s3://bucket/some/key` an object or pseudo-directory. Trailing slashes are dropped
/// from the key, so `s3://b/dir/` and `s3://b/dir` name the same path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl {
    scheme: String,
    bucket: Option<String>,
    key: Option<String>,
}

impl ObjectUrl {
    /// Parse a URL.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::InvalidUrl`] when the scheme separator is missing, the scheme
    /// is not a valid scheme name, or a key is given without a bucket.
    pub fn parse(url: &str) -> Result<Self, FsError> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| FsError::InvalidUrl(url.to_owned()))?;
        if !is_valid_scheme(scheme) {
            return Err(FsError::InvalidUrl(url.to_owned()));
        }
        let (bucket, key) = match rest.split_once('/') {
            Some((bucket, key)) => (bucket, key.trim_end_matches('/')),
            None => (rest, ""),
        };
        if bucket.is_empty() && !key.is_empty() {
            return Err(FsError::InvalidUrl(url.to_owned()));
        }
        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            bucket: (!bucket.is_empty()).then(|| bucket.to_owned()),
            key: (!key.is_empty()).then(|| key.to_owned()),
        })
    }

    /// The scheme, lowercased.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The bucket, absent for the root.
    #[must_use]
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// The key, absent for the root and for bucket URLs.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Whether this URL names the root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.bucket.is_none()
    }

    /// Listing prefix of the directory this URL names: `key` plus the delimiter, or
    /// empty for a bucket.
    #[must_use]
    pub fn dir_prefix(&self, delimiter: &str) -> String {
        self.key
            .as_deref()
            .map(|key| format!("{key}{delimiter}"))
            .unwrap_or_default()
    }

    /// URL of a bucket under the same scheme.
    #[must_use]
    pub fn with_bucket(&self, bucket: &str) -> Self {
        Self {
            scheme: self.scheme.clone(),
            bucket: Some(bucket.to_owned()),
            key: None,
        }
    }

    /// URL of `key` in this URL's bucket.
    #[must_use]
    pub fn with_key(&self, key: &str) -> Self {
        let key = key.trim_end_matches('/');
        Self {
            scheme: self.scheme.clone(),
            bucket: self.bucket.clone(),
            key: (!key.is_empty()).then(|| key.to_owned()),
        }
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if let Some(bucket) = &self.bucket {
            f.write_str(bucket)?;
        }
        if let Some(key) = &self.key {
            write!(f, "/{key}")?;
        }
        Ok(())
    }
}

impl FromStr for ObjectUrl {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// RFC 3986 scheme: a letter followed by letters, digits, `+`, `-` or `.`.
pub(crate) fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
