//! Bucket addressing: virtual-hosted versus path-style.
//!
//! [`resolve`] turns `(bucket, key)` into the host and path a request is sent to, and
//! the canonical resource the legacy signer covers. Virtual-hosted addressing
//! (`bucket.host/key`) is preferred. Path-style (`host/bucket/key`) is used when it was
//! requested, when the bucket name is not a valid DNS label, or when the endpoint is
//! HTTPS and the name contains a dot (the wildcard certificate would not match).

use std::net::Ipv4Addr;

use objstore_auth::canonical::uri_encode;

use crate::config::AddressingStyle;
use crate::endpoint::{Endpoint, Scheme};

const MIN_BUCKET_NAME_LEN: usize = 3;
const MAX_BUCKET_NAME_LEN: usize = 63;

/// Addressing actually chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedStyle {
    /// `bucket.host/key`.
    VirtualHosted,
    /// `host/bucket/key`.
    Path,
}

/// Host, path and canonical resource of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    /// Host (with port, if the endpoint has one).
    pub host: String,
    /// Encoded request path, always starting with `/`.
    pub path: String,
    /// Bucket-qualified resource for the legacy signature.
    pub canonical_resource: String,
    /// The style that was chosen.
    pub style: ResolvedStyle,
}

/// Check whether a bucket name can be used as a DNS label for virtual hosting.
///
/// # Examples
///
/// ```
/// use objstore_client::addressing::is_dns_compatible_bucket;
///
/// assert!(is_dns_compatible_bucket("my-bucket"));
/// assert!(is_dns_compatible_bucket("my.bucket"));
/// assert!(!is_dns_compatible_bucket("My_Bucket"));
/// assert!(!is_dns_compatible_bucket("192.168.1.1"));
/// ```
#[must_use]
pub fn is_dns_compatible_bucket(name: &str) -> bool {
    let len = name.len();
    if !(MIN_BUCKET_NAME_LEN..=MAX_BUCKET_NAME_LEN).contains(&len) {
        return false;
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return false;
    }

    let bytes = name.as_bytes();
    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !alnum(bytes[0]) || !alnum(bytes[len - 1]) {
        return false;
    }
    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return false;
    }
    name.parse::<Ipv4Addr>().is_err()
}

/// Encode an object key for the request path, keeping `/` literal.
///
/// # Examples
///
/// ```
/// use objstore_client::addressing::encode_key;
///
/// assert_eq!(encode_key("photos/my file+1.jpg"), "photos/my%20file%2B1.jpg");
/// ```
#[must_use]
pub fn encode_key(key: &str) -> String {
    key.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

/// Decide which style to use for `bucket`.
#[must_use]
pub fn choose_style(scheme: Scheme, bucket: &str, requested: AddressingStyle) -> ResolvedStyle {
    if requested == AddressingStyle::Path || !is_dns_compatible_bucket(bucket) {
        return ResolvedStyle::Path;
    }
    if scheme == Scheme::Https && bucket.contains('.') {
        return ResolvedStyle::Path;
    }
    ResolvedStyle::VirtualHosted
}

/// Resolve the host, path and canonical resource for a request.
///
/// # Examples
///
/// ```
/// use objstore_client::addressing::{ResolvedStyle, resolve};
/// use objstore_client::config::AddressingStyle;
/// use objstore_client::endpoint::{Endpoint, Scheme};
///
/// let endpoint = Endpoint::new(Scheme::Https, "s3.amazonaws.com", "us-east-1");
/// let addr = resolve(&endpoint, Some("my.bucket"), Some("a/b.txt"), AddressingStyle::Auto);
/// assert_eq!(addr.style, ResolvedStyle::Path);
/// assert_eq!(addr.host, "s3.amazonaws.com");
/// assert_eq!(addr.path, "/my.bucket/a/b.txt");
/// ```
#[must_use]
pub fn resolve(
    endpoint: &Endpoint,
    bucket: Option<&str>,
    key: Option<&str>,
    requested: AddressingStyle,
) -> ResolvedAddress {
    let Some(bucket) = bucket.filter(|b| !b.is_empty()) else {
        return ResolvedAddress {
            host: endpoint.host().to_owned(),
            path: "/".to_owned(),
            canonical_resource: "/".to_owned(),
            style: ResolvedStyle::Path,
        };
    };

    let encoded_key = key.filter(|k| !k.is_empty()).map(encode_key);
    let style = choose_style(endpoint.scheme(), bucket, requested);

    let (host, path) = match style {
        ResolvedStyle::VirtualHosted => (
            format!("{bucket}.{}", endpoint.host()),
            format!("/{}", encoded_key.as_deref().unwrap_or_default()),
        ),
        ResolvedStyle::Path => (
            endpoint.host().to_owned(),
            match &encoded_key {
                Some(k) => format!("/{bucket}/{k}"),
                None => format!("/{bucket}"),
            },
        ),
    };

    let canonical_resource = match (&encoded_key, style) {
        (Some(k), _) => format!("/{bucket}/{k}"),
        (None, ResolvedStyle::VirtualHosted) => format!("/{bucket}/"),
        (None, ResolvedStyle::Path) => format!("/{bucket}"),
    };

    ResolvedAddress {
        host,
        path,
        canonical_resource,
        style,
    }
}
