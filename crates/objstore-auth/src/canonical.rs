//! Canonical request construction for the HMAC-SHA256 scheme.
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Characters percent-encoded in URI components: everything except the RFC 3986
/// unreserved set (`A-Z a-z 0-9 - _ . ~`).
pub const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// URI-encode a single component using the unreserved set.
#[must_use]
pub fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, URI_ENCODE_SET).to_string()
}

/// Build the full canonical request string from its components.
///
/// `headers` must already be lowercased and filtered to the signed set.
#[must_use]
pub fn build_canonical_request(
    method: &str,
    path: &str,
    query: &[(String, Option<String>)],
    headers: &BTreeMap<String, String>,
    payload_hash: &str,
) -> String {
    let canonical_uri = build_canonical_uri(path);
    let canonical_query = build_canonical_query_string(query);
    let canonical_headers = build_canonical_headers(headers);
    let signed_headers = build_signed_headers_string(headers);

    format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n\n{signed_headers}\n{payload_hash}"
    )
}

/// Build the canonical URI by re-encoding each path segment.
///
/// Segments are decoded first so an already-encoded key is not encoded twice.
/// Forward slashes are preserved and an empty path becomes `/`.
///
/// # Examples
///
/// ```
/// use objstore_auth::canonical::build_canonical_uri;
///
/// assert_eq!(build_canonical_uri("/photos/a%20b.jpg"), "/photos/a%20b.jpg");
/// assert_eq!(build_canonical_uri(""), "/");
/// ```
#[must_use]
pub fn build_canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    path.split('/')
        .map(|segment| uri_encode(&percent_decode_str(segment).decode_utf8_lossy()))
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the canonical query string from raw (unencoded) parameters.
///
/// Names and values are URI-encoded, then sorted by name and value. A parameter
/// without a value is rendered as `name=`.
///
/// # Examples
///
/// ```
/// use objstore_auth::canonical::build_canonical_query_string;
///
/// let query = vec![
///     ("uploads".to_owned(), None),
///     ("prefix".to_owned(), Some("a b/".to_owned())),
/// ];
/// assert_eq!(build_canonical_query_string(&query), "prefix=a%20b%2F&uploads=");
/// ```
#[must_use]
pub fn build_canonical_query_string(query: &[(String, Option<String>)]) -> String {
    let mut params: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k), uri_encode(v.as_deref().unwrap_or(""))))
        .collect();

    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the canonical headers block (no trailing newline).
#[must_use]
pub fn build_canonical_headers(headers: &BTreeMap<String, String>) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{name}:{}", collapse_whitespace(value.trim())))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Semicolon-separated list of the signed header names, sorted.
#[must_use]
pub fn build_signed_headers_string(headers: &BTreeMap<String, String>) -> String {
    headers.keys().map(String::as_str).collect::<Vec<_>>().join(";")
}

fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    result
}
