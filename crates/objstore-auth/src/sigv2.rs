//! Legacy HMAC-SHA1 request signing.
//!
//! ```text
//! Authorization = "AWS " + AWSAccessKeyId + ":" + Signature
//! Signature     = Base64(HMAC-SHA1(SecretKey, StringToSign))
//!
//! StringToSign  = HTTP-Verb + "\n" +
//!                 Content-MD5 + "\n" +
//!                 Content-Type + "\n" +
//!                 Date + "\n" +
//!                 CanonicalizedAmzHeaders +
//!                 CanonicalizedResource
//! ```
//!
//! The canonicalized resource starts from the path computed by the addressing
//! resolver (`/bucket/key`, `/bucket/` or `/bucket`), followed by the whitelisted
//! sub-resources from the query string.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, KeyInit, Mac};
use http::HeaderMap;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Query parameters that take part in the canonicalized resource, sorted.
pub const SUB_RESOURCES: &[&str] = &[
    "acl",
    "cors",
    "delete",
    "lifecycle",
    "location",
    "logging",
    "notification",
    "partNumber",
    "policy",
    "requestPayment",
    "response-cache-control",
    "response-content-disposition",
    "response-content-encoding",
    "response-content-language",
    "response-content-type",
    "response-expires",
    "restore",
    "tagging",
    "torrent",
    "uploadId",
    "uploads",
    "versionId",
    "versioning",
    "versions",
    "website",
];

/// Build the string to sign.
///
/// When `x-amz-date` is present the Date line is left empty; the date is then
/// covered through the canonicalized amz headers.
#[must_use]
pub fn build_string_to_sign(
    method: &str,
    headers: &HeaderMap,
    canonical_resource: &str,
    query: &[(String, Option<String>)],
) -> String {
    let content_md5 = header_value(headers, "content-md5");
    let content_type = header_value(headers, "content-type");
    let date = if headers.contains_key("x-amz-date") {
        ""
    } else {
        header_value(headers, "date")
    };

    let amz_headers = build_canonicalized_amz_headers(headers);
    let resource = build_canonicalized_resource(canonical_resource, query);

    format!("{method}\n{content_md5}\n{content_type}\n{date}\n{amz_headers}{resource}")
}

/// Build the CanonicalizedAmzHeaders block.
///
/// All `x-amz-*` headers are lowercased, sorted, values trimmed, repeated headers
/// comma-joined; each is written as `name:value\n`.
#[must_use]
pub fn build_canonicalized_amz_headers(headers: &HeaderMap) -> String {
    let mut amz_headers: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (name, value) in headers {
        let name_str = name.as_str();
        if name_str.starts_with("x-amz-") {
            let val = value.to_str().unwrap_or("").trim();
            amz_headers.entry(name_str).or_default().push(val);
        }
    }

    let mut result = String::new();
    for (name, values) in &amz_headers {
        result.push_str(name);
        result.push(':');
        result.push_str(&values.join(","));
        result.push('\n');
    }
    result
}

/// Append whitelisted sub-resources to the resolver's canonical resource.
///
/// A sub-resource is written as `key=value` only when the value is non-blank,
/// otherwise as a bare `key`.
///
/// # Examples
///
/// ```
/// use objstore_auth::sigv2::build_canonicalized_resource;
///
/// let query = vec![
///     ("uploadId".to_owned(), Some("abc".to_owned())),
///     ("partNumber".to_owned(), Some("3".to_owned())),
///     ("prefix".to_owned(), Some("ignored".to_owned())),
/// ];
/// assert_eq!(
///     build_canonicalized_resource("/bucket/key", &query),
///     "/bucket/key?partNumber=3&uploadId=abc"
/// );
/// ```
#[must_use]
pub fn build_canonicalized_resource(
    canonical_resource: &str,
    query: &[(String, Option<String>)],
) -> String {
    let mut sub_params: Vec<(&str, Option<&str>)> = query
        .iter()
        .filter(|(k, _)| SUB_RESOURCES.contains(&k.as_str()))
        .map(|(k, v)| {
            let value = v.as_deref().filter(|v| !v.trim().is_empty());
            (k.as_str(), value)
        })
        .collect();

    if sub_params.is_empty() {
        return canonical_resource.to_owned();
    }

    sub_params.sort_by(|a, b| a.0.cmp(b.0));

    let params_str: Vec<String> = sub_params
        .iter()
        .map(|(k, v)| match v {
            Some(val) => format!("{k}={val}"),
            None => (*k).to_owned(),
        })
        .collect();
    format!("{canonical_resource}?{}", params_str.join("&"))
}

/// Compute `Base64(HMAC-SHA1(secret, string_to_sign))`.
#[must_use]
pub fn compute_signature(secret_key: &str, string_to_sign: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(secret_key.as_bytes()).expect("HMAC can accept any key length");
    mac.update(string_to_sign.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Format the `Authorization` header value.
#[must_use]
pub fn authorization_header(access_key_id: &str, signature: &str) -> String {
    format!("AWS {access_key_id}:{signature}")
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}
