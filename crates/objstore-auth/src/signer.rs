//! The single signing entry point used by the request pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use http::header::{AUTHORIZATION, HeaderValue};
use http::HeaderMap;
use tracing::debug;

use crate::canonical::{build_canonical_request, build_signed_headers_string};
use crate::credentials::Credentials;
use crate::error::AuthError;
use crate::{sigv2, sigv4};

/// Header carrying the session token of temporary credentials.
pub const SECURITY_TOKEN_HEADER: &str = "x-amz-security-token";
/// Header carrying the payload hash for the HMAC-SHA256 scheme.
pub const CONTENT_SHA256_HEADER: &str = "x-amz-content-sha256";
/// Header carrying the request timestamp for the HMAC-SHA256 scheme.
pub const AMZ_DATE_HEADER: &str = "x-amz-date";

/// Which signing scheme to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningScheme {
    /// Legacy HMAC-SHA1 scheme.
    V2,
    /// Region-scoped HMAC-SHA256 scheme.
    V4 {
        /// Region of the credential scope.
        region: String,
    },
}

/// Payload hash for the HMAC-SHA256 scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadHash {
    /// Hex SHA-256 of the complete body.
    Hashed(String),
    /// The body is streamed or of unknown length.
    Unsigned,
}

impl PayloadHash {
    /// Hash an in-memory body.
    #[must_use]
    pub fn of(body: &[u8]) -> Self {
        Self::Hashed(sigv4::hash_payload(body))
    }

    /// Header value for `x-amz-content-sha256`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Hashed(h) => h,
            Self::Unsigned => sigv4::UNSIGNED_PAYLOAD,
        }
    }
}

/// The request parts that take part in the signature.
///
/// `path` is the encoded path as sent on the wire and `canonical_resource` is the
/// resolver's bucket-qualified resource used by the legacy scheme.
#[derive(Debug, Clone, Copy)]
pub struct SignableRequest<'a> {
    /// HTTP method.
    pub method: &'a str,
    /// Host the request is sent to (virtual-hosted or base host).
    pub host: &'a str,
    /// Encoded request path.
    pub path: &'a str,
    /// Raw query parameters.
    pub query: &'a [(String, Option<String>)],
    /// Canonical resource produced by the addressing resolver.
    pub canonical_resource: &'a str,
    /// Payload hash (ignored by the legacy scheme).
    pub payload: &'a PayloadHash,
}

/// Result of signing, kept for debug traces.
#[derive(Debug, Clone)]
pub struct SigningOutput {
    /// The `Authorization` header value written into the headers.
    pub authorization: String,
    /// The string that was signed.
    pub string_to_sign: String,
    /// The canonical request (HMAC-SHA256 scheme only).
    pub canonical_request: Option<String>,
}

/// Sign a request, writing the `Authorization` header (and the date, session token and
/// payload hash headers it depends on) into `headers`.
///
/// A date header is injected only when none is present, so signing the same header
/// map twice yields the same signature.
///
/// # Errors
///
/// Returns [`AuthError`] when the credential is incomplete, a region is missing for
/// the region-scoped scheme, or a header value is not representable.
pub fn sign(
    request: &SignableRequest<'_>,
    headers: &mut HeaderMap,
    credentials: &Credentials,
    scheme: &SigningScheme,
    now: DateTime<Utc>,
) -> Result<SigningOutput, AuthError> {
    credentials.validate()?;
    if let SigningScheme::V4 { region } = scheme {
        if region.is_empty() {
            return Err(AuthError::MissingRegion);
        }
    }

    headers.remove(AUTHORIZATION);
    if let Some(token) = &credentials.session_token {
        headers.insert(SECURITY_TOKEN_HEADER, header_value(SECURITY_TOKEN_HEADER, token)?);
    }
    normalize_date(headers, scheme, now)?;

    let output = match scheme {
        SigningScheme::V2 => {
            let string_to_sign = sigv2::build_string_to_sign(
                request.method,
                headers,
                request.canonical_resource,
                request.query,
            );
            let signature =
                sigv2::compute_signature(&credentials.secret_access_key, &string_to_sign);
            SigningOutput {
                authorization: sigv2::authorization_header(&credentials.access_key_id, &signature),
                string_to_sign,
                canonical_request: None,
            }
        }
        SigningScheme::V4 { region } => {
            headers.insert(
                CONTENT_SHA256_HEADER,
                header_value(CONTENT_SHA256_HEADER, request.payload.as_str())?,
            );
            sign_v4(request, headers, credentials, region)?
        }
    };

    headers.insert(AUTHORIZATION, header_value("authorization", &output.authorization)?);
    debug!(
        method = %request.method,
        host = %request.host,
        resource = %request.canonical_resource,
        string_to_sign = ?output.string_to_sign,
        "signed request"
    );
    Ok(output)
}

/// Format a timestamp as an RFC 1123 HTTP date.
#[must_use]
pub fn format_http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Format a timestamp in ISO 8601 basic format (`YYYYMMDDTHHMMSSZ`).
#[must_use]
pub fn format_amz_date(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

fn normalize_date(
    headers: &mut HeaderMap,
    scheme: &SigningScheme,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    match scheme {
        SigningScheme::V2 => {
            if !headers.contains_key(http::header::DATE) && !headers.contains_key(AMZ_DATE_HEADER) {
                headers.insert(
                    http::header::DATE,
                    header_value("date", &format_http_date(now))?,
                );
            }
        }
        SigningScheme::V4 { .. } => {
            if !headers.contains_key(AMZ_DATE_HEADER) {
                headers.insert(
                    AMZ_DATE_HEADER,
                    header_value(AMZ_DATE_HEADER, &format_amz_date(now))?,
                );
            }
        }
    }
    Ok(())
}

fn sign_v4(
    request: &SignableRequest<'_>,
    headers: &HeaderMap,
    credentials: &Credentials,
    region: &str,
) -> Result<SigningOutput, AuthError> {
    let timestamp = headers
        .get(AMZ_DATE_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.len() >= 8 && v.is_char_boundary(8))
        .ok_or_else(|| AuthError::InvalidHeaderValue(AMZ_DATE_HEADER.to_owned()))?
        .to_owned();
    let date = &timestamp[..8];

    let signed = signed_headers(request.host, headers)?;
    let canonical_request = build_canonical_request(
        request.method,
        request.path,
        request.query,
        &signed,
        request.payload.as_str(),
    );
    let scope = sigv4::credential_scope(date, region);
    let string_to_sign = sigv4::build_string_to_sign(
        &timestamp,
        &scope,
        &sigv4::hash_payload(canonical_request.as_bytes()),
    );
    let signing_key = sigv4::derive_signing_key(&credentials.secret_access_key, date, region);
    let signature = sigv4::compute_signature(&signing_key, &string_to_sign);

    Ok(SigningOutput {
        authorization: sigv4::authorization_header(
            &credentials.access_key_id,
            &scope,
            &build_signed_headers_string(&signed),
            &signature,
        ),
        string_to_sign,
        canonical_request: Some(canonical_request),
    })
}

/// Select the headers covered by the HMAC-SHA256 signature: `host`, `content-md5`,
/// `content-type`, `range` and every `x-amz-*` header.
fn signed_headers(host: &str, headers: &HeaderMap) -> Result<BTreeMap<String, String>, AuthError> {
    let mut signed = BTreeMap::new();
    signed.insert("host".to_owned(), host.to_owned());

    for (name, value) in headers {
        let name = name.as_str();
        let covered = matches!(name, "content-md5" | "content-type" | "range")
            || name.starts_with("x-amz-");
        if !covered {
            continue;
        }
        let value = value
            .to_str()
            .map_err(|_| AuthError::InvalidHeaderValue(name.to_owned()))?;
        signed
            .entry(name.to_owned())
            .and_modify(|existing: &mut String| {
                existing.push(',');
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_owned());
    }
    Ok(signed)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, AuthError> {
    HeaderValue::from_str(value).map_err(|_| AuthError::InvalidHeaderValue(name.to_owned()))
}
