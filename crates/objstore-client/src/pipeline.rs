//! Per-attempt request preparation.
//!
//! Every attempt runs the same ordered steps over a fresh copy of the descriptor's
//! headers and a freshly resolved body:
//!
//! 1. [`PipelineStep::ResolveAddressing`]: host, path and canonical resource.
//! 2. [`PipelineStep::AttachAcl`]: `x-amz-acl`.
//! 3. [`PipelineStep::AttachContentMd5`]: `Content-MD5` of the body.
//! 4. [`PipelineStep::Sign`]: date, session token, payload hash and `Authorization`.
//!
//! Signing is last so that it covers every header the earlier steps add.

use chrono::{DateTime, Utc};
use http::header::{CONTENT_LENGTH, HOST, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use objstore_auth::canonical::uri_encode;
use objstore_auth::{Credentials, PayloadHash, SignableRequest, SigningOutput, SigningScheme, sign};
use tracing::debug;

const CONTENT_MD5: HeaderName = HeaderName::from_static("content-md5");

use crate::addressing::{ResolvedAddress, resolve};
use crate::checksums::{content_md5, digest_file_range};
use crate::config::{ClientConfig, SignatureVersion};
use crate::endpoint::Endpoint;
use crate::error::ClientError;
use crate::request::{Body, RequestDescriptor};
use crate::transport::{HttpRequest, RequestBody};

/// Header carrying the canned ACL.
pub const ACL_HEADER: &str = "x-amz-acl";

/// One preparation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    /// Choose the addressing style and compute host, path and canonical resource.
    ResolveAddressing,
    /// Attach the canned ACL header.
    AttachAcl,
    /// Attach `Content-MD5` when the descriptor asks for it.
    AttachContentMd5,
    /// Sign the request.
    Sign,
}

/// The steps in execution order.
pub const PIPELINE: [PipelineStep; 4] = [
    PipelineStep::ResolveAddressing,
    PipelineStep::AttachAcl,
    PipelineStep::AttachContentMd5,
    PipelineStep::Sign,
];

/// Inputs shared by all steps of one attempt.
#[derive(Debug, Clone, Copy)]
pub struct PipelineContext<'a> {
    /// Endpoint for this attempt (may differ from the configured one after a redirect).
    pub endpoint: &'a Endpoint,
    /// Client configuration.
    pub config: &'a ClientConfig,
    /// Credentials to sign with.
    pub credentials: &'a Credentials,
    /// Signing time.
    pub now: DateTime<Utc>,
}

/// A request that went through every step and is ready to send.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// HTTP method.
    pub method: Method,
    /// Resolved address.
    pub address: ResolvedAddress,
    /// Absolute URL.
    pub url: String,
    /// Final headers.
    pub headers: HeaderMap,
    /// Body to send.
    pub body: RequestBody,
    /// Signature details.
    pub signing: SigningOutput,
}

impl From<PreparedRequest> for HttpRequest {
    fn from(value: PreparedRequest) -> Self {
        Self {
            method: value.method,
            url: value.url,
            headers: value.headers,
            body: value.body,
        }
    }
}

/// Mutable state threaded through the steps.
#[derive(Debug)]
struct Attempt {
    headers: HeaderMap,
    body: RequestBody,
    payload: PayloadHash,
    content_md5: Option<String>,
    address: Option<ResolvedAddress>,
    signing: Option<SigningOutput>,
}

/// Run the pipeline for one attempt.
///
/// # Errors
///
/// Returns [`ClientError::Io`] when a file body cannot be read and
/// [`ClientError::Signing`] when signing fails.
pub async fn prepare(
    descriptor: &RequestDescriptor,
    ctx: &PipelineContext<'_>,
) -> Result<PreparedRequest, ClientError> {
    let body = descriptor.body.resolve().await?;
    let streaming = matches!(&descriptor.body, Body::File(f) if f.length.is_none());
    let wants_sha256 = ctx.config.signature_version == SignatureVersion::V4
        && !ctx.config.unsigned_payload
        && !streaming;
    let (payload, md5) = match &body {
        RequestBody::Bytes(bytes) => (
            if wants_sha256 {
                PayloadHash::of(bytes)
            } else {
                PayloadHash::Unsigned
            },
            descriptor.compute_content_md5.then(|| content_md5(bytes)),
        ),
        RequestBody::File { path, offset, len } => {
            let digests = digest_file_range(
                path,
                *offset,
                *len,
                descriptor.compute_content_md5,
                wants_sha256,
            )
            .await?;
            (
                digests.sha256.map_or(PayloadHash::Unsigned, PayloadHash::Hashed),
                digests.content_md5,
            )
        }
    };

    let mut headers = descriptor.headers.clone();
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

    let mut attempt = Attempt {
        headers,
        body,
        payload,
        content_md5: md5,
        address: None,
        signing: None,
    };
    for step in PIPELINE {
        apply(step, descriptor, ctx, &mut attempt)?;
    }

    let (Some(address), Some(signing)) = (attempt.address, attempt.signing) else {
        return Err(ClientError::InvalidArgument(
            "request pipeline finished without an address or signature".to_owned(),
        ));
    };
    let url = format!(
        "{}://{}{}{}",
        ctx.endpoint.scheme(),
        address.host,
        address.path,
        encode_query(&descriptor.query)
    );
    if ctx.config.debug {
        debug!(
            operation = %descriptor.operation,
            %url,
            canonical_request = ?signing.canonical_request,
            string_to_sign = ?signing.string_to_sign,
            "prepared request"
        );
    }

    Ok(PreparedRequest {
        method: descriptor.method.clone(),
        address,
        url,
        headers: attempt.headers,
        body: attempt.body,
        signing,
    })
}

fn apply(
    step: PipelineStep,
    descriptor: &RequestDescriptor,
    ctx: &PipelineContext<'_>,
    attempt: &mut Attempt,
) -> Result<(), ClientError> {
    match step {
        PipelineStep::ResolveAddressing => {
            let style = descriptor.addressing.unwrap_or(ctx.config.addressing_style);
            let address = resolve(
                ctx.endpoint,
                descriptor.bucket.as_deref(),
                descriptor.key.as_deref(),
                style,
            );
            attempt.headers.insert(HOST, to_header_value(&address.host)?);
            attempt.address = Some(address);
        }
        PipelineStep::AttachAcl => {
            if let Some(acl) = descriptor.acl {
                attempt
                    .headers
                    .insert(ACL_HEADER, HeaderValue::from_static(acl.as_str()));
            }
        }
        PipelineStep::AttachContentMd5 => {
            if let Some(md5) = &attempt.content_md5 {
                attempt.headers.insert(CONTENT_MD5, to_header_value(md5)?);
            }
        }
        PipelineStep::Sign => {
            let address = attempt.address.as_ref().ok_or_else(|| {
                ClientError::InvalidArgument("cannot sign an unresolved request".to_owned())
            })?;
            let scheme = match ctx.config.signature_version {
                SignatureVersion::V2 => SigningScheme::V2,
                SignatureVersion::V4 => SigningScheme::V4 {
                    region: ctx.endpoint.region().to_owned(),
                },
            };
            let signable = SignableRequest {
                method: descriptor.method.as_str(),
                host: &address.host,
                path: &address.path,
                query: &descriptor.query,
                canonical_resource: &address.canonical_resource,
                payload: &attempt.payload,
            };
            let output = sign(&signable, &mut attempt.headers, ctx.credentials, &scheme, ctx.now)?;
            attempt.signing = Some(output);
        }
    }
    Ok(())
}

/// Encode query parameters in insertion order, with a leading `?` when non-empty.
#[must_use]
pub fn encode_query<K, V>(query: &[(K, Option<V>)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    if query.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = query
        .iter()
        .map(|(k, v)| match v {
            Some(v) => format!("{}={}", uri_encode(k.as_ref()), uri_encode(v.as_ref())),
            None => uri_encode(k.as_ref()),
        })
        .collect();
    format!("?{}", pairs.join("&"))
}

fn to_header_value(value: &str) -> Result<HeaderValue, ClientError> {
    HeaderValue::from_str(value)
        .map_err(|_| ClientError::InvalidArgument(format!("invalid header value: {value}")))
}
