//! In-process object store for tests.
//!
//! [`MemoryObjectStore`] implements [`HttpTransport`] by parsing each signed request
//! and answering it from in-memory state, the way a real service would: virtual-hosted
//! and path-style addressing, error documents with the service's codes, ranged GETs,
//! paginated listings and multipart bookkeeping. Every request is recorded, and faults
//! can be injected per request pattern to exercise the client's retry paths.

mod fault;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{AUTHORIZATION, HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use objstore_auth::signer::SECURITY_TOKEN_HEADER;
use objstore_model::types::{
    Bucket, CommonPrefix, CompleteMultipartUpload, CompleteMultipartUploadResult,
    CopyObjectResult, CreateBucketConfiguration, Delete, DeleteResult, DeletedObject,
    InitiateMultipartUploadResult, ListBucketsResult, ListMultipartUploadsResult,
    ListObjectsV2Result, ListPartsResult, MultipartUpload, Object, Part,
};
use objstore_model::{ErrorResponse, codes};
use objstore_xml::{XmlDeserialize, XmlSerialize, error_to_xml, from_xml, to_xml};
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use tracing::debug;

pub use fault::{FaultResponse, RequestMatcher};

use self::fault::Fault;
use crate::checksums::{content_md5, md5_hex, multipart_etag, unquote_etag};
use crate::endpoint::{Endpoint, Scheme};
use crate::retry::SOCKET_TIMEOUT_PHRASE;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, RequestBody, TransportError};

const DEFAULT_MAX_KEYS: usize = 1000;
const DEFAULT_REGION: &str = "us-east-1";

/// A request as seen by the store.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: Method,
    /// Full URL.
    pub url: String,
    /// Host the request was sent to.
    pub host: String,
    /// Bucket, from the host (virtual-hosted) or the first path segment.
    pub bucket: Option<String>,
    /// Decoded key.
    pub key: Option<String>,
    /// Decoded query parameters; bare flags map to an empty value.
    pub query: BTreeMap<String, String>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
}

impl RecordedRequest {
    /// Value of a header as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

type RequestHook = Arc<dyn Fn(&RecordedRequest) + Send + Sync>;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    e_tag: String,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
    metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct StoredUpload {
    key: String,
    initiated: DateTime<Utc>,
    content_type: Option<String>,
    parts: BTreeMap<u32, (Bytes, String)>,
}

#[derive(Debug)]
struct StoredBucket {
    created: DateTime<Utc>,
    region: String,
    objects: BTreeMap<String, StoredObject>,
    uploads: BTreeMap<String, StoredUpload>,
    policy: Option<String>,
}

impl StoredBucket {
    fn new(region: String) -> Self {
        Self {
            created: Utc::now(),
            region,
            objects: BTreeMap::new(),
            uploads: BTreeMap::new(),
            policy: None,
        }
    }
}

/// An in-memory, S3-compatible [`HttpTransport`].
pub struct MemoryObjectStore {
    endpoint: Endpoint,
    buckets: Mutex<BTreeMap<String, StoredBucket>>,
    faults: Mutex<Vec<Fault>>,
    requests: Mutex<Vec<RecordedRequest>>,
    expired_tokens: Mutex<HashSet<String>>,
    hook: Mutex<Option<RequestHook>>,
}

impl std::fmt::Debug for MemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryObjectStore")
            .field("host", &self.endpoint.host())
            .field("bucket_count", &self.buckets.lock().len())
            .field("recorded_requests", &self.requests.lock().len())
            .finish_non_exhaustive()
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    /// A store serving `s3.amazonaws.com`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_host("s3.amazonaws.com")
    }

    /// A store whose path-style host is `host`. Subdomains of it, and of the known
    /// regional hosts, address buckets virtual-hosted style.
    #[must_use]
    pub fn with_base_host(host: &str) -> Self {
        Self {
            endpoint: Endpoint::new(Scheme::Https, host, DEFAULT_REGION),
            buckets: Mutex::new(BTreeMap::new()),
            faults: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            expired_tokens: Mutex::new(HashSet::new()),
            hook: Mutex::new(None),
        }
    }

    // -- Fixtures -----------------------------------------------------------

    /// Create a bucket directly, bypassing the request path.
    pub fn create_bucket_raw(&self, bucket: &str) {
        self.buckets
            .lock()
            .entry(bucket.to_owned())
            .or_insert_with(|| StoredBucket::new(DEFAULT_REGION.to_owned()));
    }

    /// Store an object directly, creating its bucket if needed.
    pub fn put_raw(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        let data = data.into();
        let object = StoredObject {
            e_tag: format!("\"{}\"", md5_hex(&data)),
            data,
            content_type: None,
            last_modified: Utc::now(),
            metadata: BTreeMap::new(),
        };
        self.buckets
            .lock()
            .entry(bucket.to_owned())
            .or_insert_with(|| StoredBucket::new(DEFAULT_REGION.to_owned()))
            .objects
            .insert(key.to_owned(), object);
    }

    /// Read an object directly.
    #[must_use]
    pub fn get_raw(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.buckets
            .lock()
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|o| o.data.clone())
    }

    /// Stored ETag of an object.
    #[must_use]
    pub fn etag_raw(&self, bucket: &str, key: &str) -> Option<String> {
        self.buckets
            .lock()
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|o| o.e_tag.clone())
    }

    /// Keys of a bucket, in order.
    #[must_use]
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .lock()
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Ids of the in-progress multipart uploads of a bucket.
    #[must_use]
    pub fn list_uploads(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .lock()
            .get(bucket)
            .map(|b| b.uploads.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Attach a policy document to a bucket.
    pub fn set_bucket_policy(&self, bucket: &str, policy: &str) {
        if let Some(b) = self.buckets.lock().get_mut(bucket) {
            b.policy = Some(policy.to_owned());
        }
    }

    // -- Faults and inspection ----------------------------------------------

    /// Answer the next `times` requests selected by `matcher` with `response`.
    pub fn inject(&self, matcher: RequestMatcher, response: FaultResponse, times: usize) {
        self.faults.lock().push(Fault {
            matcher,
            response,
            remaining: times,
        });
    }

    /// Reject requests signed with this session token as expired.
    pub fn expire_session_token(&self, token: &str) {
        self.expired_tokens.lock().insert(token.to_owned());
    }

    /// Run `hook` on every request before it is answered.
    pub fn on_request<F>(&self, hook: F)
    where
        F: Fn(&RecordedRequest) + Send + Sync + 'static,
    {
        *self.hook.lock() = Some(Arc::new(hook));
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Requests received so far with this method.
    #[must_use]
    pub fn requests_with(&self, method: &Method) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == *method)
            .cloned()
            .collect()
    }

    /// Forget the recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    // -- Request handling ---------------------------------------------------

    fn parse(&self, request: HttpRequest, body: Bytes) -> RecordedRequest {
        let without_scheme = request
            .url
            .split_once("://")
            .map_or(request.url.as_str(), |(_, rest)| rest);
        let (host, path_and_query) = match without_scheme.find('/') {
            Some(i) => without_scheme.split_at(i),
            None => (without_scheme, "/"),
        };
        let (path, query) = path_and_query
            .split_once('?')
            .unwrap_or((path_and_query, ""));

        let query = query
            .split('&')
            .filter(|p| !p.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(k), decode(v))
            })
            .collect();

        let path = path.strip_prefix('/').unwrap_or(path);
        let (bucket, key) = match self.endpoint.bucket_from_host(host) {
            Some(bucket) => (Some(bucket), Some(decode(path))),
            None => match path.split_once('/') {
                Some((bucket, key)) => (Some(decode(bucket)), Some(decode(key))),
                None => ((!path.is_empty()).then(|| decode(path)), None),
            },
        };

        RecordedRequest {
            method: request.method,
            host: host.to_owned(),
            url: request.url,
            bucket,
            key: key.filter(|k| !k.is_empty()),
            query,
            headers: request.headers,
            body,
        }
    }

    fn take_fault(&self, request: &RecordedRequest) -> Option<FaultResponse> {
        let mut faults = self.faults.lock();
        let fault = faults
            .iter_mut()
            .find(|f| f.remaining > 0 && f.matcher.matches(request))?;
        fault.remaining -= 1;
        Some(fault.response.clone())
    }

    fn check_auth(&self, request: &RecordedRequest) -> Result<(), HttpResponse> {
        if !request.headers.contains_key(AUTHORIZATION) {
            return Err(error(403, codes::ACCESS_DENIED, "Access Denied", None));
        }
        if let Some(token) = request.header(SECURITY_TOKEN_HEADER) {
            if self.expired_tokens.lock().contains(token) {
                return Err(error(
                    400,
                    codes::EXPIRED_TOKEN,
                    "The provided token has expired.",
                    None,
                ));
            }
        }
        if let Some(md5) = request.header("content-md5") {
            if md5 != content_md5(&request.body) {
                return Err(error(
                    400,
                    codes::BAD_DIGEST,
                    "The Content-MD5 you specified did not match what we received.",
                    None,
                ));
            }
        }
        Ok(())
    }

    fn handle(&self, request: &RecordedRequest) -> HttpResponse {
        if let Err(response) = self.check_auth(request) {
            return response;
        }
        let Some(bucket) = request.bucket.as_deref() else {
            return match request.method {
                Method::GET => self.list_buckets(),
                _ => error(405, "MethodNotAllowed", "The method is not allowed", None),
            };
        };
        if request.method == Method::PUT && request.key.is_none() {
            return self.create_bucket(bucket, request);
        }

        let mut buckets = self.buckets.lock();
        let Some(state) = buckets.get_mut(bucket) else {
            return not_found(
                request,
                codes::NO_SUCH_BUCKET,
                "The specified bucket does not exist",
                bucket,
            );
        };

        let q = &request.query;
        match (&request.method, request.key.as_deref()) {
            (&Method::HEAD, None) => {
                let mut response = empty(200);
                set_header(&mut response.headers, "x-amz-bucket-region", &state.region);
                response
            }
            (&Method::DELETE, None) => {
                if !state.objects.is_empty() || !state.uploads.is_empty() {
                    return error(
                        409,
                        codes::BUCKET_NOT_EMPTY,
                        "The bucket you tried to delete is not empty",
                        Some(bucket),
                    );
                }
                buckets.remove(bucket);
                empty(204)
            }
            (&Method::GET, None) if q.contains_key("policy") => match &state.policy {
                Some(policy) => with_body(200, Bytes::from(policy.clone())),
                None => error(
                    404,
                    codes::NO_SUCH_BUCKET_POLICY,
                    "The bucket policy does not exist",
                    Some(bucket),
                ),
            },
            (&Method::GET, None) if q.contains_key("uploads") => list_uploads(bucket, state, q),
            (&Method::GET, None) => list_objects(bucket, state, q),
            (&Method::POST, None) if q.contains_key("delete") => {
                delete_objects(state, &request.body)
            }
            (&Method::PUT, Some(key)) if q.contains_key("partNumber") => {
                upload_part(state, key, request)
            }
            (&Method::PUT, Some(key)) if request.headers.contains_key("x-amz-copy-source") => {
                copy_object(&mut buckets, bucket, key, request)
            }
            (&Method::PUT, Some(key)) => put_object(state, key, request),
            (&Method::GET, Some(key)) if q.contains_key("uploadId") => {
                list_parts(bucket, state, key, q)
            }
            (&Method::GET | &Method::HEAD, Some(key)) => get_object(state, key, request),
            (&Method::DELETE, Some(key)) if q.contains_key("uploadId") => {
                match state.uploads.remove(&q["uploadId"]) {
                    Some(_) => empty(204),
                    None => no_such_upload(key),
                }
            }
            (&Method::DELETE, Some(key)) => {
                state.objects.remove(key);
                empty(204)
            }
            (&Method::POST, Some(key)) if q.contains_key("uploads") => {
                create_upload(bucket, state, key, request)
            }
            (&Method::POST, Some(key)) if q.contains_key("uploadId") => {
                let location = format!("https://{}/{bucket}/{key}", self.endpoint.host());
                complete_upload(bucket, state, key, &q["uploadId"], &request.body, location)
            }
            _ => error(405, "MethodNotAllowed", "The method is not allowed", None),
        }
    }

    fn list_buckets(&self) -> HttpResponse {
        let result = ListBucketsResult {
            buckets: self
                .buckets
                .lock()
                .iter()
                .map(|(name, b)| Bucket {
                    name: name.clone(),
                    creation_date: Some(b.created),
                })
                .collect(),
        };
        xml(200, "ListAllMyBucketsResult", &result)
    }

    fn create_bucket(&self, bucket: &str, request: &RecordedRequest) -> HttpResponse {
        let region = if request.body.is_empty() {
            DEFAULT_REGION.to_owned()
        } else {
            match parse::<CreateBucketConfiguration>(&request.body) {
                Ok(config) => config
                    .location_constraint
                    .unwrap_or_else(|| DEFAULT_REGION.to_owned()),
                Err(response) => return response,
            }
        };
        let mut buckets = self.buckets.lock();
        if buckets.contains_key(bucket) {
            return error(
                409,
                codes::BUCKET_ALREADY_OWNED_BY_YOU,
                "Your previous request to create the named bucket succeeded and you already own it.",
                Some(bucket),
            );
        }
        debug!(bucket, %region, "memory store: bucket created");
        buckets.insert(bucket.to_owned(), StoredBucket::new(region));
        empty(200)
    }
}

#[async_trait]
impl HttpTransport for MemoryObjectStore {
    async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let body = std::mem::take(&mut request.body)
            .collect()
            .await
            .map_err(|e| TransportError::Other(format!("failed to read request body: {e}")))?;
        let request = self.parse(request, body);
        self.requests.lock().push(request.clone());
        let hook = self.hook.lock().clone();
        if let Some(hook) = hook {
            hook(&request);
        }

        match self.take_fault(&request) {
            None => Ok(self.handle(&request)),
            Some(FaultResponse::Status(status, code)) => {
                Ok(error(status, &code, "Injected failure", None))
            }
            Some(FaultResponse::SocketTimeout) => Ok(error(
                400,
                codes::REQUEST_TIMEOUT,
                &format!(
                    "{SOCKET_TIMEOUT_PHRASE} was not read from or written to within the timeout period."
                ),
                None,
            )),
            Some(FaultResponse::ExpiredToken) => Ok(error(
                400,
                codes::EXPIRED_TOKEN,
                "The provided token has expired.",
                None,
            )),
            Some(FaultResponse::Transport(e)) => Err(e),
            Some(FaultResponse::TransportAfterApply(e)) => {
                let _ = self.handle(&request);
                Err(e)
            }
            Some(FaultResponse::Redirect { host, region }) => {
                let mut response = empty(307);
                let path = request
                    .url
                    .split_once("://")
                    .and_then(|(_, rest)| rest.find('/').map(|i| rest[i..].to_owned()))
                    .unwrap_or_else(|| "/".to_owned());
                set_header(&mut response.headers, "location", &format!("https://{host}{path}"));
                if let Some(region) = region {
                    set_header(&mut response.headers, "x-amz-bucket-region", &region);
                }
                Ok(response)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

fn put_object(state: &mut StoredBucket, key: &str, request: &RecordedRequest) -> HttpResponse {
    let data = request.body.clone();
    let e_tag = format!("\"{}\"", md5_hex(&data));
    let metadata = request
        .headers
        .iter()
        .filter_map(|(name, value)| {
            let name = name.as_str().strip_prefix("x-amz-meta-")?;
            Some((name.to_owned(), value.to_str().ok()?.to_owned()))
        })
        .collect();
    state.objects.insert(
        key.to_owned(),
        StoredObject {
            data,
            e_tag: e_tag.clone(),
            content_type: request.header("content-type").map(str::to_owned),
            last_modified: Utc::now(),
            metadata,
        },
    );
    let mut response = empty(200);
    set_header(&mut response.headers, "etag", &e_tag);
    response
}

fn get_object(state: &StoredBucket, key: &str, request: &RecordedRequest) -> HttpResponse {
    let Some(object) = state.objects.get(key) else {
        return not_found(request, codes::NO_SUCH_KEY, "The specified key does not exist.", key);
    };
    let total = object.data.len();

    let range = match request.header("range").map(|r| parse_range(r, total)) {
        None => None,
        Some(Some(range)) => Some(range),
        Some(None) => {
            return error(
                416,
                codes::INVALID_RANGE,
                "The requested range is not satisfiable",
                Some(key),
            );
        }
    };
    let (status, body) = match range {
        Some((start, end)) => (206, object.data.slice(start..=end)),
        None => (200, object.data.clone()),
    };

    let mut response = if request.method == Method::HEAD {
        empty(status)
    } else {
        with_body(status, body.clone())
    };
    let headers = &mut response.headers;
    set_header(headers, "content-length", &body.len().to_string());
    set_header(headers, "etag", &object.e_tag);
    set_header(
        headers,
        "last-modified",
        &object.last_modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
    );
    if let Some(ct) = &object.content_type {
        set_header(headers, "content-type", ct);
    }
    if let Some((start, end)) = range {
        set_header(headers, "content-range", &format!("bytes {start}-{end}/{total}"));
    }
    for (name, value) in &object.metadata {
        set_header(headers, &format!("x-amz-meta-{name}"), value);
    }
    response
}

/// Parse `bytes=start-end` / `bytes=start-` against an object of `len` bytes into an
/// inclusive range, or `None` when it is not satisfiable.
fn parse_range(header: &str, len: usize) -> Option<(usize, usize)> {
    let bounds = header.strip_prefix("bytes=")?;
    let (start, end) = bounds.split_once('-')?;
    let start: usize = start.parse().ok()?;
    if start >= len {
        return None;
    }
    let end = match end {
        "" => len - 1,
        e => e.parse::<usize>().ok()?.min(len - 1),
    };
    (start <= end).then_some((start, end))
}

fn copy_object(
    buckets: &mut BTreeMap<String, StoredBucket>,
    bucket: &str,
    key: &str,
    request: &RecordedRequest,
) -> HttpResponse {
    let source = request.header("x-amz-copy-source").unwrap_or_default();
    let source = decode(source.strip_prefix('/').unwrap_or(source));
    let Some((src_bucket, src_key)) = source.split_once('/') else {
        return error(
            400,
            "InvalidArgument",
            "Copy Source must mention the source bucket and key",
            None,
        );
    };
    let Some(src) = buckets.get(src_bucket) else {
        return error(
            404,
            codes::NO_SUCH_BUCKET,
            "The specified bucket does not exist",
            Some(src_bucket),
        );
    };
    let Some(object) = src.objects.get(src_key).cloned() else {
        return error(404, codes::NO_SUCH_KEY, "The specified key does not exist.", Some(src_key));
    };
    let result = CopyObjectResult {
        e_tag: Some(object.e_tag.clone()),
        last_modified: Some(Utc::now()),
    };
    if let Some(dest) = buckets.get_mut(bucket) {
        dest.objects.insert(
            key.to_owned(),
            StoredObject {
                last_modified: Utc::now(),
                ..object
            },
        );
    }
    xml(200, "CopyObjectResult", &result)
}

fn delete_objects(state: &mut StoredBucket, body: &[u8]) -> HttpResponse {
    let delete: Delete = match parse(body) {
        Ok(d) => d,
        Err(response) => return response,
    };
    let deleted = delete
        .objects
        .into_iter()
        .map(|o| {
            state.objects.remove(&o.key);
            DeletedObject { key: o.key }
        })
        .collect();
    xml(
        200,
        "DeleteResult",
        &DeleteResult {
            deleted,
            errors: Vec::new(),
        },
    )
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

fn list_objects(bucket: &str, state: &StoredBucket, q: &BTreeMap<String, String>) -> HttpResponse {
    let prefix = q.get("prefix").map_or("", String::as_str);
    let delimiter = q.get("delimiter").map_or("", String::as_str);
    let max_keys = q
        .get("max-keys")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_KEYS);
    let resume_after = match q.get("continuation-token") {
        Some(token) => match hex::decode(token).ok().and_then(|b| String::from_utf8(b).ok()) {
            Some(marker) => Some(marker),
            None => {
                return error(
                    400,
                    "InvalidArgument",
                    "The continuation token provided is incorrect",
                    None,
                );
            }
        },
        None => q.get("start-after").cloned(),
    };

    let mut contents = Vec::new();
    let mut common_prefixes: Vec<String> = Vec::new();
    let mut last_marker: Option<String> = None;
    let mut is_truncated = false;

    for (key, object) in &state.objects {
        if let Some(after) = &resume_after {
            let inside_emitted_prefix = !delimiter.is_empty()
                && after.ends_with(delimiter)
                && key.starts_with(after.as_str());
            if key.as_str() <= after.as_str() || inside_emitted_prefix {
                continue;
            }
        }
        if !key.starts_with(prefix) {
            continue;
        }

        let rest = &key[prefix.len()..];
        let group = (!delimiter.is_empty())
            .then(|| {
                rest.find(delimiter)
                    .map(|pos| format!("{prefix}{}{delimiter}", &rest[..pos]))
            })
            .flatten();
        if group.as_ref().is_some_and(|g| common_prefixes.last() == Some(g)) {
            continue;
        }
        if contents.len() + common_prefixes.len() >= max_keys {
            is_truncated = true;
            break;
        }
        match group {
            Some(g) => {
                last_marker = Some(g.clone());
                common_prefixes.push(g);
            }
            None => {
                last_marker = Some(key.clone());
                contents.push(Object {
                    key: key.clone(),
                    last_modified: Some(object.last_modified),
                    e_tag: Some(object.e_tag.clone()),
                    size: object.data.len() as u64,
                    storage_class: Some("STANDARD".to_owned()),
                });
            }
        }
    }

    let key_count = contents.len() + common_prefixes.len();
    let result = ListObjectsV2Result {
        name: bucket.to_owned(),
        prefix: Some(prefix.to_owned()),
        delimiter: (!delimiter.is_empty()).then(|| delimiter.to_owned()),
        max_keys: i32::try_from(max_keys).ok(),
        key_count: i32::try_from(key_count).ok(),
        is_truncated,
        continuation_token: q.get("continuation-token").cloned(),
        next_continuation_token: if is_truncated {
            last_marker.map(hex::encode)
        } else {
            None
        },
        start_after: q.get("start-after").cloned(),
        contents,
        common_prefixes: common_prefixes
            .into_iter()
            .map(|prefix| CommonPrefix { prefix })
            .collect(),
    };
    xml(200, "ListBucketResult", &result)
}

// ---------------------------------------------------------------------------
// Multipart
// ---------------------------------------------------------------------------

fn create_upload(
    bucket: &str,
    state: &mut StoredBucket,
    key: &str,
    request: &RecordedRequest,
) -> HttpResponse {
    let upload_id = uuid::Uuid::new_v4().simple().to_string();
    state.uploads.insert(
        upload_id.clone(),
        StoredUpload {
            key: key.to_owned(),
            initiated: Utc::now(),
            content_type: request.header("content-type").map(str::to_owned),
            parts: BTreeMap::new(),
        },
    );
    xml(
        200,
        "InitiateMultipartUploadResult",
        &InitiateMultipartUploadResult {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            upload_id,
        },
    )
}

fn upload_part(state: &mut StoredBucket, key: &str, request: &RecordedRequest) -> HttpResponse {
    let upload_id = request.query.get("uploadId").map_or("", String::as_str);
    let Some(upload) = state.uploads.get_mut(upload_id).filter(|u| u.key == key) else {
        return no_such_upload(key);
    };
    let Some(part_number) = request
        .query
        .get("partNumber")
        .and_then(|n| n.parse::<u32>().ok())
        .filter(|n| (1..=10_000).contains(n))
    else {
        return error(
            400,
            "InvalidArgument",
            "Part number must be an integer between 1 and 10000",
            None,
        );
    };
    let e_tag = format!("\"{}\"", md5_hex(&request.body));
    upload
        .parts
        .insert(part_number, (request.body.clone(), e_tag.clone()));
    let mut response = empty(200);
    set_header(&mut response.headers, "etag", &e_tag);
    response
}

fn complete_upload(
    bucket: &str,
    state: &mut StoredBucket,
    key: &str,
    upload_id: &str,
    body: &[u8],
    location: String,
) -> HttpResponse {
    let completion: CompleteMultipartUpload = match parse(body) {
        Ok(c) => c,
        Err(response) => return response,
    };
    let Some(upload) = state.uploads.get(upload_id).filter(|u| u.key == key) else {
        return no_such_upload(key);
    };
    if completion.parts.is_empty() {
        return error(400, "MalformedXML", "The XML you provided was not well-formed", None);
    }
    if completion
        .parts
        .windows(2)
        .any(|w| w[0].part_number >= w[1].part_number)
    {
        return error(
            400,
            codes::INVALID_PART_ORDER,
            "The list of parts was not in ascending order.",
            None,
        );
    }

    let mut data = Vec::new();
    for part in &completion.parts {
        match upload.parts.get(&part.part_number) {
            Some((bytes, e_tag)) if unquote_etag(e_tag) == unquote_etag(&part.e_tag) => {
                data.extend_from_slice(bytes);
            }
            _ => {
                return error(
                    400,
                    codes::INVALID_PART,
                    "One or more of the specified parts could not be found.",
                    None,
                );
            }
        }
    }

    let e_tag = multipart_etag(completion.parts.iter().map(|p| p.e_tag.as_str()));
    let content_type = upload.content_type.clone();
    state.uploads.remove(upload_id);
    state.objects.insert(
        key.to_owned(),
        StoredObject {
            data: Bytes::from(data),
            e_tag: e_tag.clone(),
            content_type,
            last_modified: Utc::now(),
            metadata: BTreeMap::new(),
        },
    );
    xml(
        200,
        "CompleteMultipartUploadResult",
        &CompleteMultipartUploadResult {
            location: Some(location),
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            e_tag: Some(e_tag),
        },
    )
}

fn list_parts(
    bucket: &str,
    state: &StoredBucket,
    key: &str,
    q: &BTreeMap<String, String>,
) -> HttpResponse {
    let upload_id = q.get("uploadId").map_or("", String::as_str);
    let Some(upload) = state.uploads.get(upload_id).filter(|u| u.key == key) else {
        return no_such_upload(key);
    };
    let marker: u32 = q
        .get("part-number-marker")
        .and_then(|m| m.parse().ok())
        .unwrap_or(0);
    let max_parts: usize = q
        .get("max-parts")
        .and_then(|m| m.parse().ok())
        .unwrap_or(DEFAULT_MAX_KEYS);

    let remaining: Vec<Part> = upload
        .parts
        .range(marker + 1..)
        .map(|(number, (bytes, e_tag))| Part {
            part_number: *number,
            last_modified: Some(upload.initiated),
            e_tag: Some(e_tag.clone()),
            size: bytes.len() as u64,
        })
        .collect();
    let is_truncated = remaining.len() > max_parts;
    let parts: Vec<Part> = remaining.into_iter().take(max_parts).collect();

    xml(
        200,
        "ListPartsResult",
        &ListPartsResult {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            upload_id: upload_id.to_owned(),
            is_truncated,
            next_part_number_marker: if is_truncated {
                parts.last().map(|p| p.part_number)
            } else {
                None
            },
            parts,
        },
    )
}

fn list_uploads(bucket: &str, state: &StoredBucket, q: &BTreeMap<String, String>) -> HttpResponse {
    let prefix = q.get("prefix").map_or("", String::as_str);
    let key_marker = q.get("key-marker").map_or("", String::as_str);
    let upload_marker = q.get("upload-id-marker").map_or("", String::as_str);
    let max_uploads: usize = q
        .get("max-uploads")
        .and_then(|m| m.parse().ok())
        .unwrap_or(DEFAULT_MAX_KEYS);

    let mut uploads: Vec<MultipartUpload> = state
        .uploads
        .iter()
        .filter(|(_, u)| u.key.starts_with(prefix))
        .filter(|(id, u)| {
            key_marker.is_empty()
                || u.key.as_str() > key_marker
                || (u.key == key_marker && !upload_marker.is_empty() && id.as_str() > upload_marker)
        })
        .map(|(id, u)| MultipartUpload {
            key: u.key.clone(),
            upload_id: id.clone(),
            initiated: Some(u.initiated),
        })
        .collect();
    uploads.sort_by(|a, b| (&a.key, &a.upload_id).cmp(&(&b.key, &b.upload_id)));
    let is_truncated = uploads.len() > max_uploads;
    uploads.truncate(max_uploads);
    let last = uploads.last().filter(|_| is_truncated);

    xml(
        200,
        "ListMultipartUploadsResult",
        &ListMultipartUploadsResult {
            bucket: bucket.to_owned(),
            is_truncated,
            next_key_marker: last.map(|u| u.key.clone()),
            next_upload_id_marker: last.map(|u| u.upload_id.clone()),
            uploads,
        },
    )
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn empty(status: u16) -> HttpResponse {
    with_body(status, Bytes::new())
}

fn with_body(status: u16, body: Bytes) -> HttpResponse {
    HttpResponse {
        status: status_code(status),
        headers: HeaderMap::new(),
        body,
    }
}

fn xml<T: XmlSerialize>(status: u16, root: &str, value: &T) -> HttpResponse {
    match to_xml(root, value) {
        Ok(body) => {
            let mut response = with_body(status, Bytes::from(body));
            set_header(&mut response.headers, "content-type", "application/xml");
            response
        }
        Err(e) => error(500, codes::INTERNAL_ERROR, &e.to_string(), None),
    }
}

fn error(status: u16, code: &str, message: &str, resource: Option<&str>) -> HttpResponse {
    let body = error_to_xml(&ErrorResponse {
        code: code.to_owned(),
        message: message.to_owned(),
        resource: resource.map(str::to_owned),
        request_id: Some(uuid::Uuid::new_v4().simple().to_string()),
    });
    let mut response = with_body(status, Bytes::from(body));
    set_header(&mut response.headers, "content-type", "application/xml");
    response
}

/// A 404 that, like the real service, has no body for HEAD requests.
fn not_found(request: &RecordedRequest, code: &str, message: &str, resource: &str) -> HttpResponse {
    if request.method == Method::HEAD {
        empty(404)
    } else {
        error(404, code, message, Some(resource))
    }
}

fn no_such_upload(key: &str) -> HttpResponse {
    error(
        404,
        codes::NO_SUCH_UPLOAD,
        "The specified upload does not exist. The upload ID may be invalid, or the upload may have been aborted or completed.",
        Some(key),
    )
}

fn parse<T: XmlDeserialize>(body: &[u8]) -> Result<T, HttpResponse> {
    from_xml(body).map_err(|e| error(400, "MalformedXML", &e.to_string(), None))
}

fn set_header(headers: &mut HeaderMap, name: &str, value: &str) {
    if let (Ok(name), Ok(value)) = (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        headers.insert(name, value);
    }
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}
