//! Client configuration.
//!
//! [`ClientConfig`] can be built in code with the typed builder, deserialized from
//! camelCase JSON, or loaded from `OBJSTORE_*` environment variables via
//! [`ClientConfig::from_env`].

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Default minimum part size (5 MiB), also the multipart threshold.
pub const DEFAULT_MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// How buckets are addressed in request URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressingStyle {
    /// Virtual-hosted when the bucket name allows it, path-style otherwise.
    #[default]
    Auto,
    /// Always `host/bucket/key`.
    Path,
    /// `bucket.host/key`, still falling back to path-style for incompatible names.
    Virtual,
}

/// Which signing scheme requests use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureVersion {
    /// Legacy HMAC-SHA1 scheme.
    V2,
    /// Region-scoped HMAC-SHA256 scheme.
    #[default]
    V4,
}

/// Object-store client configuration.
///
/// # Examples
///
/// ```
/// use objstore_client::config::{AddressingStyle, ClientConfig};
///
/// let config = ClientConfig::builder()
///     .endpoint("localhost:9000".into())
///     .use_https(false)
///     .addressing_style(AddressingStyle::Path)
///     .build();
/// assert_eq!(config.region, "us-east-1");
/// assert_eq!(config.max_retries, 3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Base host of the service, optionally with a port.
    #[builder(default = String::from("s3.amazonaws.com"))]
    pub endpoint: String,

    /// Whether to use HTTPS.
    #[builder(default = true)]
    pub use_https: bool,

    /// Region used for region-scoped signing.
    #[builder(default = String::from("us-east-1"))]
    pub region: String,

    /// Default bucket addressing style.
    #[builder(default)]
    pub addressing_style: AddressingStyle,

    /// Signing scheme.
    #[builder(default)]
    pub signature_version: SignatureVersion,

    /// Send `UNSIGNED-PAYLOAD` instead of hashing bodies up front.
    #[builder(default = false)]
    pub unsigned_payload: bool,

    /// Maximum number of retries for a single request.
    #[builder(default = 3)]
    pub max_retries: u32,

    /// Retries granted to socket-timeout responses, within the `max_retries` cap.
    #[builder(default = 3)]
    pub socket_timeout_retries: u32,

    /// Base backoff delay in milliseconds; attempt `n` waits `base * 4^n`.
    #[builder(default = 100)]
    pub retry_base_delay_ms: u64,

    /// Upper bound of a single backoff delay in milliseconds.
    #[builder(default = 20_000)]
    pub retry_max_delay_ms: u64,

    /// Per-request timeout of the HTTP transport in seconds (0 disables it).
    #[builder(default = 300)]
    pub request_timeout_secs: u64,

    /// Concurrent part transfers.
    #[builder(default = 3)]
    pub concurrency: usize,

    /// Minimum part size in bytes; objects smaller than this use a single PUT.
    #[builder(default = DEFAULT_MIN_PART_SIZE)]
    pub min_part_size: u64,

    /// Log every request and response (including the string to sign) at debug level.
    #[builder(default = false)]
    pub debug: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `OBJSTORE_ENDPOINT` | `s3.amazonaws.com` |
    /// | `OBJSTORE_REGION` | `us-east-1` |
    /// | `OBJSTORE_PATH_STYLE` | `false` |
    /// | `OBJSTORE_USE_HTTPS` | `true` |
    /// | `OBJSTORE_SIGNATURE_VERSION` | `v4` |
    /// | `OBJSTORE_MAX_RETRIES` | `3` |
    /// | `OBJSTORE_CONCURRENCY` | `3` |
    /// | `OBJSTORE_MIN_PART_SIZE` | `5242880` |
    /// | `OBJSTORE_DEBUG` | `false` |
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("OBJSTORE_ENDPOINT") {
            config.endpoint = v;
        }
        if let Some(v) = lookup("OBJSTORE_REGION") {
            config.region = v;
        }
        if let Some(v) = lookup("OBJSTORE_PATH_STYLE") {
            if parse_bool(&v) {
                config.addressing_style = AddressingStyle::Path;
            }
        }
        if let Some(v) = lookup("OBJSTORE_USE_HTTPS") {
            config.use_https = parse_bool(&v);
        }
        if let Some(v) = lookup("OBJSTORE_SIGNATURE_VERSION") {
            match v.to_ascii_lowercase().as_str() {
                "v2" | "2" | "s3" => config.signature_version = SignatureVersion::V2,
                "v4" | "4" | "s3v4" => config.signature_version = SignatureVersion::V4,
                other => {
                    tracing::warn!(value = %other, "ignoring unknown OBJSTORE_SIGNATURE_VERSION");
                }
            }
        }
        if let Some(n) = lookup("OBJSTORE_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            config.max_retries = n;
        }
        if let Some(n) = lookup("OBJSTORE_CONCURRENCY").and_then(|v| v.parse().ok()) {
            config.concurrency = n;
        }
        if let Some(n) = lookup("OBJSTORE_MIN_PART_SIZE").and_then(|v| v.parse().ok()) {
            config.min_part_size = n;
        }
        if let Some(v) = lookup("OBJSTORE_DEBUG") {
            config.debug = parse_bool(&v);
        }

        config
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
pub(crate) fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
