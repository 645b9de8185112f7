//! Endpoint and region descriptor.

use std::fmt;

use crate::config::ClientConfig;

/// URL scheme of the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
}

impl Scheme {
    /// The scheme as written in URLs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Region to hostname table of the classic S3 endpoints.
pub const REGION_HOSTS: &[(&str, &str)] = &[
    ("us-east-1", "s3.amazonaws.com"),
    ("us-west-1", "s3-us-west-1.amazonaws.com"),
    ("us-west-2", "s3-us-west-2.amazonaws.com"),
    ("eu-west-1", "s3-eu-west-1.amazonaws.com"),
    ("ap-southeast-1", "s3-ap-southeast-1.amazonaws.com"),
    ("ap-southeast-2", "s3-ap-southeast-2.amazonaws.com"),
    ("ap-northeast-1", "s3-ap-northeast-1.amazonaws.com"),
    ("sa-east-1", "s3-sa-east-1.amazonaws.com"),
    ("us-gov-west-1", "s3-us-gov-west-1.amazonaws.com"),
];

/// Base host, scheme and region of the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: Scheme,
    host: String,
    region: String,
}

impl Endpoint {
    /// Create an endpoint. `host` may carry a port.
    pub fn new(scheme: Scheme, host: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            scheme,
            host: host.into().trim_end_matches('/').to_owned(),
            region: region.into(),
        }
    }

    /// Build the endpoint described by a client configuration.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        let scheme = if config.use_https {
            Scheme::Https
        } else {
            Scheme::Http
        };
        Self::new(scheme, &config.endpoint, &config.region)
    }

    /// The endpoint serving `region`, from the table or the regional naming pattern.
    #[must_use]
    pub fn for_region(scheme: Scheme, region: &str) -> Self {
        let host = REGION_HOSTS
            .iter()
            .find(|(r, _)| *r == region)
            .map_or_else(|| format!("s3.{region}.amazonaws.com"), |(_, h)| (*h).to_owned());
        Self::new(scheme, host, region)
    }

    /// Scheme.
    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Base host, possibly with a port.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Region.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Recognize the region served by `host`, including virtual-hosted forms.
    #[must_use]
    pub fn region_for_host(host: &str) -> Option<&'static str> {
        let host = strip_port(host);
        REGION_HOSTS
            .iter()
            .find(|(_, h)| host == *h || host.ends_with(&format!(".{h}")))
            .map(|(r, _)| *r)
    }

    /// Re-derive a bucket name from a redirected or CNAME host.
    ///
    /// Returns `None` for the bare service hosts (path-style). For a subdomain of
    /// the base host or of a known regional host, the leading labels are the bucket;
    /// any other host is treated as a CNAME whose whole name is the bucket.
    #[must_use]
    pub fn bucket_from_host(&self, host: &str) -> Option<String> {
        let host = strip_port(host);
        let base = strip_port(&self.host);
        let known = std::iter::once(base).chain(REGION_HOSTS.iter().map(|(_, h)| *h));

        for service_host in known {
            if host == service_host {
                return None;
            }
            if let Some(bucket) = host
                .strip_suffix(service_host)
                .and_then(|p| p.strip_suffix('.'))
            {
                return (!bucket.is_empty()).then(|| bucket.to_owned());
            }
        }
        if host.ends_with(".amazonaws.com") {
            return None;
        }
        Some(host.to_owned())
    }

    /// The endpoint a temporary redirect points at.
    ///
    /// `location_host` is the host of the `Location` header. A leading `<bucket>.`
    /// label is stripped so the resolver can re-apply addressing, and the region is
    /// re-derived from the host (falling back to `region_hint`, then the current one).
    #[must_use]
    pub fn redirected(
        &self,
        location_host: &str,
        bucket: Option<&str>,
        region_hint: Option<&str>,
    ) -> Self {
        let base = bucket
            .and_then(|b| location_host.strip_prefix(b))
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|rest| !rest.is_empty())
            .unwrap_or(location_host);
        let region = Self::region_for_host(base)
            .map(str::to_owned)
            .or_else(|| region_from_pattern(strip_port(base)))
            .or_else(|| region_hint.map(str::to_owned))
            .unwrap_or_else(|| self.region.clone());
        Self::new(self.scheme, base, region)
    }
}

/// Extract the region from `s3.<region>.amazonaws.com` or `s3-<region>.amazonaws.com`.
fn region_from_pattern(host: &str) -> Option<String> {
    let rest = host.strip_suffix(".amazonaws.com")?;
    let region = rest.strip_prefix("s3.").or_else(|| rest.strip_prefix("s3-"))?;
    (!region.is_empty() && !region.contains('.')).then(|| region.to_owned())
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((h, port)) if port.chars().all(|c| c.is_ascii_digit()) => h,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_map_region_hosts() {
        let ep = Endpoint::for_region(Scheme::Https, "eu-west-1");
        assert_eq!(ep.host(), "s3-eu-west-1.amazonaws.com");
        let ep = Endpoint::for_region(Scheme::Https, "eu-central-1");
        assert_eq!(ep.host(), "s3.eu-central-1.amazonaws.com");
    }

    #[test]
    fn test_should_recognize_region_for_host() {
        assert_eq!(
            Endpoint::region_for_host("bucket.s3-us-west-1.amazonaws.com"),
            Some("us-west-1")
        );
        assert_eq!(Endpoint::region_for_host("s3.amazonaws.com:443"), Some("us-east-1"));
        assert_eq!(Endpoint::region_for_host("minio.local"), None);
    }

    #[test]
    fn test_should_derive_bucket_from_host() {
        let ep = Endpoint::new(Scheme::Https, "s3.amazonaws.com", "us-east-1");
        assert_eq!(ep.bucket_from_host("s3.amazonaws.com"), None);
        assert_eq!(
            ep.bucket_from_host("photos.s3.amazonaws.com"),
            Some("photos".to_owned())
        );
        assert_eq!(
            ep.bucket_from_host("my.bucket.s3-eu-west-1.amazonaws.com"),
            Some("my.bucket".to_owned())
        );
        assert_eq!(
            ep.bucket_from_host("static.example.com"),
            Some("static.example.com".to_owned())
        );
    }

    #[test]
    fn test_should_follow_redirect_to_regional_host() {
        let ep = Endpoint::new(Scheme::Https, "s3.amazonaws.com", "us-east-1");
        let moved = ep.redirected("photos.s3-eu-west-1.amazonaws.com", Some("photos"), None);
        assert_eq!(moved.host(), "s3-eu-west-1.amazonaws.com");
        assert_eq!(moved.region(), "eu-west-1");

        let moved = ep.redirected("photos.s3.eu-central-1.amazonaws.com", Some("photos"), None);
        assert_eq!(moved.host(), "s3.eu-central-1.amazonaws.com");
        assert_eq!(moved.region(), "eu-central-1");

        let moved = ep.redirected("storage.internal:9000", None, Some("ap-south-1"));
        assert_eq!(moved.host(), "storage.internal:9000");
        assert_eq!(moved.region(), "ap-south-1");
    }

    #[test]
    fn test_should_handle_ports_in_custom_endpoint() {
        let ep = Endpoint::new(Scheme::Http, "minio.local:9000", "us-east-1");
        assert_eq!(ep.bucket_from_host("minio.local:9000"), None);
        assert_eq!(ep.bucket_from_host("data.minio.local:9000"), Some("data".to_owned()));
    }
}
