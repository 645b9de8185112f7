//! The request client.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use http::Method;
use objstore_auth::{CredentialProvider, Credentials, presign_v2, presign_v4};
use objstore_model::ErrorResponse;
use objstore_xml::error_from_xml;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::addressing::resolve;
use crate::config::{ClientConfig, SignatureVersion};
use crate::endpoint::Endpoint;
use crate::error::{ClientError, ServiceError};
use crate::pipeline::{PipelineContext, encode_query, prepare};
use crate::request::RequestDescriptor;
use crate::retry::{
    RetryDecision, RetryPolicy, RetryState, classify_response, classify_transport_error,
};
use crate::transport::{HttpResponse, HttpTransport, ReqwestTransport};

/// Client for an S3-compatible object store.
///
/// Cheap to clone; clones share the transport, credential provider and cached
/// credentials.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use objstore_auth::EnvCredentialProvider;
/// use objstore_client::{ClientConfig, ObjectStoreClient};
///
/// # async fn run() -> Result<(), objstore_client::ClientError> {
/// let client = ObjectStoreClient::connect(
///     ClientConfig::from_env(),
///     Arc::new(EnvCredentialProvider),
/// )
/// .await?;
/// let buckets = client.list_buckets().await?;
/// println!("{} buckets", buckets.buckets.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ObjectStoreClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    config: ClientConfig,
    endpoint: Endpoint,
    policy: RetryPolicy,
    transport: Arc<dyn HttpTransport>,
    provider: Arc<dyn CredentialProvider>,
    credentials: RwLock<Option<Arc<Credentials>>>,
}

impl ObjectStoreClient {
    /// Connect over HTTP(S) with `reqwest`, honoring the credentials' CA bundle.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials cannot be obtained or the transport cannot be
    /// built.
    pub async fn connect(
        config: ClientConfig,
        provider: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ClientError> {
        let credentials = provider.provide().await?;
        let transport = ReqwestTransport::new(&config, credentials.ca_bundle.as_deref())?;
        let client = Self::with_transport(config, provider, Arc::new(transport));
        *client.inner.credentials.write() = Some(credentials);
        Ok(client)
    }

    /// Build a client over an arbitrary transport.
    #[must_use]
    pub fn with_transport(
        config: ClientConfig,
        provider: Arc<dyn CredentialProvider>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let endpoint = Endpoint::from_config(&config);
        let policy = RetryPolicy::from_config(&config);
        Self {
            inner: Arc::new(ClientInner {
                config,
                endpoint,
                policy,
                transport,
                provider,
                credentials: RwLock::new(None),
            }),
        }
    }

    /// The client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    async fn credentials(&self) -> Result<Arc<Credentials>, ClientError> {
        if let Some(creds) = self.inner.credentials.read().clone() {
            return Ok(creds);
        }
        let creds = self.inner.provider.provide().await?;
        *self.inner.credentials.write() = Some(Arc::clone(&creds));
        Ok(creds)
    }

    async fn refresh_credentials(&self) -> Result<(), ClientError> {
        let creds = self.inner.provider.refresh().await?;
        *self.inner.credentials.write() = Some(creds);
        Ok(())
    }

    /// Send a request, retrying per the retry policy.
    ///
    /// 2xx responses are returned as-is; every other status becomes a
    /// [`ClientError::Service`] or [`ClientError::NotFound`] once retries are exhausted
    /// or the status is not retryable.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt.
    pub async fn send(&self, descriptor: RequestDescriptor) -> Result<HttpResponse, ClientError> {
        let mut endpoint = self.inner.endpoint.clone();
        let mut state = RetryState::new(self.inner.policy);

        loop {
            let credentials = self.credentials().await?;
            let ctx = PipelineContext {
                endpoint: &endpoint,
                config: &self.inner.config,
                credentials: &credentials,
                now: Utc::now(),
            };
            let prepared = prepare(&descriptor, &ctx).await?;
            let url = prepared.url.clone();

            let (decision, error) = match self.inner.transport.send(prepared.into()).await {
                Ok(response) if response.status.is_success() => {
                    if self.inner.config.debug {
                        debug!(
                            operation = %descriptor.operation,
                            %url,
                            status = response.status.as_u16(),
                            "request succeeded"
                        );
                    }
                    return Ok(response);
                }
                Ok(response) => {
                    let body_error = parse_error_body(&descriptor, &response);
                    let decision = classify_response(&response, &body_error);
                    let status = response.status.as_u16();
                    let error = if body_error.code.is_empty() {
                        ServiceError::from_status(status)
                    } else {
                        ServiceError::from_response(status, body_error)
                    };
                    (decision, ClientError::from_service(error))
                }
                Err(e) => (
                    classify_transport_error(descriptor.operation),
                    ClientError::Transport(e),
                ),
            };

            let Some(delay) = state.next_delay(&decision) else {
                debug!(operation = %descriptor.operation, %url, error = %error, "request failed");
                return Err(error);
            };
            warn!(
                operation = %descriptor.operation,
                %url,
                attempt = state.attempts(),
                ?decision,
                error = %error,
                "retrying request"
            );

            match decision {
                RetryDecision::RefreshCredentials => self.refresh_credentials().await?,
                RetryDecision::SocketTimeout => {
                    let len = descriptor.body.restat().await?;
                    debug!(
                        operation = %descriptor.operation,
                        ?len,
                        "resending body after socket timeout"
                    );
                }
                RetryDecision::Redirect { host, region } => {
                    endpoint = endpoint.redirected(
                        &host,
                        descriptor.bucket.as_deref(),
                        region.as_deref(),
                    );
                }
                RetryDecision::Retry | RetryDecision::Fail => {}
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// The unsigned URL of an object.
    #[must_use]
    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        let endpoint = &self.inner.endpoint;
        let address = resolve(
            endpoint,
            Some(bucket),
            Some(key),
            self.inner.config.addressing_style,
        );
        format!("{}://{}{}", endpoint.scheme(), address.host, address.path)
    }

    /// A presigned URL granting `method` on an object for `expires_in`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Signing`] for missing credentials or an invalid expiry.
    pub async fn presigned_url(
        &self,
        method: &Method,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, ClientError> {
        let credentials = self.credentials().await?;
        let endpoint = &self.inner.endpoint;
        let address = resolve(
            endpoint,
            Some(bucket),
            Some(key),
            self.inner.config.addressing_style,
        );
        let now = Utc::now();

        let params = match self.inner.config.signature_version {
            SignatureVersion::V2 => presign_v2(
                method.as_str(),
                &address.canonical_resource,
                &[],
                &credentials,
                now,
                expires_in.as_secs(),
            )?,
            SignatureVersion::V4 => presign_v4(
                method.as_str(),
                &address.host,
                &address.path,
                &[],
                &credentials,
                endpoint.region(),
                now,
                expires_in.as_secs(),
            )?,
        };
        let query: Vec<(String, Option<String>)> =
            params.into_iter().map(|(k, v)| (k, Some(v))).collect();
        Ok(format!(
            "{}://{}{}{}",
            endpoint.scheme(),
            address.host,
            address.path,
            encode_query(&query)
        ))
    }
}

fn parse_error_body(descriptor: &RequestDescriptor, response: &HttpResponse) -> ErrorResponse {
    if descriptor.method == Method::HEAD || descriptor.operation.is_metadata_only() {
        return ErrorResponse::default();
    }
    error_from_xml(&response.body).unwrap_or_default()
}
