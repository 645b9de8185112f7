//! Integration tests for the objstore client.
//!
//! Every test drives a real [`ObjectStoreClient`] (signing, addressing, retries and
//! transfers included) against [`MemoryObjectStore`], an in-process transport that
//! answers like an S3-compatible service and can inject faults. No server is needed:
//!
//! ```text
//! cargo test -p objstore-integration
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use objstore_auth::{AuthError, CredentialProvider, Credentials, StaticCredentialProvider};
use objstore_client::testing::MemoryObjectStore;
use objstore_client::{ClientConfig, ObjectStoreClient};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A client wired to a fresh in-memory store.
#[derive(Debug, Clone)]
pub struct TestEnv {
    /// The client under test.
    pub client: ObjectStoreClient,
    /// The store answering its requests.
    pub store: Arc<MemoryObjectStore>,
}

/// Configuration with millisecond backoff so retry tests stay fast.
#[must_use]
pub fn test_config() -> ClientConfig {
    ClientConfig::builder()
        .retry_base_delay_ms(1)
        .retry_max_delay_ms(5)
        .build()
}

/// A client with [`test_config`] and static credentials.
#[must_use]
pub fn test_env() -> TestEnv {
    test_env_with(test_config())
}

/// A client with `config` and static credentials.
#[must_use]
pub fn test_env_with(config: ClientConfig) -> TestEnv {
    let provider = Arc::new(StaticCredentialProvider::new(Credentials::new(
        "AKIDEXAMPLE",
        "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
    )));
    test_env_with_provider(config, provider)
}

/// A client with `config` and an arbitrary credential provider.
#[must_use]
pub fn test_env_with_provider(
    config: ClientConfig,
    provider: Arc<dyn CredentialProvider>,
) -> TestEnv {
    init_tracing();
    let store = Arc::new(MemoryObjectStore::new());
    let client = ObjectStoreClient::with_transport(config, provider, store.clone());
    TestEnv { client, store }
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// Create a bucket through the client and return its name.
pub async fn create_test_bucket(client: &ObjectStoreClient, prefix: &str) -> String {
    let name = test_bucket_name(prefix);
    client
        .create_bucket(&name, None, None)
        .await
        .unwrap_or_else(|e| panic!("failed to create bucket {name}: {e}"));
    name
}

/// Deterministic, non-repeating-per-part test data.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn pattern_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 4096) % 251) as u8).collect()
}

/// Temporary credentials that rotate to a new session token on every refresh.
#[derive(Debug)]
pub struct RotatingCredentialProvider {
    generation: AtomicUsize,
}

impl RotatingCredentialProvider {
    /// Start at token `token-0`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            generation: AtomicUsize::new(0),
        }
    }

    /// Number of refreshes so far.
    #[must_use]
    pub fn refreshes(&self) -> usize {
        self.generation.load(Ordering::SeqCst)
    }

    fn current(&self) -> Arc<Credentials> {
        let generation = self.generation.load(Ordering::SeqCst);
        Arc::new(
            Credentials::new("ASIAEXAMPLE", "temporary-secret")
                .with_session_token(format!("token-{generation}")),
        )
    }
}

impl Default for RotatingCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProvider for RotatingCredentialProvider {
    async fn provide(&self) -> Result<Arc<Credentials>, AuthError> {
        Ok(self.current())
    }

    async fn refresh(&self) -> Result<Arc<Credentials>, AuthError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(self.current())
    }
}

mod test_addressing;
mod test_bucket;
mod test_download;
mod test_error;
mod test_fs;
mod test_list;
mod test_multipart;
mod test_object;
mod test_retry;
mod test_sync;
