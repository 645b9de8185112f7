//! Retry classification and backoff.
//!
//! [`classify_response`] and [`classify_transport_error`] decide what to do with a failed
//! attempt; [`RetryState`] enforces the budgets and computes the delay. Socket-timeout
//! responses have their own budget so a slowly growing upload file cannot exhaust the
//! general one, and vice versa.

use std::time::Duration;

use objstore_model::{ErrorResponse, Operation, codes};

use crate::config::ClientConfig;
use crate::transport::HttpResponse;

/// Body phrase of the socket-timeout 400 response.
///
/// Matching on English text is best-effort; the `RequestTimeout` code is checked first.
pub const SOCKET_TIMEOUT_PHRASE: &str = "Your socket connection to the server";

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after backoff (transport error, 5xx, throttling).
    Retry,
    /// The service timed out reading the body; re-stat the body file and retry.
    SocketTimeout,
    /// The credentials expired; refresh them and retry immediately.
    RefreshCredentials,
    /// Follow a temporary redirect to `host`.
    Redirect {
        /// Host from the `Location` header.
        host: String,
        /// Region announced by `x-amz-bucket-region`, if any.
        region: Option<String>,
    },
    /// Surface the error.
    Fail,
}

/// Classify a non-2xx response.
#[must_use]
pub fn classify_response(response: &HttpResponse, error: &ErrorResponse) -> RetryDecision {
    let status = response.status.as_u16();

    if matches!(
        error.code.as_str(),
        codes::EXPIRED_TOKEN | codes::TOKEN_REFRESH_REQUIRED | codes::EXPIRED_TOKEN_EXCEPTION
    ) {
        return RetryDecision::RefreshCredentials;
    }
    if status == 400 && is_socket_timeout(error) {
        return RetryDecision::SocketTimeout;
    }
    if status == 307 {
        if let Some(host) = response.header("location").and_then(location_host) {
            return RetryDecision::Redirect {
                host,
                region: response.header("x-amz-bucket-region").map(str::to_owned),
            };
        }
        return RetryDecision::Fail;
    }
    if status >= 500 || status == 429 || error.code == codes::SLOW_DOWN {
        return RetryDecision::Retry;
    }
    RetryDecision::Fail
}

/// Classify a transport failure. Non-idempotent operations are never retried blindly.
#[must_use]
pub fn classify_transport_error(operation: Operation) -> RetryDecision {
    if operation.is_idempotent() {
        RetryDecision::Retry
    } else {
        RetryDecision::Fail
    }
}

fn is_socket_timeout(error: &ErrorResponse) -> bool {
    error.code == codes::REQUEST_TIMEOUT || error.message.contains(SOCKET_TIMEOUT_PHRASE)
}

/// Extract the host (with port) of an absolute `Location` URL.
#[must_use]
pub fn location_host(location: &str) -> Option<String> {
    let (_, rest) = location.split_once("://")?;
    let host = rest.split(['/', '?']).next()?;
    (!host.is_empty()).then(|| host.to_owned())
}

/// Bounds and delays of the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries for everything except socket timeouts.
    pub max_retries: u32,
    /// Retries for socket-timeout responses.
    pub socket_timeout_retries: u32,
    /// Base delay.
    pub base_delay: Duration,
    /// Cap of a single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Build from the client configuration.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            socket_timeout_retries: config.socket_timeout_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// Backoff before retry number `retry` (0-based): `base * 4^retry`, capped.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use objstore_client::retry::RetryPolicy;
    ///
    /// let policy = RetryPolicy {
    ///     max_retries: 5,
    ///     socket_timeout_retries: 3,
    ///     base_delay: Duration::from_millis(100),
    ///     max_delay: Duration::from_secs(1),
    /// };
    /// assert_eq!(policy.delay_for(0), Duration::from_millis(100));
    /// assert_eq!(policy.delay_for(1), Duration::from_millis(400));
    /// assert_eq!(policy.delay_for(2), Duration::from_secs(1));
    /// ```
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 4u32.saturating_pow(retry);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Retry counters of one logical request.
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    retries: u32,
    socket_timeouts: u32,
}

impl RetryState {
    /// Start with fresh counters.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            retries: 0,
            socket_timeouts: 0,
        }
    }

    /// Number of retries granted so far, socket timeouts included.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.retries + self.socket_timeouts
    }

    /// Whether the absolute retry count is spent.
    fn exhausted(&self) -> bool {
        self.attempts() >= self.policy.max_retries
    }

    /// Record a decision and return the delay before the next attempt, or `None` when
    /// the error must surface.
    pub fn next_delay(&mut self, decision: &RetryDecision) -> Option<Duration> {
        match decision {
            RetryDecision::Fail => None,
            RetryDecision::SocketTimeout => {
                if self.exhausted() || self.socket_timeouts >= self.policy.socket_timeout_retries
                {
                    return None;
                }
                let delay = self.policy.delay_for(self.socket_timeouts);
                self.socket_timeouts += 1;
                Some(delay)
            }
            RetryDecision::Retry => {
                if self.exhausted() {
                    return None;
                }
                let delay = self.policy.delay_for(self.retries);
                self.retries += 1;
                Some(delay)
            }
            RetryDecision::RefreshCredentials | RetryDecision::Redirect { .. } => {
                if self.exhausted() {
                    return None;
                }
                self.retries += 1;
                Some(Duration::ZERO)
            }
        }
    }
}
