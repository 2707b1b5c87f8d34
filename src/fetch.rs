//! HTTP probing of candidate article URLs with bounded retry.
//!
//! The module uses a trait-based design so the scan engine never depends on
//! the transport directly:
//! - [`Fetcher`]: a single GET with a timeout, returning status and body
//! - [`ReqwestFetcher`]: the production implementation over `reqwest`, which
//!   decodes bodies with [`crate::decode`] rather than trusting the header alone
//! - [`RetryFetch`]: decorator that retries network-level failures
//!
//! # Retry Strategy
//!
//! Only failures that produced no HTTP response (timeouts, refused or reset
//! connections, truncated bodies) are retried, a fixed number of times with a
//! fixed delay. Any HTTP status, including 5xx, is returned as data and left
//! to the classifier.

use crate::decode::decode_body;
use reqwest::header::CONTENT_TYPE;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// What came back from one GET that produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// A request that never produced a usable HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("failed to read response body: {0}")]
    Body(String),
    #[error("request failed: {0}")]
    Other(String),
}

impl NetworkError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout(err.to_string())
        } else if err.is_connect() {
            NetworkError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            NetworkError::Body(err.to_string())
        } else {
            NetworkError::Other(err.to_string())
        }
    }
}

/// A single bounded HTTP GET.
pub trait Fetcher {
    /// Fetch `url`, giving up after `timeout`.
    ///
    /// Non-2xx statuses are successful fetches; only transport failures are errors.
    async fn get(&self, url: &Url, timeout: Duration) -> Result<RawResponse, NetworkError>;
}

/// Transport settings for [`ReqwestFetcher`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub connect_timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(15),
        }
    }
}

/// [`Fetcher`] over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(settings.connect_timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for ReqwestFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get(&self, url: &Url, timeout: Duration) -> Result<RawResponse, NetworkError> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(NetworkError::from_reqwest)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let bytes = if status.is_client_error() || status.is_server_error() {
            // The classifier never looks at error bodies.
            response.bytes().await.unwrap_or_default()
        } else {
            response.bytes().await.map_err(NetworkError::from_reqwest)?
        };
        let decoded = decode_body(&bytes, content_type.as_deref());

        debug!(
            status = status.as_u16(),
            bytes = bytes.len(),
            encoding = decoded.encoding.name(),
            had_errors = decoded.had_errors,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "GET complete"
        );
        Ok(RawResponse {
            status: status.as_u16(),
            body: decoded.text,
        })
    }
}

/// How many times to retry a network failure, and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; zero disables retrying.
    pub retries: u32,
    pub delay: Duration,
}

/// Wrapper that adds bounded retry to any [`Fetcher`].
pub struct RetryFetch<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> RetryFetch<T>
where
    T: Fetcher,
{
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("retries", &self.policy.retries)
            .field("delay", &self.policy.delay)
            .finish()
    }
}

impl<T> Fetcher for RetryFetch<T>
where
    T: Fetcher,
{
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get(&self, url: &Url, timeout: Duration) -> Result<RawResponse, NetworkError> {
        let total_t0 = Instant::now();
        let mut retries = 0u32;

        loop {
            match self.inner.get(url, timeout).await {
                Ok(response) => {
                    if retries > 0 {
                        info!(retries, "GET recovered after retry");
                    }
                    return Ok(response);
                }
                Err(e) => {
                    let elapsed_ms_total = total_t0.elapsed().as_millis() as u64;
                    if retries >= self.policy.retries {
                        warn!(
                            retries,
                            max = self.policy.retries,
                            elapsed_ms_total,
                            error = %e,
                            "GET exhausted retries"
                        );
                        return Err(e);
                    }

                    retries += 1;
                    warn!(
                        attempt = retries,
                        max = self.policy.retries,
                        elapsed_ms_total,
                        delay = ?self.policy.delay,
                        error = %e,
                        "GET failed; retrying"
                    );
                    sleep(self.policy.delay).await;
                }
            }
        }
    }
}
