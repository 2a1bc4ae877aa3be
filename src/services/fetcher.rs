// src/services/fetcher.rs

//! Bounded, retrying HTTP fetches.
//!
//! A [`Fetcher`] wraps a [`Transport`] with a shared concurrency limit, an
//! exponential backoff policy and a shutdown flag. A 404 is a definitive
//! miss and is never retried; 2xx and 3xx answers are successes.

use std::collections::BTreeMap;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::error::{AppError, FetchFailure, Result};
use crate::models::CrawlerConfig;

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// One HTTP round trip. Transport errors are retryable.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse>;

    async fn post_json(&self, url: &str, body: &Value) -> Result<RawResponse>;
}

/// `reqwest`-backed transport with optional fixed headers.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            headers: HeaderMap::new(),
        }
    }

    /// Attach opaque headers and a cookie string to every request.
    pub fn with_headers(
        mut self,
        headers: &BTreeMap<String, String>,
        cookie: Option<&str>,
    ) -> Result<Self> {
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| AppError::config(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| AppError::config(format!("invalid value for header {name}: {e}")))?;
            self.headers.insert(name, value);
        }
        if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| AppError::config(format!("invalid cookie: {e}")))?;
            self.headers.insert(COOKIE, value);
        }
        Ok(self)
    }

    async fn read(response: reqwest::Response) -> Result<RawResponse> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<RawResponse> {
        let response = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .send()
            .await?;
        Self::read(response).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<RawResponse> {
        let response = self
            .client
            .post(url)
            .headers(self.headers.clone())
            .json(body)
            .send()
            .await?;
        Self::read(response).await
    }
}

/// Exponential backoff: `min(cap, base * 2^attempt + jitter)` with jitter
/// below a tenth of `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base: Duration::from_millis(config.backoff_base_ms),
            cap: Duration::from_millis(config.backoff_cap_ms),
        }
    }

    /// Delay after failed attempt `attempt` (zero-based). `jitter` is a
    /// fraction in `[0, 1)`.
    pub fn delay(&self, attempt: u32, jitter: f64) -> Duration {
        let exponential = self.base.saturating_mul(2u32.saturating_pow(attempt));
        let jitter = self.base.mul_f64(0.1 * jitter.clamp(0.0, 1.0));
        exponential.saturating_add(jitter).min(self.cap)
    }
}

/// Uniform fraction in `[0, 1)` from a freshly keyed hasher.
fn jitter_fraction() -> f64 {
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u64(0x9e37_79b9_7f4a_7c15);
    (hasher.finish() >> 11) as f64 / (1u64 << 53) as f64
}

/// Shared fetch front-end. Clones share the permit pool and shutdown flag.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    permits: Arc<Semaphore>,
    shutdown: Arc<AtomicBool>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy, max_concurrent: usize) -> Self {
        Self {
            transport,
            policy,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops new requests once set.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// GET `url` and return the body.
    pub async fn get_text(&self, url: &str) -> std::result::Result<String, FetchFailure> {
        self.execute(url, || self.transport.get(url)).await
    }

    /// POST `body` as JSON to `url` and return the response body.
    pub async fn post_json(
        &self,
        url: &str,
        body: &Value,
    ) -> std::result::Result<String, FetchFailure> {
        self.execute(url, || self.transport.post_json(url, body)).await
    }

    async fn execute<F, Fut>(&self, url: &str, send: F) -> std::result::Result<String, FetchFailure>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<RawResponse>>,
    {
        let mut last_status = None;
        let mut last_error = String::new();

        for attempt in 0..self.policy.max_attempts {
            if self.is_cancelled() {
                return Err(FetchFailure::Cancelled {
                    url: url.to_string(),
                });
            }

            let outcome = {
                let _permit = self.permits.acquire().await.map_err(|_| {
                    FetchFailure::Cancelled {
                        url: url.to_string(),
                    }
                })?;
                send().await
            };

            match outcome {
                Ok(response) if (200..400).contains(&response.status) => {
                    return Ok(response.body);
                }
                Ok(response) if response.status == 404 => {
                    return Err(FetchFailure::NotFound {
                        url: url.to_string(),
                    });
                }
                Ok(response) => {
                    last_status = Some(response.status);
                    last_error = format!("HTTP {}", response.status);
                }
                Err(e) => last_error = e.to_string(),
            }

            log::debug!(
                "Fetch of {} failed: {} (attempt {}/{})",
                url,
                last_error,
                attempt + 1,
                self.policy.max_attempts
            );

            if attempt + 1 < self.policy.max_attempts {
                tokio::time::sleep(self.policy.delay(attempt, jitter_fraction())).await;
            }
        }

        Err(FetchFailure::Exhausted {
            url: url.to_string(),
            attempts: self.policy.max_attempts,
            last_status,
            last_error,
        })
    }
}
