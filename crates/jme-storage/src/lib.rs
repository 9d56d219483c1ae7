//! HTTP fetch transport + persistent store seam for the ingestion pipeline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info_span, Instrument};

pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::{MemoryJobStore, MemoryJobStoreTx};
pub use postgres::{PgJobStore, PgJobStoreTx};
pub use store::{
    EnrichmentRow, HashBackfillRow, JobStore, JobStoreTx, SkillUpsert, StoreError, UrlRow,
};

pub const CRATE_NAME: &str = "jme-storage";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    NonRetryable,
}

pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

/// Attempt ceiling + linear backoff shared by every adapter request.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(750),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given 1-based failed attempt.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        self.base_delay.saturating_mul(attempt.max(1) as u32)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the attempt
    /// ceiling is reached.
    pub async fn run<T, E, F, Fut, P>(&self, mut op: F, is_transient: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && is_transient(&err) => {
                    let delay = self.delay_for_attempt(attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "transient failure, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Concurrency ceiling for outbound requests; excess callers queue on the semaphore.
#[derive(Debug, Clone)]
pub struct RequestGate {
    permits: Arc<Semaphore>,
}

impl RequestGate {
    pub fn new(limit: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    pub async fn run<F: Future>(&self, fut: F) -> F::Output {
        let _permit = self.permits.acquire().await.expect("semaphore not closed");
        fut.await
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub concurrency: usize,
    pub request_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
            concurrency: 8,
            request_delay: Duration::from_secs(1),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        transient: bool,
        #[source]
        source: reqwest::Error,
    },
    #[error("http status {status} for {url}")]
    HttpStatus {
        status: u16,
        url: String,
        transient: bool,
    },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Request { transient, .. } | FetchError::HttpStatus { transient, .. } => {
                *transient
            }
        }
    }
}

/// Shared transport: one reqwest client, one retry policy, one concurrency gate.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    gate: RequestGate,
    retry: RetryPolicy,
    request_delay: Duration,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            gate: RequestGate::new(config.concurrency),
            retry: config.retry,
            request_delay: config.request_delay,
        })
    }

    /// Fixed politeness delay, applied once per adapter call.
    pub async fn polite_pause(&self) {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
    }

    pub async fn fetch_text(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<FetchedResponse, FetchError> {
        let span = info_span!("http_fetch", url);
        self.gate
            .run(self.retry.run(|| self.attempt(url, query), FetchError::is_transient))
            .instrument(span)
            .await
    }

    async fn attempt(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<FetchedResponse, FetchError> {
        let request_error = |source: reqwest::Error| FetchError::Request {
            url: url.to_string(),
            transient: classify_reqwest_error(&source) == RetryDisposition::Retryable,
            source,
        };

        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let resp = request.send().await.map_err(request_error)?;

        let status = resp.status();
        let final_url = resp.url().to_string();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: final_url,
                transient: classify_status(status) == RetryDisposition::Retryable,
            });
        }

        let body = resp.text().await.map_err(request_error)?;
        Ok(FetchedResponse {
            status,
            final_url,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Permanent,
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(750),
        }
    }

    #[test]
    fn backoff_is_linear_in_attempt_number() {
        let policy = policy();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(750));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1500));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(2250));
    }

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), RetryDisposition::Retryable);
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), RetryDisposition::Retryable);
        assert_eq!(classify_status(StatusCode::NOT_FOUND), RetryDisposition::NonRetryable);
        assert_eq!(classify_status(StatusCode::FORBIDDEN), RetryDisposition::NonRetryable);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_until_success() {
        let calls = AtomicUsize::new(0);
        let result = policy()
            .run(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(TestError::Transient)
                        } else {
                            Ok("body")
                        }
                    }
                },
                |e| *e == TestError::Transient,
            )
            .await;
        assert_eq!(result, Ok("body"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_stop_at_ceiling() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), TestError> = policy()
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(TestError::Transient) }
                },
                |e| *e == TestError::Transient,
            )
            .await;
        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), TestError> = policy()
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(TestError::Permanent) }
                },
                |e| *e == TestError::Transient,
            )
            .await;
        assert_eq!(result, Err(TestError::Permanent));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gate_caps_in_flight_requests() {
        let gate = RequestGate::new(8);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..100 {
            let gate = gate.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            tasks.spawn(async move {
                gate.run(async {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
                .await;
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.expect("task panicked");
        }

        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
        assert!(peak.load(Ordering::SeqCst) <= 8);
        assert_eq!(peak.load(Ordering::SeqCst), 8);
    }
}
