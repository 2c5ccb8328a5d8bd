use anyhow::{Context, Result};
use bytes::Bytes;
use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry behaviour for idempotent upstream calls. 429 is never retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub status_codes: Vec<u16>,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            status_codes: vec![500, 502, 503, 504],
            base_backoff_ms: 200,
            max_backoff_ms: 2_000,
            jitter_ms: 100,
        }
    }
}

impl RetryPolicy {
    /// Single attempt; used for cart mutations.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn retries(&self, status: StatusCode) -> bool {
        status != StatusCode::TOO_MANY_REQUESTS && self.status_codes.contains(&status.as_u16())
    }

    /// Delay before the next attempt. A `Retry-After` hint from a retryable
    /// 5xx wins over the exponential schedule but never exceeds the cap.
    fn wait(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let cap = Duration::from_millis(self.max_backoff_ms);
        match retry_after {
            Some(hint) => hint.min(cap),
            None => {
                let exp = self
                    .base_backoff_ms
                    .saturating_mul(1u64 << attempt.saturating_sub(1).min(20));
                let jitter = if self.jitter_ms > 0 {
                    rand::thread_rng().gen_range(0..=self.jitter_ms)
                } else {
                    0
                };
                Duration::from_millis(exp.min(self.max_backoff_ms) + jitter)
            }
        }
    }
}

/// Seconds form of `Retry-After`; the HTTP-date form is ignored.
fn retry_after(resp: &Response) -> Option<Duration> {
    resp.headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Send a request, retrying transport errors and retryable statuses.
///
/// Once attempts are exhausted the last response is returned as-is, so the
/// caller still classifies its status.
pub async fn send_with_retry(
    client: &Client,
    method: Method,
    url: &str,
    headers: HeaderMap,
    body: Bytes,
    policy: &RetryPolicy,
) -> Result<Response> {
    let attempts = policy.max_retries + 1;
    let mut attempt = 0;

    loop {
        attempt += 1;
        let last = attempt >= attempts;

        // Strip the URL from reqwest errors: query strings carry API keys.
        let outcome = client
            .request(method.clone(), url)
            .headers(headers.clone())
            .body(body.clone())
            .send()
            .await
            .map_err(|e| e.without_url());

        let wait = match outcome {
            Ok(resp) if !policy.retries(resp.status()) => return Ok(resp),
            Ok(resp) if last => {
                debug!(attempts, status = %resp.status(), "upstream retries exhausted");
                return Ok(resp);
            }
            Err(e) if last => {
                return Err(e).context(format!("upstream unreachable after {} attempts", attempt));
            }
            Ok(resp) => {
                let wait = policy.wait(attempt, retry_after(&resp));
                warn!(attempt, attempts, status = %resp.status(), wait_ms = wait.as_millis() as u64, "retrying upstream call");
                wait
            }
            Err(e) => {
                let wait = policy.wait(attempt, None);
                warn!(attempt, attempts, error = %e, wait_ms = wait.as_millis() as u64, "retrying upstream call");
                wait
            }
        };

        sleep(wait).await;
    }
}
