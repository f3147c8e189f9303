use crate::error::FetchError;
use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::warn;

/// An [`HttpClient`] wrapper that retries transient failures with
/// exponential backoff.
///
/// The delay before retry `n` (starting at 1) is
/// `backoff_factor * 2^(n-1)` seconds. Non-retryable failures such as a 404
/// are returned immediately.
pub struct Retry<C> {
    pub inner: C,
    pub retries: usize,
    pub backoff_factor: f64,
}

impl<C> Retry<C> {
    pub fn new(inner: C, retries: usize, backoff_factor: f64) -> Self {
        Self {
            inner,
            retries,
            backoff_factor,
        }
    }

    fn delay(&self, retry: usize) -> Duration {
        let exponent = retry.saturating_sub(1).min(16) as i32;
        Duration::from_secs_f64((self.backoff_factor * 2f64.powi(exponent)).max(0.0))
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for Retry<C> {
    async fn execute(&self, req: reqwest::Request) -> Result<Bytes, FetchError> {
        let url = req.url().clone();
        let mut attempts = 0;
        let mut pending = Some(req);

        loop {
            // Streaming bodies cannot be cloned; those get a single attempt.
            let current = match pending.take() {
                Some(req) => req,
                None => return Err(FetchError::Url(format!("request to {url} is not replayable"))),
            };
            let next = current.try_clone();
            attempts += 1;

            match self.inner.execute(current).await {
                Ok(body) => return Ok(body),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempts > self.retries || next.is_none() => {
                    return Err(FetchError::RetriesExhausted {
                        attempts,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.delay(attempts);
                    warn!(
                        url = %url,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    pending = next;
                }
            }
        }
    }
}
