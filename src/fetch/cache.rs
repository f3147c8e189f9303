use crate::error::FetchError;
use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// An [`HttpClient`] wrapper that keeps successful GET bodies in memory for
/// a fixed time-to-live, keyed by full URL.
pub struct Cached<C> {
    pub inner: C,
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Bytes)>>,
}

impl<C> Cached<C> {
    pub fn new(inner: C, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    // Entries are inserted whole, so a poisoned map is still consistent.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, (Instant, Bytes)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, key: &str) -> Option<Bytes> {
        let mut entries = self.entries();
        match entries.get(key) {
            Some((stored, body)) if stored.elapsed() < self.ttl => Some(body.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn store(&self, key: String, body: Bytes) {
        self.entries().insert(key, (Instant::now(), body));
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for Cached<C> {
    async fn execute(&self, req: reqwest::Request) -> Result<Bytes, FetchError> {
        if req.method() != reqwest::Method::GET {
            return self.inner.execute(req).await;
        }

        let key = req.url().to_string();
        if let Some(body) = self.lookup(&key) {
            debug!(url = %key, "Cache hit");
            return Ok(body);
        }

        let body = self.inner.execute(req).await?;
        self.store(key, body.clone());
        Ok(body)
    }
}
