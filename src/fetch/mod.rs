mod basic;
mod cache;
mod client;
mod headers;
mod retry;

pub use basic::BasicClient;
pub use cache::Cached;
pub use client::HttpClient;
pub use headers::StaticHeaders;
pub use retry::Retry;

use crate::error::FetchError;
use bytes::Bytes;

/// Issues a GET for `url` with the given query parameters.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    query: &[(&str, String)],
) -> Result<Bytes, FetchError> {
    let url = reqwest::Url::parse_with_params(url, query)
        .map_err(|e| FetchError::Url(format!("{url}: {e}")))?;
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    client.execute(req).await
}

/// The transport stack used for every upstream: cache over bounded retry.
pub type Transport<C> = Cached<Retry<C>>;

/// Wraps `inner` with retry and caching.
pub fn transport<C: HttpClient>(
    inner: C,
    retries: usize,
    backoff_factor: f64,
    cache_ttl: std::time::Duration,
) -> Transport<C> {
    Cached::new(Retry::new(inner, retries, backoff_factor), cache_ttl)
}
