use crate::error::FetchError;
use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; rv:102.0) Gecko/20100101 Firefox/102.0";

/// An [`HttpClient`] wrapper that injects a fixed set of headers into every
/// request.
///
/// Some station vendors only answer requests that look like they come from
/// their own web page, so the station client sends a browser user agent and
/// a `Referer` pointing at the station page.
pub struct StaticHeaders<C> {
    pub inner: C,
    headers: HeaderMap,
}

impl<C> StaticHeaders<C> {
    /// Builds the wrapper from `(name, value)` pairs.
    pub fn new<'a>(
        inner: C,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::InvalidHeader(format!("{name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| FetchError::InvalidHeader(format!("{name}: {e}")))?;
            headers.insert(name, value);
        }
        Ok(Self { inner, headers })
    }

    /// Browser-like headers with the given `Referer`.
    pub fn browser(inner: C, referer: &str) -> Result<Self, FetchError> {
        Self::new(
            inner,
            [
                ("User-Agent", BROWSER_USER_AGENT),
                ("Referer", referer),
                ("Accept-Language", "en-US,en;q=0.9"),
                ("Connection", "keep-alive"),
            ],
        )
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for StaticHeaders<C> {
    async fn execute(&self, mut req: reqwest::Request) -> Result<Bytes, FetchError> {
        for (name, value) in &self.headers {
            req.headers_mut().insert(name.clone(), value.clone());
        }
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records the headers of the last request it saw.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Option<HeaderMap>>,
    }

    #[async_trait]
    impl HttpClient for Recorder {
        async fn execute(&self, req: reqwest::Request) -> Result<Bytes, FetchError> {
            *self.seen.lock().unwrap() = Some(req.headers().clone());
            Ok(Bytes::from_static(b"{}"))
        }
    }

    #[tokio::test]
    async fn test_browser_headers_are_injected() {
        let client =
            StaticHeaders::browser(Recorder::default(), "https://example.org/station/1").unwrap();
        let req = reqwest::Request::new(
            reqwest::Method::GET,
            "https://example.org/api".parse().unwrap(),
        );

        client.execute(req).await.unwrap();

        let seen = client.inner.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen["referer"], "https://example.org/station/1");
        assert!(seen["user-agent"].to_str().unwrap().starts_with("Mozilla"));
    }

    #[test]
    fn test_invalid_header_value_rejected() {
        let result = StaticHeaders::new(Recorder::default(), [("Referer", "bad\nvalue")]);
        assert!(matches!(result, Err(FetchError::InvalidHeader(_))));
    }
}
