use super::client::HttpClient;
use crate::error::FetchError;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

pub struct BasicClient(reqwest::Client);

impl BasicClient {
    /// Builds a client with 30 s request and 10 s connect timeouts.
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self(client))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> Result<Bytes, FetchError> {
        let response = self.0.execute(req).await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_is_a_transport_error() {
        let client = BasicClient::new().unwrap();
        let req = reqwest::Request::new(
            reqwest::Method::GET,
            "http://127.0.0.1:9/unreachable".parse().unwrap(),
        );

        let err = client.execute(req).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
        assert!(err.is_retryable());
    }
}
