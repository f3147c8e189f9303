use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Request;

use crate::error::FetchError;

/// A transport that turns a request into a successful response body.
///
/// Wrappers such as [`super::Retry`] and [`super::Cached`] implement this
/// trait around an inner client, so behaviors stack in any order.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> Result<Bytes, FetchError>;
}
