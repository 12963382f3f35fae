//! The platform's raw HTTP primitive (spec.md §9, "Monkey-patched HTTP
//! interception" design note): a single trait, decorated once by the
//! performance capability, held unwrapped by the network capability so
//! its own uploads are never observed.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
}

/// The undecorated HTTP primitive. Implementations wrap a real
/// fetch/XHR/wx.request equivalent; this crate only needs the contract
/// to drive the SDK's retry/backoff and self-filtering logic.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}
