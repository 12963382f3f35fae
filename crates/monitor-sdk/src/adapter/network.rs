//! `network`: the sole component allowed to issue the telemetry upload
//! (spec.md §4.4). Holds the original, unwrapped [`HttpClient`] so its
//! own traffic is never observed by the performance capability's
//! decorator, and applies the SDK's self-filter contract before sending.

use super::http::{HttpClient, HttpError, HttpRequest};
use async_trait::async_trait;
use monitor_core::model::MonitorData;
use std::sync::Arc;
use std::time::Duration;

/// URL substrings identifying the SDK's own report endpoints
/// (spec.md §4.4, filter contract point 1).
pub const TELEMETRY_PATH_PATTERNS: &[&str] =
    &["/api/monitor/", "/api/error-logs", "/api/health"];

/// Known SDK symbol substrings; an error whose message or stack contains
/// one of these is dropped before upload (spec.md §4.4, filter contract
/// point 2) so the SDK never reports on itself.
pub const SDK_SELF_REFERENCE_MARKERS: &[&str] = &[
    "MonitorSDK",
    "PlatformAdapter",
    "sendData",
    "transformDataToReportDto",
];

pub fn is_telemetry_url(url: &str) -> bool {
    TELEMETRY_PATH_PATTERNS.iter().any(|p| url.contains(p))
}

pub fn mentions_sdk_internals(text: &str) -> bool {
    SDK_SELF_REFERENCE_MARKERS.iter().any(|m| text.contains(m))
}

/// Returns `true` if this event should be dropped per the self-filter
/// contract (spec.md §4.4). Exercises both filter rules so a single call
/// covers "is this our own traffic" regardless of event kind.
pub fn should_filter_event(event: &MonitorData) -> bool {
    if let MonitorData::Performance(p) = event {
        if let Some(resource) = &p.resource {
            if is_telemetry_url(&resource.name) {
                return true;
            }
        }
    }
    if let MonitorData::Error(e) = event {
        if mentions_sdk_internals(&e.message) {
            return true;
        }
        if let Some(stack) = &e.stack {
            if mentions_sdk_internals(stack) {
                return true;
            }
        }
    }
    false
}

#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Sends one batch. Array inputs are sent one record per call — the
    /// backend accepts single records (spec.md §4.4).
    async fn send_data(&self, endpoint: &str, records: &[MonitorData]) -> Result<(), HttpError>;
}

/// Default `NetworkClient`: serializes each surviving record to the
/// backend's report DTO and `POST`s it with the original, undecorated
/// HTTP client.
pub struct FilteringNetworkClient {
    http: Arc<dyn HttpClient>,
    api_key: Option<String>,
    timeout: Duration,
}

impl FilteringNetworkClient {
    pub fn new(http: Arc<dyn HttpClient>, api_key: Option<String>, timeout: Duration) -> Self {
        Self { http, api_key, timeout }
    }
}

#[async_trait]
impl NetworkClient for FilteringNetworkClient {
    async fn send_data(&self, endpoint: &str, records: &[MonitorData]) -> Result<(), HttpError> {
        for record in records {
            if should_filter_event(record) {
                continue;
            }
            let Some(dto) = crate::dto::ReportDto::from_monitor_data(record) else {
                continue;
            };
            let body = serde_json::to_vec(&dto)
                .map_err(|e| HttpError::Transport(format!("serialize report dto: {e}")))?;

            let mut headers = std::collections::BTreeMap::new();
            headers.insert("Content-Type".to_string(), "application/json".to_string());
            if let Some(key) = &self.api_key {
                headers.insert("X-API-Key".to_string(), key.clone());
            }

            let request = HttpRequest {
                url: endpoint.to_string(),
                method: "POST".to_string(),
                headers,
                body,
                timeout: self.timeout,
            };
            self.http.send(request).await?;
        }
        Ok(())
    }
}
