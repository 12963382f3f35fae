//! Platform adapter contract (spec.md §4.4). Polymorphic over the
//! capability set `{errorCapture, performance, behavior, network,
//! storage}` — concrete adapters (Web, mini-program) implement each
//! capability trait; `monitor-sdk`'s managers are generic over them.

pub mod http;
pub mod network;

pub use http::{HttpClient, HttpRequest, HttpResponse};
pub use network::{FilteringNetworkClient, NetworkClient, TELEMETRY_PATH_PATTERNS};

use async_trait::async_trait;
use monitor_core::model::MonitorData;
use std::sync::Arc;

/// Raw capture produced by the platform before it becomes a full
/// `MonitorData` record; the error manager stamps the rest of the
/// envelope.
#[derive(Debug, Clone)]
pub struct RawErrorCapture {
    pub message: String,
    pub stack: Option<String>,
    pub filename: Option<String>,
    pub lineno: Option<u32>,
    pub colno: Option<u32>,
}

/// `errorCapture`: subscribes to uncaught error, unhandled rejection, and
/// (web) resource-load error events (spec.md §4.4).
#[async_trait]
pub trait ErrorCaptureAdapter: Send + Sync {
    /// Wires `on_error` to fire on every captured error. Implementations
    /// typically register process-wide hooks on first call.
    fn init(&self, on_error: Box<dyn Fn(RawErrorCapture) + Send + Sync>);

    /// Synthesize an event outside the automatic hooks (manual
    /// `captureError` calls from application code).
    fn capture(&self, error: RawErrorCapture, extra: Option<monitor_core::model::Value>);

    fn destroy(&self);
}

#[derive(Debug, Clone)]
pub struct HttpObservation {
    pub url: String,
    pub method: String,
    pub status: Option<u16>,
    pub duration_ms: f64,
    pub success: bool,
}

/// `performance`: wraps the platform's HTTP primitive to record timing,
/// filtering telemetry endpoints so the SDK never observes its own
/// traffic (spec.md §4.4).
#[async_trait]
pub trait PerformanceAdapter: Send + Sync {
    fn on_http_observation(&self, observation: HttpObservation);

    /// Navigation timings, where available (not all platforms expose
    /// them).
    async fn page_performance(&self) -> Option<MonitorData>;
}

/// `behavior`: auto-tracked or manually recorded user-behavior
/// breadcrumbs.
pub trait BehaviorAdapter: Send + Sync {
    fn init(&self, on_behavior: Box<dyn Fn(MonitorData) + Send + Sync>);
    fn destroy(&self);
}

/// The full capability set a platform must provide (spec.md §4.4).
/// `network()` hands back the shared, already-constructed client holding
/// the original unwrapped HTTP primitive (spec.md §4.4, filter contract
/// point 3) so `BaseManager` can clone the `Arc` without borrowing the
/// adapter.
pub trait PlatformAdapter: Send + Sync {
    fn error_capture(&self) -> &dyn ErrorCaptureAdapter;
    fn performance(&self) -> &dyn PerformanceAdapter;
    fn behavior(&self) -> &dyn BehaviorAdapter;
    fn network(&self) -> Arc<dyn NetworkClient>;
}
