//! End-to-end wiring: fake platform adapter + in-memory storage driving
//! `MonitorSdk::init`/`capture_error`/`flush`/`destroy` (spec.md §4.2-§4.4).

use async_trait::async_trait;
use monitor_core::model::{MonitorData, Platform};
use monitor_sdk::adapter::{
    BehaviorAdapter, ErrorCaptureAdapter, HttpClient, HttpRequest, HttpResponse, NetworkClient,
    PerformanceAdapter, PlatformAdapter, RawErrorCapture,
};
use monitor_sdk::adapter::http::HttpError;
use monitor_sdk::config::SdkConfig;
use monitor_sdk::queue::MemoryStorage;
use std::sync::{Arc, Mutex};

struct RecordingHttpClient {
    sent: Arc<Mutex<Vec<HttpRequest>>>,
}

#[async_trait]
impl HttpClient for RecordingHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.sent.lock().unwrap().push(request);
        Ok(HttpResponse {
            status: 200,
            body: Vec::new(),
        })
    }
}

struct NoopErrorCapture;
impl ErrorCaptureAdapter for NoopErrorCapture {
    fn init(&self, _on_error: Box<dyn Fn(RawErrorCapture) + Send + Sync>) {}
    fn capture(&self, _error: RawErrorCapture, _extra: Option<monitor_core::model::Value>) {}
    fn destroy(&self) {}
}

struct NoopPerformance;
#[async_trait]
impl PerformanceAdapter for NoopPerformance {
    fn on_http_observation(&self, _observation: monitor_sdk::adapter::HttpObservation) {}
    async fn page_performance(&self) -> Option<MonitorData> {
        None
    }
}

struct NoopBehavior;
impl BehaviorAdapter for NoopBehavior {
    fn init(&self, _on_behavior: Box<dyn Fn(MonitorData) + Send + Sync>) {}
    fn destroy(&self) {}
}

struct FakeAdapter {
    network: Arc<dyn NetworkClient>,
}

impl PlatformAdapter for FakeAdapter {
    fn error_capture(&self) -> &dyn ErrorCaptureAdapter {
        &NoopErrorCapture
    }
    fn performance(&self) -> &dyn PerformanceAdapter {
        &NoopPerformance
    }
    fn behavior(&self) -> &dyn BehaviorAdapter {
        &NoopBehavior
    }
    fn network(&self) -> Arc<dyn NetworkClient> {
        self.network.clone()
    }
}

fn test_config() -> SdkConfig {
    let mut config = SdkConfig::new("proj-1", "https://collector.example.com");
    config.sample_rate = 1.0; // deterministic: always enabled regardless of roll
    config.report.interval_ms = 3_600_000; // keep the background timer from firing during the test
    config
}

#[tokio::test]
async fn capture_error_flows_through_to_upload_on_first_occurrence() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let network = Arc::new(monitor_sdk::adapter::FilteringNetworkClient::new(
        Arc::new(RecordingHttpClient { sent: sent.clone() }),
        None,
        std::time::Duration::from_secs(5),
    ));
    let adapter: Arc<dyn PlatformAdapter> = Arc::new(FakeAdapter { network });
    let storage = Arc::new(MemoryStorage::default());

    let sdk = monitor_sdk::MonitorSdk::init(test_config(), adapter, storage, Platform::Web)
        .await
        .unwrap();

    sdk.capture_error(
        RawErrorCapture {
            message: "TypeError: cannot read properties of undefined".to_string(),
            stack: Some("at render (app.js:10:4)".to_string()),
            filename: Some("/static/app.js".to_string()),
            lineno: Some(10),
            colno: Some(4),
        },
        None,
    )
    .await;

    sdk.flush().await.unwrap();
    assert_eq!(sent.lock().unwrap().len(), 1);

    sdk.destroy().await;
}

#[tokio::test]
async fn sdk_internal_error_is_filtered_before_upload() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let network = Arc::new(monitor_sdk::adapter::FilteringNetworkClient::new(
        Arc::new(RecordingHttpClient { sent: sent.clone() }),
        None,
        std::time::Duration::from_secs(5),
    ));
    let adapter: Arc<dyn PlatformAdapter> = Arc::new(FakeAdapter { network });
    let storage = Arc::new(MemoryStorage::default());

    let sdk = monitor_sdk::MonitorSdk::init(test_config(), adapter, storage, Platform::Web)
        .await
        .unwrap();

    sdk.capture_error(
        RawErrorCapture {
            message: "TypeError in MonitorSDK.sendData: network unreachable".to_string(),
            stack: None,
            filename: None,
            lineno: None,
            colno: None,
        },
        None,
    )
    .await;

    sdk.flush().await.unwrap();
    assert!(sent.lock().unwrap().is_empty());

    sdk.destroy().await;
}

#[tokio::test]
async fn destroy_performs_a_final_flush() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let network = Arc::new(monitor_sdk::adapter::FilteringNetworkClient::new(
        Arc::new(RecordingHttpClient { sent: sent.clone() }),
        None,
        std::time::Duration::from_secs(5),
    ));
    let adapter: Arc<dyn PlatformAdapter> = Arc::new(FakeAdapter { network });
    let storage = Arc::new(MemoryStorage::default());

    let sdk = monitor_sdk::MonitorSdk::init(test_config(), adapter, storage, Platform::Web)
        .await
        .unwrap();

    sdk.capture_error(
        RawErrorCapture {
            message: "ReferenceError: x is not defined".to_string(),
            stack: None,
            filename: None,
            lineno: None,
            colno: None,
        },
        None,
    )
    .await;

    // No explicit flush() call — destroy() must still deliver the event.
    sdk.destroy().await;
    assert_eq!(sent.lock().unwrap().len(), 1);
}
