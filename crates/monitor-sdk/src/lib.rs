//! Client SDK runtime (spec.md §4): platform adapter contract, bounded
//! event queue, and the base/error managers that turn raw platform
//! captures into uploaded report DTOs.

pub mod adapter;
pub mod config;
pub mod dto;
pub mod manager;
pub mod queue;

use adapter::{PlatformAdapter, RawErrorCapture};
use config::SdkConfig;
use manager::{BaseManager, ErrorManager, ErrorManagerConfig};
use monitor_core::model::{ErrorData, ErrorType, EventEnvelope, MonitorData, Platform};
use rand::Rng;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Top-level SDK handle (spec.md §4.3, "Base Manager owns configuration,
/// session id ... and a periodic flush"). One instance per process/page.
pub struct MonitorSdk {
    base: Arc<Mutex<BaseManager>>,
    error_manager: Mutex<ErrorManager>,
    adapter: Arc<dyn PlatformAdapter>,
    flush_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    platform: Platform,
}

impl MonitorSdk {
    /// `init`: validates config, decides `enabled`, restores any persisted
    /// queue, wires adapter callbacks to `addToQueue`, and starts the
    /// flush timer (spec.md §4.3).
    pub async fn init(
        config: SdkConfig,
        adapter: Arc<dyn PlatformAdapter>,
        storage: Arc<dyn queue::KeyValueStorage>,
        platform: Platform,
    ) -> Result<Arc<Self>, monitor_core::error::MonitorError> {
        config.validate()?;

        let roll: f64 = rand::thread_rng().gen_range(0.0..=1.0);
        let enabled = config.is_enabled(roll);

        let error_manager_config = ErrorManagerConfig {
            filters: config.error.filters.clone(),
            sample_rate: config.error.sample_rate,
            max_aggregations: 200,
            max_recent_errors: 5,
            ..ErrorManagerConfig::default()
        };

        let network = adapter.network();
        let mut base = BaseManager::new(config, network, storage, enabled);
        base.restore(now_ms()).await;
        let base = Arc::new(Mutex::new(base));

        let sdk = Arc::new(Self {
            base: base.clone(),
            error_manager: Mutex::new(ErrorManager::new(error_manager_config)),
            adapter,
            flush_handle: Mutex::new(None),
            platform,
        });

        sdk.wire_adapter_callbacks();

        let handle = manager::spawn_flush_loop(base);
        *sdk.flush_handle.lock().await = Some(handle);

        Ok(sdk)
    }

    fn wire_adapter_callbacks(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.adapter
            .error_capture()
            .init(Box::new(move |raw: RawErrorCapture| {
                let this = Arc::clone(&this);
                tokio::spawn(async move {
                    this.capture_error(raw, None).await;
                });
            }));
    }

    /// `errorCapture.capture(error, extra)`: synthesizes an event outside
    /// the automatic hooks (spec.md §4.4), running it through the error
    /// manager's filter/sample/fingerprint/aggregate/emit pipeline.
    pub async fn capture_error(&self, raw: RawErrorCapture, _extra: Option<monitor_core::model::Value>) {
        let envelope = EventEnvelope {
            id: Uuid::new_v4().to_string(),
            timestamp: now_ms(),
            project_id: String::new(),
            project_version: None,
            session_id: String::new(),
            user_id: None,
            page_url: String::new(),
            user_agent: String::new(),
            platform: self.platform,
            tags: None,
        };
        let error = ErrorData {
            envelope,
            error_type: ErrorType::JsError,
            message: raw.message,
            stack: raw.stack,
            filename: raw.filename,
            lineno: raw.lineno,
            colno: raw.colno,
            resolved: None,
            component_stack: None,
        };

        if adapter::network::should_filter_event(&MonitorData::Error(error.clone())) {
            return;
        }

        let roll: f64 = rand::thread_rng().gen_range(0.0..=1.0);
        let now = now_ms();
        let emitted = {
            let mut em = self.error_manager.lock().await;
            em.handle(error, roll, now)
        };
        if let Some(event) = emitted {
            let mut base = self.base.lock().await;
            base.add_to_queue(event);
        }
    }

    /// Records a non-error event (performance/behavior) directly, bypassing
    /// the error manager (spec.md §4.2 only governs error events).
    pub async fn record(&self, data: MonitorData) {
        if adapter::network::should_filter_event(&data) {
            return;
        }
        let mut base = self.base.lock().await;
        base.add_to_queue(data);
    }

    pub async fn flush(&self) -> Result<(), monitor_core::error::MonitorError> {
        self.base.lock().await.flush().await
    }

    /// `destroy()`: stops the timer, issues one final flush, releases
    /// adapter listeners, clears state (spec.md §4.3).
    pub async fn destroy(&self) {
        if let Some(handle) = self.flush_handle.lock().await.take() {
            handle.abort();
        }
        self.adapter.error_capture().destroy();
        self.adapter.behavior().destroy();
        self.base.lock().await.destroy(now_ms()).await;
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
