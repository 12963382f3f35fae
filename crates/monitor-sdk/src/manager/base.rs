//! Base manager: composes the platform adapter and the event queue,
//! drives sampling, periodic flush, and shutdown (spec.md §4.3).

use crate::adapter::NetworkClient;
use crate::config::SdkConfig;
use crate::queue::{PersistentQueue, PersistentQueueConfig, QueueSignal};
use monitor_core::error::MonitorError;
use monitor_core::model::{EventEnvelope, MonitorData};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, warn};
use uuid::Uuid;

pub const REPORT_ENDPOINT: &str = "/api/monitor/report";

/// One session id per process lifetime (spec.md §4.3).
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

pub struct BaseManager {
    pub config: SdkConfig,
    pub session_id: String,
    pub enabled: bool,
    queue: PersistentQueue,
    network: Arc<dyn NetworkClient>,
    stopped: AtomicBool,
}

impl BaseManager {
    pub fn new(
        config: SdkConfig,
        network: Arc<dyn NetworkClient>,
        storage: Arc<dyn crate::queue::KeyValueStorage>,
        enabled: bool,
    ) -> Self {
        let queue_config = PersistentQueueConfig {
            max_size: config.report.max_queue_size,
            max_cache_size: config.report.max_queue_size,
            storage_key: format!("monitor_sdk_queue::{}", config.project_id),
        };
        Self {
            session_id: new_session_id(),
            enabled,
            queue: PersistentQueue::new(queue_config, storage),
            network,
            stopped: AtomicBool::new(false),
            config,
        }
    }

    /// Restores any persisted queue snapshot (spec.md §4.1). No-op if
    /// `report.enable_offline_cache` is false.
    pub async fn restore(&mut self, now_ms: i64) {
        if self.config.report.enable_offline_cache {
            self.queue.restore(now_ms).await;
        }
    }

    /// Stamps `projectId`, `sessionId`, `tags` and enqueues, dropping the
    /// oldest item on overflow (spec.md §4.3). `platform` is stamped
    /// earlier, at capture time (`MonitorSdk::capture_error` etc. set it
    /// from the SDK's own `Platform` before the envelope ever reaches the
    /// queue) — `SdkConfig` carries no platform of its own to stamp with
    /// here.
    pub fn add_to_queue(&mut self, mut data: MonitorData) -> Option<QueueSignal> {
        if !self.enabled || self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        stamp_envelope(data.envelope_mut(), &self.config, &self.session_id);
        let signal = self.queue.add(data);
        if signal == Some(QueueSignal::QueueFull) {
            warn!(project_id = %self.config.project_id, "sdk queue full, dropped oldest event");
        }
        signal
    }

    /// Removes up to `batchSize` items and delegates to the network
    /// adapter; on failure the batch is unshifted back, preserving FIFO
    /// order (spec.md §4.3).
    pub async fn flush(&mut self) -> Result<(), MonitorError> {
        let batch = self.queue.get_batch(self.config.report.batch_size);
        if batch.is_empty() {
            return Ok(());
        }
        let endpoint = format!("{}{}", self.config.server_url, REPORT_ENDPOINT);
        match self.network.send_data(&endpoint, &batch).await {
            Ok(()) => {
                self.queue.on_send_success(&batch);
                Ok(())
            }
            Err(e) => {
                self.queue.on_send_error(batch);
                error!(error = %e, "flush failed, batch re-queued");
                Err(MonitorError::ResourceUnavailable {
                    message: format!("upload failed: {e}"),
                })
            }
        }
    }

    async fn maybe_persist(&mut self, now_ms: i64) {
        if self.config.report.enable_offline_cache {
            self.queue.maybe_save(now_ms).await;
        }
    }

    /// Stops further enqueues, then issues one last flush — errors are
    /// swallowed, matching the SDK's "never crash its host" contract
    /// (spec.md §5, §7).
    pub async fn destroy(&mut self, now_ms: i64) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Err(e) = self.flush().await {
            warn!(error = %e, "final flush on destroy failed, swallowing");
        }
        if self.config.report.enable_offline_cache {
            self.queue.save_now(now_ms).await;
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}

fn stamp_envelope(envelope: &mut EventEnvelope, config: &SdkConfig, session_id: &str) {
    envelope.project_id = config.project_id.clone();
    envelope.session_id = session_id.to_string();
    if envelope.user_id.is_none() {
        envelope.user_id = config.user_id.clone();
    }
    if envelope.project_version.is_none() {
        envelope.project_version = config.project_version.clone();
    }
    if let Some(tags) = &config.tags {
        let merged = envelope.tags.get_or_insert_with(Default::default);
        for (k, v) in tags {
            merged.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
}

/// Drives the periodic flush timer (spec.md §4.3, "start the flush timer
/// (`report.interval`, default 10 s)"). The caller owns the returned
/// `JoinHandle`; `shared.lock().await.destroy(..)` should be called
/// before dropping it so the final flush in §4.3 actually happens.
pub fn spawn_flush_loop(manager: Arc<Mutex<BaseManager>>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interval = {
            let guard = manager.lock().await;
            guard.config.report.interval()
        };
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now_ms = chrono::Utc::now().timestamp_millis();
            let mut guard = manager.lock().await;
            if guard.stopped.load(Ordering::SeqCst) {
                break;
            }
            if let Err(e) = guard.flush().await {
                warn!(error = %e, "periodic flush failed");
            }
            guard.maybe_persist(now_ms).await;
        }
    })
}
