//! Debounced persistence wrapper around [`EventQueue`] (spec.md §4.1,
//! "Optional persistence").

use super::bounded::{EventQueue, QueueSignal};
use super::storage::{
    decode_snapshot, encode_snapshot, KeyValueStorage, PersistedSnapshot, PersistedStats,
    SNAPSHOT_DEBOUNCE_MS,
};
use monitor_core::model::MonitorData;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub struct PersistentQueueConfig {
    pub max_size: usize,
    pub max_cache_size: usize,
    pub storage_key: String,
}

/// Wraps a plain [`EventQueue`] with a debounced snapshot to a
/// [`KeyValueStorage`] handle. The debounce means a burst of `add`s
/// triggers at most one write per second; `destroy()` (the base
/// manager's shutdown path) should call [`PersistentQueue::save_now`] to
/// flush the final state synchronously-from-the-caller's-perspective.
pub struct PersistentQueue {
    queue: EventQueue,
    storage: Arc<dyn KeyValueStorage>,
    key: String,
    max_cache_size: usize,
    dirty: bool,
    last_saved: Option<Instant>,
}

impl PersistentQueue {
    pub fn new(config: PersistentQueueConfig, storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            queue: EventQueue::new(config.max_size),
            storage,
            key: config.storage_key,
            max_cache_size: config.max_cache_size,
            dirty: false,
            last_saved: None,
        }
    }

    /// Restores from storage, discarding a snapshot older than 24h or one
    /// that fails to parse (spec.md §4.1). Never returns an error: storage
    /// errors are logged and swallowed (spec.md §4.1, "Failure
    /// semantics").
    pub async fn restore(&mut self, now_ms: i64) {
        let Some(bytes) = self.storage.get(&self.key).await else {
            return;
        };
        match decode_snapshot(&bytes, now_ms) {
            Some(snapshot) => {
                self.queue.restore(snapshot.queue);
                debug!(key = %self.key, restored = self.queue.len(), "restored persisted queue snapshot");
            }
            None => {
                warn!(key = %self.key, "discarding stale or corrupt queue snapshot");
                self.storage.remove(&self.key).await;
            }
        }
    }

    pub fn add(&mut self, item: MonitorData) -> Option<QueueSignal> {
        let signal = self.queue.add(item);
        self.dirty = true;
        signal
    }

    pub fn get_batch(&mut self, n: usize) -> Vec<MonitorData> {
        let batch = self.queue.get_batch(n);
        if !batch.is_empty() {
            self.dirty = true;
        }
        batch
    }

    pub fn on_send_success(&mut self, batch: &[MonitorData]) {
        self.queue.on_send_success(batch);
        self.dirty = true;
    }

    pub fn on_send_error(&mut self, batch: Vec<MonitorData>) -> QueueSignal {
        let signal = self.queue.on_send_error(batch);
        self.dirty = true;
        signal
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Called periodically (e.g. from the base manager's flush tick).
    /// Writes only if dirty and at least `SNAPSHOT_DEBOUNCE_MS` elapsed
    /// since the last write.
    pub async fn maybe_save(&mut self, now_ms: i64) {
        if !self.dirty {
            return;
        }
        let elapsed_ok = self
            .last_saved
            .map(|t| t.elapsed().as_millis() as u64 >= SNAPSHOT_DEBOUNCE_MS)
            .unwrap_or(true);
        if elapsed_ok {
            self.save_now(now_ms).await;
        }
    }

    /// Unconditional save, used by `destroy()`'s final flush.
    pub async fn save_now(&mut self, now_ms: i64) {
        let stats = self.queue.stats();
        let snapshot = PersistedSnapshot {
            queue: self.queue.snapshot(self.max_cache_size),
            timestamp_ms: now_ms,
            stats: PersistedStats {
                success_count: stats.success_count,
                failed_count: stats.failed_count,
            },
        };
        self.storage.set(&self.key, encode_snapshot(&snapshot)).await;
        self.dirty = false;
        self.last_saved = Some(Instant::now());
    }
}
