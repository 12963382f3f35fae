//! Persistent overflow cache for the event queue (spec.md §4.1, §6
//! "Persisted state layout").

use async_trait::async_trait;
use monitor_core::model::MonitorData;
use serde::{Deserialize, Serialize};

/// Capability the platform adapter exposes for key-value persistence
/// (spec.md §4.4, "storage"). Implementations (browser `localStorage`,
/// mini-program `Storage` API, ...) live outside this crate; tests use
/// `queue::storage::MemoryStorage` below.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, key: &str, value: Vec<u8>);
    async fn remove(&self, key: &str);
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistedStats {
    pub success_count: u64,
    pub failed_count: u64,
}

/// On-disk/localStorage shape (spec.md §6, "Persisted state layout"):
/// `{queue, timestamp, stats}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub queue: Vec<MonitorData>,
    pub timestamp_ms: i64,
    pub stats: PersistedStats,
}

pub const SNAPSHOT_TTL_MS: i64 = 24 * 60 * 60 * 1000;
pub const SNAPSHOT_DEBOUNCE_MS: u64 = 1000;

/// Discard a snapshot older than 24h (spec.md §4.1). A parse failure is
/// treated as a corrupt snapshot and discarded, never propagated
/// (spec.md §4.1, "Failure semantics").
pub fn decode_snapshot(bytes: &[u8], now_ms: i64) -> Option<PersistedSnapshot> {
    let snapshot: PersistedSnapshot = serde_json::from_slice(bytes).ok()?;
    if now_ms.saturating_sub(snapshot.timestamp_ms) > SNAPSHOT_TTL_MS {
        return None;
    }
    Some(snapshot)
}

pub fn encode_snapshot(snapshot: &PersistedSnapshot) -> Vec<u8> {
    serde_json::to_vec(snapshot).unwrap_or_default()
}

/// In-memory `KeyValueStorage`, used by tests and as a reference
/// implementation.
#[derive(Default)]
pub struct MemoryStorage {
    inner: tokio::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: Vec<u8>) {
        self.inner.lock().await.insert(key.to_string(), value);
    }

    async fn remove(&self, key: &str) {
        self.inner.lock().await.remove(key);
    }
}
