//! Shared application state, built once by `monitor-app` and cloned (as
//! `Arc`s) into every worker thread actix spins up.

use monitor_ingest::config_cache::ConfigCache;
use monitor_ingest::repository::{AlertRuleRepository, ConfigRepository, SourceArchiveRepository};
use monitor_ingest::sink::RawEventSink;
use monitor_ingest::Pipeline;
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub configs: Arc<dyn ConfigRepository>,
    /// Short-TTL view of `configs` used by the intake surface to answer
    /// "unknown projectId" (404) without a repository round trip on every
    /// request (spec.md §4.5, "config lookup is cached with short TTL").
    pub config_cache: Arc<ConfigCache>,
    pub alert_rules: Arc<dyn AlertRuleRepository>,
    pub source_archives: Arc<dyn SourceArchiveRepository>,
    pub sink: Arc<dyn RawEventSink>,
    pub db_pool: Option<sqlx::PgPool>,
    pub started_at: Instant,
    /// Intake surface must never trust the client's `X-API-Key` for
    /// anything beyond lookup; require it unless explicitly disabled for
    /// local/dev use (spec.md §6, "Optional header `X-API-Key`").
    pub require_api_key: bool,
}

impl AppState {
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
