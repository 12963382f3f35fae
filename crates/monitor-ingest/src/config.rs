//! Ingestion pipeline configuration (spec.md §5, §9), environment-variable
//! first with `from_env()`/`validate()`, mirroring
//! `workflow-engine-core::config::WorkflowConfig`.

use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    /// Aggregation queue shard count; jobs route by
    /// `hash(project_id, error_hash) % n_shards` (spec.md §5, §9).
    pub n_shards: u32,
    pub worker_concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2_000,
            n_shards: 8,
            worker_concurrency: 4,
        }
    }
}

impl QueueConfig {
    fn from_env() -> Result<Self, IngestError> {
        Ok(Self {
            max_retries: parse_env("MONITOR_MAX_RETRIES", 3)?,
            base_delay_ms: parse_env("MONITOR_RETRY_BASE_DELAY_MS", 2_000)?,
            n_shards: parse_env("MONITOR_AGGREGATION_SHARDS", 8)?,
            worker_concurrency: parse_env("MONITOR_WORKER_CONCURRENCY", 4)?,
        })
    }

    /// `2^attempt · baseDelay` (spec.md §4.6).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << attempt.min(16)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMapConfig {
    pub cache_capacity: usize,
    pub cache_ttl_seconds: u64,
    pub parse_timeout_ms: u64,
}

impl Default for SourceMapConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 256,
            cache_ttl_seconds: 24 * 60 * 60,
            parse_timeout_ms: 2_000,
        }
    }
}

impl SourceMapConfig {
    fn from_env() -> Result<Self, IngestError> {
        Ok(Self {
            cache_capacity: parse_env("MONITOR_SOURCEMAP_CACHE_CAPACITY", 256)?,
            cache_ttl_seconds: parse_env("MONITOR_SOURCEMAP_CACHE_TTL_SECONDS", 24 * 60 * 60)?,
            parse_timeout_ms: parse_env("MONITOR_SOURCEMAP_PARSE_TIMEOUT_MS", 2_000)?,
        })
    }

    pub fn parse_timeout(&self) -> Duration {
        Duration::from_millis(self.parse_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: String,
    /// Minimum gap between sends to a single recipient (spec.md §4.9,
    /// "per-recipient pacing is ≥ 1s").
    pub per_recipient_pacing_ms: u64,
    pub send_timeout_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            from_address: "alerts@monitor.invalid".to_string(),
            per_recipient_pacing_ms: 1_000,
            send_timeout_ms: 30_000,
        }
    }
}

impl NotificationConfig {
    fn from_env() -> Result<Self, IngestError> {
        Ok(Self {
            smtp_host: env::var("MONITOR_SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            smtp_port: parse_env("MONITOR_SMTP_PORT", 587)?,
            smtp_username: env::var("MONITOR_SMTP_USERNAME").ok(),
            smtp_password: env::var("MONITOR_SMTP_PASSWORD").ok(),
            from_address: env::var("MONITOR_SMTP_FROM")
                .unwrap_or_else(|_| "alerts@monitor.invalid".to_string()),
            per_recipient_pacing_ms: parse_env("MONITOR_NOTIFY_PACING_MS", 1_000)?,
            send_timeout_ms: parse_env("MONITOR_SMTP_TIMEOUT_MS", 30_000)?,
        })
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.per_recipient_pacing_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Config-cache TTL (spec.md §9, "Config cache invalidation": "short TTL,
/// e.g. 30s, is sufficient").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub project_config_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            project_config_ttl_seconds: 30,
        }
    }
}

impl CacheConfig {
    fn from_env() -> Result<Self, IngestError> {
        Ok(Self {
            project_config_ttl_seconds: parse_env("MONITOR_CONFIG_CACHE_TTL_SECONDS", 30)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub database_url: String,
    pub redis_url: String,
    pub queue: QueueConfig,
    pub sourcemap: SourceMapConfig,
    pub notification: NotificationConfig,
    pub cache: CacheConfig,
    /// Optional LLM diagnosis endpoint; absent disables the worker
    /// entirely (spec.md §9, "Optional LLM diagnosis").
    pub ai_diagnosis_endpoint: Option<String>,
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, IngestError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").map_err(|_| IngestError::Internal {
                worker: "config".to_string(),
                message: "DATABASE_URL not set".to_string(),
            })?,
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string()),
            queue: QueueConfig::from_env()?,
            sourcemap: SourceMapConfig::from_env()?,
            notification: NotificationConfig::from_env()?,
            cache: CacheConfig::from_env()?,
            ai_diagnosis_endpoint: env::var("MONITOR_AI_DIAGNOSIS_ENDPOINT").ok(),
        })
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.queue.n_shards == 0 {
            return Err(IngestError::Internal {
                worker: "config".to_string(),
                message: "MONITOR_AGGREGATION_SHARDS must be > 0".to_string(),
            });
        }
        if self.queue.worker_concurrency == 0 {
            return Err(IngestError::Internal {
                worker: "config".to_string(),
                message: "MONITOR_WORKER_CONCURRENCY must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, IngestError> {
    match env::var(key) {
        Ok(v) => v.parse().map_err(|_| IngestError::Internal {
            worker: "config".to_string(),
            message: format!("{key}: invalid value {v:?}"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let cfg = QueueConfig::default();
        assert_eq!(cfg.backoff(0), Duration::from_millis(2_000));
        assert_eq!(cfg.backoff(1), Duration::from_millis(4_000));
        assert_eq!(cfg.backoff(2), Duration::from_millis(8_000));
    }

    #[test]
    fn validate_rejects_zero_shards() {
        let mut cfg = IngestConfig {
            database_url: "postgres://localhost/test".to_string(),
            redis_url: "redis://localhost".to_string(),
            queue: QueueConfig::default(),
            sourcemap: SourceMapConfig::default(),
            notification: NotificationConfig::default(),
            cache: CacheConfig::default(),
            ai_diagnosis_endpoint: None,
        };
        cfg.queue.n_shards = 0;
        assert!(cfg.validate().is_err());
    }
}
