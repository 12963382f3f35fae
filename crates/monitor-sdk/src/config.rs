//! SDK configuration object (spec.md §6).

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Testing,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorConfig {
    pub enabled: bool,
    pub max_errors: usize,
    #[serde(skip, default)]
    pub filters: Vec<regex::Regex>,
    pub sample_rate: f64,
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_errors: 100,
            filters: Vec::new(),
            sample_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub enabled: bool,
    pub enable_resource_timing: bool,
    pub enable_user_timing: bool,
    pub sample_rate: f64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enable_resource_timing: true,
            enable_user_timing: false,
            sample_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    pub enabled: bool,
    pub auto_track_click: bool,
    pub auto_track_page_view: bool,
    pub max_behaviors: usize,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_track_click: true,
            auto_track_page_view: true,
            max_behaviors: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub interval_ms: u64,
    pub max_queue_size: usize,
    pub batch_size: usize,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub enable_offline_cache: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            max_queue_size: crate::queue::DEFAULT_MAX_SIZE,
            batch_size: 20,
            timeout_ms: 5_000,
            max_retries: 3,
            retry_delay_ms: 2_000,
            enable_offline_cache: true,
        }
    }
}

impl ReportConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    pub project_id: String,
    pub server_url: String,
    pub api_key: Option<String>,
    pub user_id: Option<String>,
    pub tags: Option<monitor_core::model::Tags>,
    pub project_version: Option<String>,
    pub environment: Option<Environment>,
    pub enable_in_dev: bool,
    pub sample_rate: f64,
    pub error: ErrorConfig,
    pub performance: PerformanceConfig,
    pub behavior: BehaviorConfig,
    pub report: ReportConfig,
}

impl SdkConfig {
    pub fn new(project_id: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            server_url: server_url.into(),
            api_key: None,
            user_id: None,
            tags: None,
            project_version: None,
            environment: None,
            enable_in_dev: false,
            sample_rate: 1.0,
            error: ErrorConfig::default(),
            performance: PerformanceConfig::default(),
            behavior: BehaviorConfig::default(),
            report: ReportConfig::default(),
        }
    }

    /// `ConfigInvalid` — missing `projectId`/`serverUrl`, or a sample rate
    /// out of range (spec.md §7).
    pub fn validate(&self) -> Result<(), monitor_core::error::MonitorError> {
        if self.project_id.trim().is_empty() {
            return Err(monitor_core::error::MonitorError::ConfigInvalid {
                message: "projectId is required".to_string(),
            });
        }
        if self.server_url.trim().is_empty() {
            return Err(monitor_core::error::MonitorError::ConfigInvalid {
                message: "serverUrl is required".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.sample_rate) {
            return Err(monitor_core::error::MonitorError::ConfigInvalid {
                message: format!("sampleRate must be in [0, 1], got {}", self.sample_rate),
            });
        }
        Ok(())
    }

    /// `enabled` decision at init (spec.md §4.3): `false` in dev unless
    /// `enableInDev`, `false` with probability `1 − sampleRate`.
    pub fn is_enabled(&self, roll: f64) -> bool {
        if self.environment == Some(Environment::Development) && !self.enable_in_dev {
            return false;
        }
        roll <= self.sample_rate
    }
}
