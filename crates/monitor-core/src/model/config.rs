use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AlertLevel {
    Low = 1,
    Medium = 2,
    High = 3,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub ai_diagnosis: bool,
    pub aggregation: bool,
    pub sourcemap: bool,
}

/// Per-project configuration (spec.md §3). Created by the admin surface,
/// referenced read-only by every worker; the config cache (spec.md §5,
/// "Shared resources") wraps a `ConfigRepository` with a short TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project_id: String,
    pub name: String,
    pub api_key: String,
    pub alert_email: Option<String>,
    pub alert_level: AlertLevel,
    pub flags: FeatureFlags,
    pub sourcemap_path: Option<String>,
}
