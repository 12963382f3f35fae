use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertRuleType {
    ErrorCount,
    ErrorRate,
    Performance,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl Comparator {
    pub fn evaluate(&self, observed: f64, threshold: f64) -> bool {
        match self {
            Comparator::GreaterThan => observed > threshold,
            Comparator::GreaterThanOrEqual => observed >= threshold,
            Comparator::LessThan => observed < threshold,
            Comparator::LessThanOrEqual => observed <= threshold,
        }
    }
}

/// The metric a rule evaluates. `AggregationCount`/`ProjectTotal`
/// disambiguate the `errorCount` rule's "relevant aggregation, or project
/// total" condition (spec.md §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlertCondition {
    AggregationCount,
    ProjectTotalCount,
    ErrorRate,
    Metric { name: String },
    /// A restricted predicate grammar over aggregation fields, e.g.
    /// `"occurrence_count > 10 && error_level >= 3"`. The exact grammar is
    /// an implementation decision the spec leaves open (spec.md §9,
    /// "Open questions"); see `monitor_ingest::alert::custom` for the
    /// parser this repository settles on.
    Custom { expression: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertAction {
    Email,
    Webhook,
    Slack,
    Dingtalk,
}

/// Per-project alert rule (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub project_id: String,
    pub rule_type: AlertRuleType,
    pub condition: AlertCondition,
    pub comparator: Comparator,
    pub threshold: f64,
    pub time_window_seconds: u64,
    pub actions: Vec<AlertAction>,
    pub enabled: bool,
}

/// Append-only record of a firing (spec.md §3). Never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertHistory {
    pub id: String,
    pub rule_id: String,
    pub project_id: String,
    pub aggregation_error_hash: Option<String>,
    pub triggered_value: f64,
    pub threshold: f64,
    pub time_window_seconds: u64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub status: AlertHistoryStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertHistoryStatus {
    Sent,
    Failed,
    Pending,
}
