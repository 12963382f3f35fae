//! `sqlx`-backed repository implementations (spec.md §4, "relational
//! store"), grounded in `services/content_processing` and
//! `services/realtime_communication`'s `sqlx`-over-Postgres pattern. Uses
//! the dynamic `query`/`query_as` API rather than the `query!` macros so
//! the crate builds without a live `DATABASE_URL` at compile time.

use super::{AggregationRepository, AlertHistoryRepository, AlertRuleRepository, ConfigRepository};
use crate::error::IngestError;
use async_trait::async_trait;
use monitor_core::model::{
    AggregationStatus, AlertAction, AlertCondition, AlertHistory, AlertHistoryStatus, AlertRule,
    AlertRuleType, Comparator, ErrorAggregation, ErrorLevel, ErrorType, ProjectConfig,
};
use sqlx::{PgPool, Row};
use std::collections::BTreeSet;

pub struct PostgresAggregationRepository {
    pool: PgPool,
}

impl PostgresAggregationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn transient(message: impl Into<String>) -> IngestError {
    IngestError::Transient {
        component: "postgres".to_string(),
        message: message.into(),
    }
}

#[async_trait]
impl AggregationRepository for PostgresAggregationRepository {
    async fn find_exact(
        &self,
        project_id: &str,
        error_hash: &str,
    ) -> Result<Option<ErrorAggregation>, IngestError> {
        let row = sqlx::query(
            "SELECT project_id, error_hash, error_type, message, stack, first_seen, last_seen, \
             occurrence_count, affected_users, error_level, status, alert_sent, alert_sent_at \
             FROM error_aggregations WHERE project_id = $1 AND error_hash = $2",
        )
        .bind(project_id)
        .bind(error_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| transient(e.to_string()))?;

        Ok(row.map(row_to_aggregation))
    }

    async fn list_for_project(&self, project_id: &str) -> Result<Vec<ErrorAggregation>, IngestError> {
        let rows = sqlx::query(
            "SELECT project_id, error_hash, error_type, message, stack, first_seen, last_seen, \
             occurrence_count, affected_users, error_level, status, alert_sent, alert_sent_at \
             FROM error_aggregations WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| transient(e.to_string()))?;

        Ok(rows.into_iter().map(row_to_aggregation).collect())
    }

    async fn upsert(&self, aggregation: ErrorAggregation) -> Result<(), IngestError> {
        let affected_users: Vec<String> = aggregation.affected_users.into_iter().collect();
        sqlx::query(
            "INSERT INTO error_aggregations \
             (project_id, error_hash, error_type, message, stack, first_seen, last_seen, \
              occurrence_count, affected_users, error_level, status, alert_sent, alert_sent_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13) \
             ON CONFLICT (project_id, error_hash) DO UPDATE SET \
             last_seen = EXCLUDED.last_seen, occurrence_count = EXCLUDED.occurrence_count, \
             affected_users = EXCLUDED.affected_users, error_level = EXCLUDED.error_level, \
             status = EXCLUDED.status, alert_sent = EXCLUDED.alert_sent, \
             alert_sent_at = EXCLUDED.alert_sent_at",
        )
        .bind(&aggregation.project_id)
        .bind(&aggregation.error_hash)
        .bind(error_type_to_str(aggregation.error_type))
        .bind(&aggregation.message)
        .bind(&aggregation.stack)
        .bind(aggregation.first_seen)
        .bind(aggregation.last_seen)
        .bind(aggregation.occurrence_count as i64)
        .bind(&affected_users)
        .bind(aggregation.error_level as i16)
        .bind(status_to_str(aggregation.status))
        .bind(aggregation.alert_sent)
        .bind(aggregation.alert_sent_at)
        .execute(&self.pool)
        .await
        .map_err(|e| transient(e.to_string()))?;
        Ok(())
    }
}

fn row_to_aggregation(row: sqlx::postgres::PgRow) -> ErrorAggregation {
    let affected_users: Vec<String> = row.try_get("affected_users").unwrap_or_default();
    let level: i16 = row.try_get("error_level").unwrap_or(1);
    ErrorAggregation {
        project_id: row.try_get("project_id").unwrap_or_default(),
        error_hash: row.try_get("error_hash").unwrap_or_default(),
        error_type: str_to_error_type(&row.try_get::<String, _>("error_type").unwrap_or_default()),
        message: row.try_get("message").unwrap_or_default(),
        stack: row.try_get("stack").ok(),
        source_location: None,
        first_seen: row.try_get("first_seen").unwrap_or_default(),
        last_seen: row.try_get("last_seen").unwrap_or_default(),
        occurrence_count: row.try_get::<i64, _>("occurrence_count").unwrap_or(0) as u64,
        affected_users: BTreeSet::from_iter(affected_users),
        error_level: level_from_i16(level),
        status: str_to_status(&row.try_get::<String, _>("status").unwrap_or_default()),
        alert_sent: row.try_get("alert_sent").unwrap_or(false),
        alert_sent_at: row.try_get("alert_sent_at").ok(),
        ai_diagnosis: None,
    }
}

fn level_from_i16(v: i16) -> ErrorLevel {
    match v {
        4 => ErrorLevel::Critical,
        3 => ErrorLevel::High,
        2 => ErrorLevel::Medium,
        _ => ErrorLevel::Low,
    }
}

fn error_type_to_str(t: ErrorType) -> &'static str {
    match t {
        ErrorType::JsError => "js_error",
        ErrorType::PromiseError => "promise_error",
        ErrorType::ResourceError => "resource_error",
        ErrorType::HttpError => "http_error",
        ErrorType::CustomError => "custom_error",
        ErrorType::FrameworkError => "framework_error",
    }
}

fn str_to_error_type(s: &str) -> ErrorType {
    match s {
        "promise_error" => ErrorType::PromiseError,
        "resource_error" => ErrorType::ResourceError,
        "http_error" => ErrorType::HttpError,
        "custom_error" => ErrorType::CustomError,
        "framework_error" => ErrorType::FrameworkError,
        _ => ErrorType::JsError,
    }
}

fn status_to_str(s: AggregationStatus) -> &'static str {
    match s {
        AggregationStatus::New => "new",
        AggregationStatus::Acknowledged => "acknowledged",
        AggregationStatus::Fixing => "fixing",
        AggregationStatus::Fixed => "fixed",
        AggregationStatus::Ignored => "ignored",
    }
}

fn str_to_status(s: &str) -> AggregationStatus {
    match s {
        "acknowledged" => AggregationStatus::Acknowledged,
        "fixing" => AggregationStatus::Fixing,
        "fixed" => AggregationStatus::Fixed,
        "ignored" => AggregationStatus::Ignored,
        _ => AggregationStatus::New,
    }
}

pub struct PostgresConfigRepository {
    pool: PgPool,
}

impl PostgresConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigRepository for PostgresConfigRepository {
    async fn get(&self, project_id: &str) -> Result<Option<ProjectConfig>, IngestError> {
        let row = sqlx::query(
            "SELECT project_id, name, api_key, alert_email, alert_level, \
             ai_diagnosis_enabled, aggregation_enabled, sourcemap_enabled, sourcemap_path \
             FROM project_configs WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| transient(e.to_string()))?;

        Ok(row.map(|r| ProjectConfig {
            project_id: r.try_get("project_id").unwrap_or_default(),
            name: r.try_get("name").unwrap_or_default(),
            api_key: r.try_get("api_key").unwrap_or_default(),
            alert_email: r.try_get("alert_email").ok(),
            alert_level: match r.try_get::<i16, _>("alert_level").unwrap_or(1) {
                3 => monitor_core::model::AlertLevel::High,
                2 => monitor_core::model::AlertLevel::Medium,
                _ => monitor_core::model::AlertLevel::Low,
            },
            flags: monitor_core::model::FeatureFlags {
                ai_diagnosis: r.try_get("ai_diagnosis_enabled").unwrap_or(false),
                aggregation: r.try_get("aggregation_enabled").unwrap_or(true),
                sourcemap: r.try_get("sourcemap_enabled").unwrap_or(true),
            },
            sourcemap_path: r.try_get("sourcemap_path").ok(),
        }))
    }
}

pub struct PostgresAlertRuleRepository {
    pool: PgPool,
}

impl PostgresAlertRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertRuleRepository for PostgresAlertRuleRepository {
    async fn enabled_rules_for_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<AlertRule>, IngestError> {
        let rows = sqlx::query(
            "SELECT id, project_id, rule_type, condition_json, comparator, threshold, \
             time_window_seconds, actions, enabled FROM alert_rules \
             WHERE project_id = $1 AND enabled = true",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| transient(e.to_string()))?;

        rows.into_iter()
            .map(|r| -> Result<AlertRule, IngestError> {
                let condition_json: serde_json::Value = r
                    .try_get("condition_json")
                    .map_err(|e| transient(e.to_string()))?;
                let condition: AlertCondition =
                    serde_json::from_value(condition_json).map_err(|e| transient(e.to_string()))?;
                let actions_json: serde_json::Value =
                    r.try_get("actions").map_err(|e| transient(e.to_string()))?;
                let actions: Vec<AlertAction> =
                    serde_json::from_value(actions_json).map_err(|e| transient(e.to_string()))?;
                Ok(AlertRule {
                    id: r.try_get("id").unwrap_or_default(),
                    project_id: r.try_get("project_id").unwrap_or_default(),
                    rule_type: str_to_rule_type(&r.try_get::<String, _>("rule_type").unwrap_or_default()),
                    condition,
                    comparator: str_to_comparator(
                        &r.try_get::<String, _>("comparator").unwrap_or_default(),
                    ),
                    threshold: r.try_get("threshold").unwrap_or(0.0),
                    time_window_seconds: r.try_get::<i64, _>("time_window_seconds").unwrap_or(0) as u64,
                    actions,
                    enabled: r.try_get("enabled").unwrap_or(true),
                })
            })
            .collect()
    }
}

fn str_to_rule_type(s: &str) -> AlertRuleType {
    match s {
        "error_rate" => AlertRuleType::ErrorRate,
        "performance" => AlertRuleType::Performance,
        "custom" => AlertRuleType::Custom,
        _ => AlertRuleType::ErrorCount,
    }
}

fn str_to_comparator(s: &str) -> Comparator {
    match s {
        "gte" => Comparator::GreaterThanOrEqual,
        "lt" => Comparator::LessThan,
        "lte" => Comparator::LessThanOrEqual,
        _ => Comparator::GreaterThan,
    }
}

pub struct PostgresAlertHistoryRepository {
    pool: PgPool,
}

impl PostgresAlertHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertHistoryRepository for PostgresAlertHistoryRepository {
    async fn has_fired(&self, rule_id: &str, error_hash: &str) -> Result<bool, IngestError> {
        let row = sqlx::query(
            "SELECT 1 as present FROM alert_history WHERE rule_id = $1 AND aggregation_error_hash = $2 LIMIT 1",
        )
        .bind(rule_id)
        .bind(error_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| transient(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn insert(&self, history: AlertHistory) -> Result<(), IngestError> {
        sqlx::query(
            "INSERT INTO alert_history \
             (id, rule_id, project_id, aggregation_error_hash, triggered_value, threshold, \
              time_window_seconds, message, timestamp, status) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)",
        )
        .bind(&history.id)
        .bind(&history.rule_id)
        .bind(&history.project_id)
        .bind(&history.aggregation_error_hash)
        .bind(history.triggered_value)
        .bind(history.threshold)
        .bind(history.time_window_seconds as i64)
        .bind(&history.message)
        .bind(history.timestamp)
        .bind(alert_history_status_to_str(history.status))
        .execute(&self.pool)
        .await
        .map_err(|e| transient(e.to_string()))?;
        Ok(())
    }

    async fn update_status(&self, id: &str, status: AlertHistoryStatus) -> Result<(), IngestError> {
        sqlx::query("UPDATE alert_history SET status = $1 WHERE id = $2")
            .bind(alert_history_status_to_str(status))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| transient(e.to_string()))?;
        Ok(())
    }
}

fn alert_history_status_to_str(status: AlertHistoryStatus) -> &'static str {
    match status {
        AlertHistoryStatus::Sent => "sent",
        AlertHistoryStatus::Failed => "failed",
        AlertHistoryStatus::Pending => "pending",
    }
}
