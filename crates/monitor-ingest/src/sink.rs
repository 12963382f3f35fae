//! Append-only raw-event sink (spec.md §4.7, step 0: "the raw event is
//! durably recorded before aggregation begins, so an aggregation-worker
//! crash never loses the underlying signal").

use crate::error::IngestError;
use async_trait::async_trait;
use monitor_core::model::MonitorData;
use sqlx::PgPool;
use std::sync::Mutex;

#[async_trait]
pub trait RawEventSink: Send + Sync {
    async fn append(&self, project_id: &str, data: &MonitorData) -> Result<(), IngestError>;
}

/// Test double; production deployments write to the same Postgres
/// instance as the aggregation table (spec.md §3), appended to via plain
/// `INSERT` with no update path.
#[derive(Default)]
pub struct InMemoryRawEventSink {
    events: Mutex<Vec<(String, MonitorData)>>,
}

impl InMemoryRawEventSink {
    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RawEventSink for InMemoryRawEventSink {
    async fn append(&self, project_id: &str, data: &MonitorData) -> Result<(), IngestError> {
        self.events
            .lock()
            .unwrap()
            .push((project_id.to_string(), data.clone()));
        Ok(())
    }
}

fn event_type(data: &MonitorData) -> &'static str {
    match data {
        MonitorData::Error(_) => "error",
        MonitorData::Performance(_) => "performance",
        MonitorData::Behavior(_) => "behavior",
    }
}

/// Production sink: appends straight to `raw_events`, an insert-only
/// table separate from `error_aggregations` so a crash mid-aggregation
/// never loses the underlying signal (spec.md §4.7, step 0).
pub struct PostgresRawEventSink {
    pool: PgPool,
}

impl PostgresRawEventSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RawEventSink for PostgresRawEventSink {
    async fn append(&self, project_id: &str, data: &MonitorData) -> Result<(), IngestError> {
        let payload = serde_json::to_value(data).map_err(|e| IngestError::PayloadMalformed {
            message: e.to_string(),
        })?;
        sqlx::query(
            "INSERT INTO raw_events (project_id, event_type, payload, recorded_at) \
             VALUES ($1, $2, $3, now())",
        )
        .bind(project_id)
        .bind(event_type(data))
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|e| IngestError::Transient {
            component: "postgres".to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}
