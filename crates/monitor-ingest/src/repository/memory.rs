//! In-memory repository implementations used by tests and as a reference
//! for the `sqlx` implementations, mirroring
//! `workflow-engine-core::testing::mocks`.

use super::{
    AggregationRepository, AlertHistoryRepository, AlertRuleRepository, ConfigRepository,
    SourceArchiveRepository,
};
use crate::error::IngestError;
use async_trait::async_trait;
use monitor_core::model::{
    AlertHistory, AlertHistoryStatus, AlertRule, ErrorAggregation, ProjectConfig, SourceCodeVersion,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemoryAggregationRepository {
    // keyed by (project_id, error_hash)
    rows: Mutex<HashMap<(String, String), ErrorAggregation>>,
}

#[async_trait]
impl AggregationRepository for InMemoryAggregationRepository {
    async fn find_exact(
        &self,
        project_id: &str,
        error_hash: &str,
    ) -> Result<Option<ErrorAggregation>, IngestError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&(project_id.to_string(), error_hash.to_string()))
            .cloned())
    }

    async fn list_for_project(&self, project_id: &str) -> Result<Vec<ErrorAggregation>, IngestError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn upsert(&self, aggregation: ErrorAggregation) -> Result<(), IngestError> {
        let key = (aggregation.project_id.clone(), aggregation.error_hash.clone());
        self.rows.lock().unwrap().insert(key, aggregation);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryConfigRepository {
    configs: Mutex<HashMap<String, ProjectConfig>>,
}

impl InMemoryConfigRepository {
    pub fn insert(&self, config: ProjectConfig) {
        self.configs.lock().unwrap().insert(config.project_id.clone(), config);
    }
}

#[async_trait]
impl ConfigRepository for InMemoryConfigRepository {
    async fn get(&self, project_id: &str) -> Result<Option<ProjectConfig>, IngestError> {
        Ok(self.configs.lock().unwrap().get(project_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryAlertRuleRepository {
    rules: Mutex<Vec<AlertRule>>,
}

impl InMemoryAlertRuleRepository {
    pub fn insert(&self, rule: AlertRule) {
        self.rules.lock().unwrap().push(rule);
    }
}

#[async_trait]
impl AlertRuleRepository for InMemoryAlertRuleRepository {
    async fn enabled_rules_for_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<AlertRule>, IngestError> {
        Ok(self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.project_id == project_id && r.enabled)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryAlertHistoryRepository {
    rows: Mutex<Vec<AlertHistory>>,
}

impl InMemoryAlertHistoryRepository {
    pub fn all(&self) -> Vec<AlertHistory> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertHistoryRepository for InMemoryAlertHistoryRepository {
    async fn has_fired(&self, rule_id: &str, error_hash: &str) -> Result<bool, IngestError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .any(|h| h.rule_id == rule_id && h.aggregation_error_hash.as_deref() == Some(error_hash)))
    }

    async fn insert(&self, history: AlertHistory) -> Result<(), IngestError> {
        self.rows.lock().unwrap().push(history);
        Ok(())
    }

    async fn update_status(&self, id: &str, status: AlertHistoryStatus) -> Result<(), IngestError> {
        if let Some(row) = self.rows.lock().unwrap().iter_mut().find(|h| h.id == id) {
            row.status = status;
        }
        Ok(())
    }
}

/// `(project_id, version, filename) -> path`, populated directly by tests
/// instead of walking a real blob store.
#[derive(Default)]
pub struct InMemorySourceArchiveRepository {
    maps: Mutex<HashMap<(String, String, String), PathBuf>>,
    files: Mutex<HashMap<(String, String, String), Vec<u8>>>,
    versions: Mutex<Vec<SourceCodeVersion>>,
}

impl InMemorySourceArchiveRepository {
    pub fn register(&self, project_id: &str, version: &str, filename: &str, path: PathBuf) {
        self.maps.lock().unwrap().insert(
            (project_id.to_string(), version.to_string(), filename.to_string()),
            path,
        );
    }

    pub fn versions(&self) -> Vec<SourceCodeVersion> {
        self.versions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceArchiveRepository for InMemorySourceArchiveRepository {
    async fn find_source_map_path(
        &self,
        project_id: &str,
        version: &str,
        minified_filename: &str,
    ) -> Result<Option<PathBuf>, IngestError> {
        Ok(self
            .maps
            .lock()
            .unwrap()
            .get(&(
                project_id.to_string(),
                version.to_string(),
                minified_filename.to_string(),
            ))
            .cloned())
    }

    async fn store_file(
        &self,
        project_id: &str,
        version: &str,
        relative_path: &str,
        bytes: &[u8],
    ) -> Result<(), IngestError> {
        self.files.lock().unwrap().insert(
            (project_id.to_string(), version.to_string(), relative_path.to_string()),
            bytes.to_vec(),
        );
        Ok(())
    }

    async fn record_version(&self, version: SourceCodeVersion) -> Result<(), IngestError> {
        self.versions.lock().unwrap().push(version);
        Ok(())
    }
}
