//! Repository traits standing in for the relational store (spec.md §1,
//! "external collaborators, interfaces only"), grounded in the teacher's
//! repository-trait-over-Diesel pattern (`src/db/repository.rs`) adapted
//! to `sqlx`'s async style.

pub mod filesystem;
pub mod memory;
pub mod postgres;

use crate::error::IngestError;
use async_trait::async_trait;
use monitor_core::model::{
    AlertHistory, AlertHistoryStatus, AlertRule, ErrorAggregation, ProjectConfig, SourceCodeVersion,
};

#[async_trait]
pub trait AggregationRepository: Send + Sync {
    async fn find_exact(
        &self,
        project_id: &str,
        error_hash: &str,
    ) -> Result<Option<ErrorAggregation>, IngestError>;

    /// All live aggregations for a project, used by the similarity scan
    /// (spec.md §4.7, step 2).
    async fn list_for_project(&self, project_id: &str) -> Result<Vec<ErrorAggregation>, IngestError>;

    async fn upsert(&self, aggregation: ErrorAggregation) -> Result<(), IngestError>;
}

#[async_trait]
pub trait ConfigRepository: Send + Sync {
    async fn get(&self, project_id: &str) -> Result<Option<ProjectConfig>, IngestError>;
}

#[async_trait]
pub trait AlertRuleRepository: Send + Sync {
    async fn enabled_rules_for_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<AlertRule>, IngestError>;
}

#[async_trait]
pub trait AlertHistoryRepository: Send + Sync {
    async fn has_fired(&self, rule_id: &str, error_hash: &str) -> Result<bool, IngestError>;

    async fn insert(&self, history: AlertHistory) -> Result<(), IngestError>;

    /// Updates the status of the row inserted for a firing (spec.md §4,
    /// "one record per firing") — the notification worker calls this with
    /// its send outcome instead of inserting a second row for the same
    /// firing.
    async fn update_status(&self, id: &str, status: AlertHistoryStatus) -> Result<(), IngestError>;
}

#[async_trait]
pub trait SourceArchiveRepository: Send + Sync {
    /// Resolves the on-disk/blob-store path of a `.map` file for
    /// `(project_id, version, minified_filename)`, trying the filename
    /// heuristics in spec.md §4.8 in order. `None` means no candidate
    /// exists under the project's sourcemap root.
    async fn find_source_map_path(
        &self,
        project_id: &str,
        version: &str,
        minified_filename: &str,
    ) -> Result<Option<std::path::PathBuf>, IngestError>;

    /// Writes one extracted archive member under the blob store, keyed
    /// `<root>/<project_id>/<version>/<relative_path>` (spec.md §6,
    /// "Persisted state layout").
    async fn store_file(
        &self,
        project_id: &str,
        version: &str,
        relative_path: &str,
        bytes: &[u8],
    ) -> Result<(), IngestError>;

    /// Records (or replaces) the metadata row for an uploaded archive
    /// (spec.md §6, "Source-code upload").
    async fn record_version(&self, version: SourceCodeVersion) -> Result<(), IngestError>;
}
