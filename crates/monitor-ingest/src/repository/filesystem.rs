//! Filesystem-backed blob store for uploaded source-map/source-code
//! archives (spec.md §6, "Persisted state layout": "source artifacts in a
//! blob store under `<root>/<projectId>/<version>/...`").
//!
//! Metadata (`SourceCodeVersion` rows) is mirrored into Postgres when a
//! pool is configured; without one (local/dev runs) `record_version` is a
//! no-op and only the blob layout on disk is authoritative.

use super::SourceArchiveRepository;
use crate::error::IngestError;
use async_trait::async_trait;
use monitor_core::model::SourceCodeVersion;
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct FilesystemSourceArchiveRepository {
    root: PathBuf,
    pool: Option<PgPool>,
}

impl FilesystemSourceArchiveRepository {
    pub fn new(root: impl Into<PathBuf>, pool: Option<PgPool>) -> Self {
        Self {
            root: root.into(),
            pool,
        }
    }

    fn version_dir(&self, project_id: &str, version: &str) -> PathBuf {
        self.root.join(project_id).join(version)
    }

    /// `.map` filename heuristics in spec.md §4.8's order.
    fn candidate_names(minified_filename: &str) -> Vec<String> {
        let basename = Path::new(minified_filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(minified_filename)
            .to_string();
        vec![
            format!("{minified_filename}.map"),
            format!("{basename}.map"),
            format!("{minified_filename}.js.map"),
            format!("{basename}.js.map"),
        ]
    }
}

fn transient(message: impl Into<String>) -> IngestError {
    IngestError::Transient {
        component: "source_archive_fs".to_string(),
        message: message.into(),
    }
}

#[async_trait]
impl SourceArchiveRepository for FilesystemSourceArchiveRepository {
    async fn find_source_map_path(
        &self,
        project_id: &str,
        version: &str,
        minified_filename: &str,
    ) -> Result<Option<PathBuf>, IngestError> {
        let dir = self.version_dir(project_id, version);
        for candidate in Self::candidate_names(minified_filename) {
            let path = dir.join(&candidate);
            if fs::metadata(&path).await.is_ok() {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    async fn store_file(
        &self,
        project_id: &str,
        version: &str,
        relative_path: &str,
        bytes: &[u8],
    ) -> Result<(), IngestError> {
        let path = self.version_dir(project_id, version).join(relative_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| transient(e.to_string()))?;
        }
        fs::write(&path, bytes).await.map_err(|e| transient(e.to_string()))
    }

    async fn record_version(&self, version: SourceCodeVersion) -> Result<(), IngestError> {
        let Some(pool) = &self.pool else {
            return Ok(());
        };
        let file_count = version.files.len() as i64;
        sqlx::query(
            "INSERT INTO source_code_versions \
             (project_id, version, file_count, archive_size_bytes, is_active, uploaded_at) \
             VALUES ($1,$2,$3,$4,$5,$6) \
             ON CONFLICT (project_id, version) DO UPDATE SET \
             file_count = EXCLUDED.file_count, archive_size_bytes = EXCLUDED.archive_size_bytes, \
             is_active = EXCLUDED.is_active, uploaded_at = EXCLUDED.uploaded_at",
        )
        .bind(&version.project_id)
        .bind(&version.version)
        .bind(file_count)
        .bind(version.archive_size_bytes as i64)
        .bind(version.is_active)
        .bind(version.uploaded_at)
        .execute(pool)
        .await
        .map_err(|e| transient(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_resolves_a_map_by_basename_heuristic() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FilesystemSourceArchiveRepository::new(dir.path(), None);

        repo.store_file("proj-1", "1.0.0", "static/js/app.abc123.js.map", b"{}")
            .await
            .unwrap();

        let resolved = repo
            .find_source_map_path("proj-1", "1.0.0", "static/js/app.abc123.js")
            .await
            .unwrap();
        assert!(resolved.is_some());
    }

    #[tokio::test]
    async fn missing_file_resolves_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FilesystemSourceArchiveRepository::new(dir.path(), None);

        let resolved = repo
            .find_source_map_path("proj-1", "1.0.0", "nope.js")
            .await
            .unwrap();
        assert!(resolved.is_none());
    }
}
