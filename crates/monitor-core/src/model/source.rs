use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One uploaded file inside a source-code or source-map archive, stored
/// content-addressable (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCodeFile {
    pub project_id: String,
    pub version: String,
    pub path: String,
    pub file_hash: String,
    pub size_bytes: u64,
}

/// `(project_id, version)` uniquely identifies an uploaded archive
/// (spec.md §3). At most one version per project is `is_active`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCodeVersion {
    pub project_id: String,
    pub version: String,
    pub files: Vec<SourceCodeFile>,
    pub archive_size_bytes: u64,
    pub is_active: bool,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    Zip,
    Tar,
    Gz,
    Rar,
    SevenZ,
}
