//! Source-map and source-code archive upload (spec.md §6). Both endpoints
//! share the same multipart shape: `{projectId, version, archive, archiveType}`.
//!
//! Only the `zip` archive type is implemented — it's the only archive
//! format available in this workspace's dependency set (`tar`/`gz`/`rar`/
//! `7z` would each need their own crate); other `archiveType` values are
//! rejected with `400` rather than silently accepted and dropped.

use crate::error::ApiError;
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{post, web, HttpResponse};
use chrono::Utc;
use futures_util::{StreamExt, TryStreamExt};
use monitor_core::model::{SourceCodeFile, SourceCodeVersion};
use serde_json::json;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Cursor;

/// Stable per-content key for `SourceCodeFile::file_hash` (spec.md §3).
/// Not a cryptographic digest — only collision-avoidance for addressing,
/// not tamper resistance, is required here.
fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

struct ParsedUpload {
    project_id: String,
    version: String,
    archive_type: String,
    archive_bytes: Vec<u8>,
}

async fn parse_multipart(mut payload: Multipart) -> Result<ParsedUpload, ApiError> {
    let mut project_id = None;
    let mut version = None;
    let mut archive_type = None;
    let mut archive_bytes = None;

    while let Some(field) = payload.try_next().await.map_err(|e| ApiError::BadRequest(e.to_string()))? {
        let name = field.name().unwrap_or_default().to_string();
        let mut field = field;
        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::BadRequest(e.to_string()))?;
            bytes.extend_from_slice(&chunk);
        }
        match name.as_str() {
            "projectId" => project_id = Some(String::from_utf8_lossy(&bytes).to_string()),
            "version" => version = Some(String::from_utf8_lossy(&bytes).to_string()),
            "archiveType" => archive_type = Some(String::from_utf8_lossy(&bytes).to_string()),
            "archive" => archive_bytes = Some(bytes),
            _ => {}
        }
    }

    Ok(ParsedUpload {
        project_id: project_id
            .ok_or_else(|| ApiError::BadRequest("projectId is required".to_string()))?,
        version: version.ok_or_else(|| ApiError::BadRequest("version is required".to_string()))?,
        archive_type: archive_type.unwrap_or_else(|| "zip".to_string()),
        archive_bytes: archive_bytes
            .ok_or_else(|| ApiError::BadRequest("archive is required".to_string()))?,
    })
}

struct ExtractedFile {
    path: String,
    bytes: Vec<u8>,
}

fn extract_zip(archive_type: &str, bytes: &[u8]) -> Result<Vec<ExtractedFile>, ApiError> {
    if archive_type != "zip" {
        return Err(ApiError::BadRequest(format!(
            "unsupported archiveType {archive_type:?}; only zip is implemented"
        )));
    }
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ApiError::BadRequest(format!("invalid zip archive: {e}")))?;

    let mut files = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| ApiError::BadRequest(format!("invalid zip entry: {e}")))?;
        if entry.is_dir() {
            continue;
        }
        let path = entry.name().to_string();
        let mut contents = Vec::new();
        std::io::copy(&mut entry, &mut contents)
            .map_err(|e| ApiError::BadRequest(format!("failed reading {path}: {e}")))?;
        files.push(ExtractedFile { path, bytes: contents });
    }
    Ok(files)
}

async fn handle_upload(state: &AppState, upload: ParsedUpload) -> Result<Vec<SourceCodeFile>, ApiError> {
    let files = extract_zip(&upload.archive_type, &upload.archive_bytes)?;
    let mut recorded = Vec::with_capacity(files.len());

    for file in &files {
        state
            .source_archives
            .store_file(&upload.project_id, &upload.version, &file.path, &file.bytes)
            .await?;
        recorded.push(SourceCodeFile {
            project_id: upload.project_id.clone(),
            version: upload.version.clone(),
            path: file.path.clone(),
            file_hash: content_hash(&file.bytes),
            size_bytes: file.bytes.len() as u64,
        });
    }

    state
        .source_archives
        .record_version(SourceCodeVersion {
            project_id: upload.project_id.clone(),
            version: upload.version.clone(),
            files: recorded.clone(),
            archive_size_bytes: upload.archive_bytes.len() as u64,
            is_active: true,
            uploaded_at: Utc::now(),
        })
        .await?;

    Ok(recorded)
}

/// `POST /api/monitor/sourcemap` (spec.md §6, "Source-map upload").
#[post("/api/monitor/sourcemap")]
pub async fn upload_sourcemap(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let upload = parse_multipart(payload).await?;
    let files = handle_upload(&state, upload).await?;
    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "files": files.iter().map(|f| json!({"path": f.path, "sizeBytes": f.size_bytes})).collect::<Vec<_>>(),
    })))
}

/// `POST /api/monitor/source` (spec.md §6, "Source-code upload").
#[post("/api/monitor/source")]
pub async fn upload_source(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let upload = parse_multipart(payload).await?;
    let files = handle_upload(&state, upload).await?;
    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "files": files.iter().map(|f| json!({"path": f.path, "sizeBytes": f.size_bytes})).collect::<Vec<_>>(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            let options = FileOptions::default();
            for (name, contents) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn extracts_every_file_in_the_archive() {
        let bytes = build_zip(&[("app.js", "console.log(1)"), ("app.js.map", "{}")]);
        let files = extract_zip("zip", &bytes).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(names, vec!["app.js", "app.js.map"]);
        assert_eq!(files[1].bytes, b"{}");
    }

    #[test]
    fn rejects_unsupported_archive_types() {
        let bytes = build_zip(&[("app.js", "x")]);
        let err = extract_zip("tar", &bytes).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
