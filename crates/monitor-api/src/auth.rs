//! `X-API-Key` check (spec.md §6, "Optional header `X-API-Key`
//! authenticates the project"). Applied inside handlers rather than as
//! generic middleware: the project the key is checked against is only
//! known once a handler has parsed its body (`/api/monitor/report`'s
//! `projectId` is JSON, not part of the path), so there's no useful
//! request-wide hook to authenticate before that point.

use crate::error::ApiError;
use actix_web::HttpRequest;
use monitor_core::model::ProjectConfig;

pub fn check(req: &HttpRequest, project: &ProjectConfig, required: bool) -> Result<(), ApiError> {
    if !required {
        return Ok(());
    }
    let header = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok());
    match header {
        Some(key) if key == project.api_key => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}
