//! Read-only config/rule lookups an admin UI would drive (SPEC_FULL.md
//! §7). CRUD write paths live behind the operator's own tooling, not
//! this service — these routes only expose what the ingestion pipeline
//! already reads, so an operator can confirm what's live without a
//! database console.

use crate::error::ApiError;
use crate::state::AppState;
use actix_web::{get, web, HttpResponse};
use serde_json::json;

/// `GET /api/admin/projects/{projectId}/config`.
#[get("/api/admin/projects/{project_id}/config")]
pub async fn get_config(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let project_id = path.into_inner();
    match state.configs.get(&project_id).await? {
        Some(config) => Ok(HttpResponse::Ok().json(config)),
        None => Err(ApiError::UnknownProject),
    }
}

/// `GET /api/admin/projects/{projectId}/rules` — enabled alert rules.
#[get("/api/admin/projects/{project_id}/rules")]
pub async fn list_rules(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let project_id = path.into_inner();
    let rules = state.alert_rules.enabled_rules_for_project(&project_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "rules": rules })))
}
