//! Ingestion intake (spec.md §4.5): `POST /api/monitor/report`.

use crate::auth;
use crate::dto::to_monitor_data;
use crate::error::ApiError;
use crate::state::AppState;
use actix_web::{post, web, HttpRequest, HttpResponse};
use monitor_core::model::MonitorData;
use monitor_sdk::dto::ReportDto;
use serde_json::json;

#[post("/api/monitor/report")]
pub async fn report(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<ReportDto>,
) -> Result<HttpResponse, ApiError> {
    let dto = body.into_inner();
    if dto.project_id.trim().is_empty() {
        return Err(ApiError::BadRequest("projectId is required".to_string()));
    }

    let project = state
        .config_cache
        .get(&dto.project_id)
        .await?
        .ok_or(ApiError::UnknownProject)?;

    auth::check(&req, &project, state.require_api_key)?;

    let data = to_monitor_data(dto)?;

    match data {
        MonitorData::Error(error) => {
            state.pipeline.handle_error(error).await?;
        }
        other => {
            state.pipeline.handle_telemetry(&project.project_id, other).await?;
        }
    }

    Ok(HttpResponse::Accepted().json(json!({ "ok": true })))
}
