//! Server-side half of the `/api/monitor/report` wire format (spec.md
//! §4.5): the client-facing `ReportDto`/`ReportType` shapes live in
//! `monitor_sdk::dto` (the SDK builds the same struct to upload); this
//! module only owns turning one back into `MonitorData`.

use crate::error::ApiError;
use chrono::Utc;
use monitor_core::model::{
    ErrorData, ErrorType, EventEnvelope, MonitorData, Platform, PerformanceData, PerformanceType,
    ResourceTiming,
};
use monitor_sdk::dto::{ReportDto, ReportType};
use std::collections::BTreeMap;

/// The DTO carries no `id`/`timestamp`/`sessionId` (spec.md §4.5 lists
/// only the fields above) — the intake surface mints them per request.
/// This means two reports from the same browser session are not
/// correlated by `session_id` unless the caller supplies one via
/// `extra_data.sessionId`, which we honor when present.
fn envelope(dto: &ReportDto) -> EventEnvelope {
    let session_id = dto
        .extra_data
        .as_ref()
        .and_then(|v| v.get("sessionId"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    EventEnvelope {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: Utc::now().timestamp_millis(),
        project_id: dto.project_id.clone(),
        project_version: dto.project_version.clone(),
        session_id,
        user_id: dto.user_id.clone(),
        page_url: dto.page_url.clone().unwrap_or_default(),
        user_agent: dto.user_agent.clone().unwrap_or_default(),
        platform: Platform::Web,
        tags: None,
    }
}

pub fn to_monitor_data(dto: ReportDto) -> Result<MonitorData, ApiError> {
    match dto.report_type {
        ReportType::JsError | ReportType::UnHandleRejection | ReportType::ReqError => {
            let message = dto.error_message.clone().ok_or_else(|| {
                ApiError::BadRequest("errorMessage is required for error reports".to_string())
            })?;
            let error_type = match dto.report_type {
                ReportType::UnHandleRejection => ErrorType::PromiseError,
                ReportType::ReqError => ErrorType::HttpError,
                _ => ErrorType::JsError,
            };
            Ok(MonitorData::Error(ErrorData {
                envelope: envelope(&dto),
                error_type,
                message,
                stack: dto.error_stack.clone(),
                filename: dto.request_url.clone(),
                lineno: None,
                colno: None,
                resolved: None,
                component_stack: None,
            }))
        }
        ReportType::PerformanceInfoReady | ReportType::SlowHttpRequest => {
            let mut metrics = BTreeMap::new();
            if let Some(duration) = dto.duration {
                metrics.insert("duration".to_string(), duration);
            }
            if let Some(status) = dto.response_status {
                metrics.insert("responseStatus".to_string(), status as f64);
            }
            if let Some(extra) = &dto.performance_data {
                if let Some(obj) = extra.as_object() {
                    for (k, v) in obj {
                        if let Some(n) = v.as_f64() {
                            metrics.insert(k.clone(), n);
                        }
                    }
                }
            }
            let resource = dto.request_url.as_ref().map(|name| ResourceTiming {
                name: name.clone(),
                size: None,
                duration: dto.duration.unwrap_or(0.0),
                resource_type: dto
                    .request_method
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
            });
            let performance_type = if matches!(dto.report_type, ReportType::SlowHttpRequest) {
                PerformanceType::HttpRequest
            } else {
                PerformanceType::PageLoad
            };
            Ok(MonitorData::Performance(PerformanceData {
                envelope: envelope(&dto),
                performance_type,
                metrics,
                resource,
            }))
        }
    }
}
