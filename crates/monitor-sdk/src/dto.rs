//! Wire format for `POST /api/monitor/report` (spec.md §4.5, §6). The SDK
//! maps its richer client-side taxonomy into the backend's narrower
//! `type` enumeration before uploading.

use monitor_core::model::{ErrorData, ErrorType, MonitorData, PerformanceData};
use serde::{Deserialize, Serialize};

/// The backend-side `type` enumeration (spec.md §4.5) — intentionally
/// smaller than the client's `ErrorType`/`PerformanceType`/`BehaviorType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportType {
    JsError,
    UnHandleRejection,
    ReqError,
    PerformanceInfoReady,
    SlowHttpRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDto {
    pub project_id: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub page_url: Option<String>,
    pub user_agent: Option<String>,
    pub project_version: Option<String>,
    pub error_message: Option<String>,
    pub error_stack: Option<String>,
    pub user_id: Option<String>,
    pub request_url: Option<String>,
    pub request_method: Option<String>,
    pub response_status: Option<u16>,
    pub duration: Option<f64>,
    pub performance_data: Option<serde_json::Value>,
    pub extra_data: Option<serde_json::Value>,
}

fn error_report_type(error_type: ErrorType) -> ReportType {
    match error_type {
        ErrorType::PromiseError => ReportType::UnHandleRejection,
        ErrorType::HttpError => ReportType::ReqError,
        _ => ReportType::JsError,
    }
}

impl ReportDto {
    fn from_error(e: &ErrorData) -> Self {
        Self {
            project_id: e.envelope.project_id.clone(),
            report_type: error_report_type(e.error_type),
            page_url: Some(e.envelope.page_url.clone()),
            user_agent: Some(e.envelope.user_agent.clone()),
            project_version: e.envelope.project_version.clone(),
            error_message: Some(e.message.clone()),
            error_stack: e.stack.clone(),
            user_id: e.envelope.user_id.clone(),
            request_url: None,
            request_method: None,
            response_status: None,
            duration: None,
            performance_data: None,
            extra_data: None,
        }
    }

    fn from_performance(p: &PerformanceData) -> Self {
        let report_type = if p
            .resource
            .as_ref()
            .map(|r| r.duration > 1000.0)
            .unwrap_or(false)
        {
            ReportType::SlowHttpRequest
        } else {
            ReportType::PerformanceInfoReady
        };
        Self {
            project_id: p.envelope.project_id.clone(),
            report_type,
            page_url: Some(p.envelope.page_url.clone()),
            user_agent: Some(p.envelope.user_agent.clone()),
            project_version: p.envelope.project_version.clone(),
            error_message: None,
            error_stack: None,
            user_id: p.envelope.user_id.clone(),
            request_url: p.resource.as_ref().map(|r| r.name.clone()),
            request_method: None,
            response_status: None,
            duration: p.resource.as_ref().map(|r| r.duration),
            performance_data: serde_json::to_value(&p.metrics).ok(),
            extra_data: None,
        }
    }

    /// Batch behavior upload is a deliberately out-of-scope stub
    /// (spec.md §9, "Open questions") — the backend's report DTO has no
    /// `type` variant for breadcrumbs, so behaviors never reach
    /// `/api/monitor/report` through this path. They are retained in the
    /// SDK queue (and attached to error emissions as context, spec.md
    /// §4.2) but not themselves uploaded.
    pub fn from_monitor_data(data: &MonitorData) -> Option<Self> {
        match data {
            MonitorData::Error(e) => Some(Self::from_error(e)),
            MonitorData::Performance(p) => Some(Self::from_performance(p)),
            MonitorData::Behavior(_) => None,
        }
    }
}
