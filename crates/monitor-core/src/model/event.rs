//! `MonitorData` — the discriminated union every client event is modeled
//! as (spec.md §3). Platform is part of the envelope; the three variants
//! carry the type-specific fields.

use super::value::{Tags, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Web,
    MiniProgram,
}

/// Fields shared by every `MonitorData` record, regardless of variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: String,
    pub timestamp: i64,
    pub project_id: String,
    pub project_version: Option<String>,
    pub session_id: String,
    pub user_id: Option<String>,
    pub page_url: String,
    pub user_agent: String,
    pub platform: Platform,
    pub tags: Option<Tags>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    JsError,
    PromiseError,
    ResourceError,
    HttpError,
    CustomError,
    FrameworkError,
}

/// A resolved `(file, line, col)` position, produced by the source-map
/// worker (spec.md §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedSourceLocation {
    pub source: String,
    pub line: u32,
    pub column: u32,
    pub name: Option<String>,
    pub source_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    pub envelope: EventEnvelope,
    pub error_type: ErrorType,
    pub message: String,
    pub stack: Option<String>,
    pub filename: Option<String>,
    pub lineno: Option<u32>,
    pub colno: Option<u32>,
    pub resolved: Option<ResolvedSourceLocation>,
    pub component_stack: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PerformanceType {
    PageLoad,
    HttpRequest,
    ResourceLoad,
    UserInteraction,
    CustomMetric,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTiming {
    pub name: String,
    pub size: Option<f64>,
    pub duration: f64,
    pub resource_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceData {
    pub envelope: EventEnvelope,
    pub performance_type: PerformanceType,
    pub metrics: BTreeMap<String, f64>,
    pub resource: Option<ResourceTiming>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BehaviorType {
    PageView,
    Click,
    Scroll,
    FormSubmit,
    RouteChange,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorData {
    pub envelope: EventEnvelope,
    pub behavior_type: BehaviorType,
    pub event: String,
    pub target: Option<String>,
    pub xpath: Option<String>,
    pub data: Option<Value>,
}

/// The discriminated union itself (spec.md §3, "Exactly one of three
/// variants").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MonitorData {
    Error(ErrorData),
    Performance(PerformanceData),
    Behavior(BehaviorData),
}

impl MonitorData {
    pub fn envelope(&self) -> &EventEnvelope {
        match self {
            MonitorData::Error(e) => &e.envelope,
            MonitorData::Performance(p) => &p.envelope,
            MonitorData::Behavior(b) => &b.envelope,
        }
    }

    pub fn envelope_mut(&mut self) -> &mut EventEnvelope {
        match self {
            MonitorData::Error(e) => &mut e.envelope,
            MonitorData::Performance(p) => &mut p.envelope,
            MonitorData::Behavior(b) => &mut b.envelope,
        }
    }

    pub fn id(&self) -> &str {
        &self.envelope().id
    }

    pub fn is_error(&self) -> bool {
        matches!(self, MonitorData::Error(_))
    }

    pub fn as_error(&self) -> Option<&ErrorData> {
        match self {
            MonitorData::Error(e) => Some(e),
            _ => None,
        }
    }
}
