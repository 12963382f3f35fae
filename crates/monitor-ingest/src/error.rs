//! Worker-boundary error taxonomy (spec.md §7), mirroring
//! `workflow-engine-core/src/error/types.rs`'s one-doc-comment-per-variant
//! style.

use monitor_core::error::{CircuitError, ErrorCategory, ErrorExt};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Unknown `type` or missing required DTO field (spec §4.5). Dropped
    /// with a `400`; never retried.
    #[error("malformed payload: {message}")]
    PayloadMalformed { message: String },

    /// `projectId` does not match any configured project (spec §4.5).
    #[error("unknown project: {project_id}")]
    UnknownProject { project_id: String },

    /// Network/storage hiccup (queue, repository, SMTP, source-map
    /// fetch). Retried per the backoff policy (spec §7).
    #[error("transient failure in {component}: {message}")]
    Transient { component: String, message: String },

    /// Source-map or project config missing; the pipeline continues
    /// without enrichment (spec §7).
    #[error("resource unavailable: {message}")]
    ResourceUnavailable { message: String },

    /// A queue reported itself full; caller should back off (spec §7).
    #[error("queue backpressure on {queue}")]
    Backpressure { queue: String },

    /// Unexpected failure inside a worker body, caught at the worker
    /// boundary and retried like a transient error (spec §7).
    #[error("internal worker error in {worker}: {message}")]
    Internal { worker: String, message: String },

    /// Retries against a queue/transport exhausted `maxRetries`; the job
    /// is moved to the dead letter (spec §5, "Retries").
    #[error("retries exhausted after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    #[error(transparent)]
    Core(#[from] monitor_core::error::MonitorError),
}

impl ErrorExt for IngestError {
    fn category(&self) -> ErrorCategory {
        match self {
            IngestError::PayloadMalformed { .. } => ErrorCategory::Payload,
            IngestError::UnknownProject { .. } => ErrorCategory::Payload,
            IngestError::Transient { .. } => ErrorCategory::Transient,
            IngestError::ResourceUnavailable { .. } => ErrorCategory::Resource,
            IngestError::Backpressure { .. } => ErrorCategory::Backpressure,
            IngestError::Internal { .. } => ErrorCategory::Internal,
            IngestError::RetriesExhausted { .. } => ErrorCategory::Internal,
            IngestError::Core(e) => e.category(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            IngestError::PayloadMalformed { .. } => "payload_malformed",
            IngestError::UnknownProject { .. } => "unknown_project",
            IngestError::Transient { .. } => "transient",
            IngestError::ResourceUnavailable { .. } => "resource_unavailable",
            IngestError::Backpressure { .. } => "backpressure",
            IngestError::Internal { .. } => "internal",
            IngestError::RetriesExhausted { .. } => "retries_exhausted",
            IngestError::Core(e) => e.error_code(),
        }
    }
}

impl<E: Into<IngestError>> From<CircuitError<E>> for IngestError {
    fn from(e: CircuitError<E>) -> Self {
        match e {
            CircuitError::Open => IngestError::Transient {
                component: "circuit_breaker".to_string(),
                message: "circuit open".to_string(),
            },
            CircuitError::Inner(inner) => inner.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
