use super::{ErrorCategory, ErrorExt};

/// Errors that can occur while fingerprinting, modeling, or validating
/// monitor data. Server-side queue/worker errors live in
/// `monitor_ingest::error::IngestError` and wrap this type where
/// appropriate.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// `projectId`/`serverUrl` missing, or a sample rate outside `[0, 1]`.
    #[error("invalid configuration: {message}")]
    ConfigInvalid { message: String },

    /// The report DTO is missing a required field or carries an unknown
    /// `type` (spec §4.5).
    #[error("malformed payload: {message}")]
    PayloadMalformed { message: String },

    /// `projectId` does not match any known project.
    #[error("unknown project: {project_id}")]
    UnknownProject { project_id: String },

    /// A fingerprint string failed `isValidHash` (wrong length or
    /// non-hex characters).
    #[error("invalid fingerprint: expected {expected_len} hex chars, got {actual:?}")]
    InvalidFingerprint { expected_len: usize, actual: String },

    /// Serialization/deserialization of a `MonitorData` record failed.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// A resource (source-map, project config) could not be found. The
    /// pipeline continues without enrichment per spec §7.
    #[error("resource unavailable: {message}")]
    ResourceUnavailable { message: String },
}

impl ErrorExt for MonitorError {
    fn category(&self) -> ErrorCategory {
        match self {
            MonitorError::ConfigInvalid { .. } => ErrorCategory::Payload,
            MonitorError::PayloadMalformed { .. } => ErrorCategory::Payload,
            MonitorError::UnknownProject { .. } => ErrorCategory::Payload,
            MonitorError::InvalidFingerprint { .. } => ErrorCategory::Internal,
            MonitorError::Serialization { .. } => ErrorCategory::Internal,
            MonitorError::ResourceUnavailable { .. } => ErrorCategory::Resource,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            MonitorError::ConfigInvalid { .. } => "config_invalid",
            MonitorError::PayloadMalformed { .. } => "payload_malformed",
            MonitorError::UnknownProject { .. } => "unknown_project",
            MonitorError::InvalidFingerprint { .. } => "invalid_fingerprint",
            MonitorError::Serialization { .. } => "serialization_error",
            MonitorError::ResourceUnavailable { .. } => "resource_unavailable",
        }
    }
}
