//! # Error Taxonomy
//!
//! Every failure mode described in spec §7 ("Error Handling Design") is a
//! variant of [`MonitorError`]. Variants carry enough structure for the
//! [`ErrorExt`] trait to classify them without string matching, the way
//! `workflow-engine-core::error` classifies `WorkflowError`.

pub mod circuit_breaker;
pub mod types;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitError, CircuitState};
pub use types::MonitorError;

use serde::{Deserialize, Serialize};

/// Broad classification used to decide retry/backoff/drop behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Network/storage hiccup that may succeed on retry.
    Transient,
    /// Malformed payload; never retried.
    Payload,
    /// A dependent resource (source-map, config) is missing; event still
    /// proceeds unenriched.
    Resource,
    /// A queue or buffer is full; caller should back off.
    Backpressure,
    /// Programming error surfaced at a worker boundary.
    Internal,
}

/// Extension trait giving every error in the pipeline a category and a
/// retryability verdict, mirroring `workflow-engine-core::error::ErrorExt`.
pub trait ErrorExt: std::error::Error {
    fn category(&self) -> ErrorCategory;

    fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Transient)
    }

    /// Stable code for structured logs and metrics labels.
    fn error_code(&self) -> &'static str;
}

pub type Result<T> = std::result::Result<T, MonitorError>;
