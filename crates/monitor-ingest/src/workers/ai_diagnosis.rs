//! Optional LLM diagnosis worker (spec.md §9, "Optional LLM diagnosis:
//! fully asynchronous, lossy by design; failures never affect alerting or
//! ingestion throughput"). Absent `ai_diagnosis_endpoint` disables the
//! worker entirely rather than failing closed.

use crate::error::IngestError;
use crate::metrics::WorkerTimer;
use crate::repository::AggregationRepository;
use monitor_core::error::{CircuitBreaker, CircuitBreakerConfig, CircuitError};
use monitor_core::model::AiDiagnosis;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Serialize)]
struct DiagnosisRequest<'a> {
    message: &'a str,
    stack: Option<&'a str>,
    occurrence_count: u64,
}

#[derive(Debug, Deserialize)]
struct DiagnosisResponse {
    summary: String,
    suggested_fix: Option<String>,
}

pub struct AiDiagnosisWorker {
    endpoint: Option<String>,
    client: reqwest::Client,
    breaker: CircuitBreaker,
    aggregations: Arc<dyn AggregationRepository>,
}

impl AiDiagnosisWorker {
    pub fn new(endpoint: Option<String>, aggregations: Arc<dyn AggregationRepository>) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
            breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
            aggregations,
        }
    }

    pub fn enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Attaches an AI diagnosis to the aggregation, best-effort. Any
    /// failure is logged and swallowed: this path must never block
    /// ingestion or alerting (spec.md §9).
    pub async fn process(&self, project_id: &str, error_hash: &str) {
        let Some(endpoint) = &self.endpoint else {
            return;
        };
        let _timer = WorkerTimer::start("ai_diagnosis");

        let Ok(Some(aggregation)) = self.aggregations.find_exact(project_id, error_hash).await else {
            return;
        };

        let request = DiagnosisRequest {
            message: &aggregation.message,
            stack: aggregation.stack.as_deref(),
            occurrence_count: aggregation.occurrence_count,
        };

        let result = self
            .breaker
            .call(|| async {
                self.client
                    .post(endpoint)
                    .json(&request)
                    .timeout(Duration::from_secs(30))
                    .send()
                    .await
                    .map_err(|e| IngestError::Transient {
                        component: "ai_diagnosis".to_string(),
                        message: e.to_string(),
                    })?
                    .json::<DiagnosisResponse>()
                    .await
                    .map_err(|e| IngestError::Transient {
                        component: "ai_diagnosis".to_string(),
                        message: e.to_string(),
                    })
            })
            .await;

        let response = match result {
            Ok(r) => r,
            Err(CircuitError::Open) => {
                warn!(project_id, error_hash, "ai diagnosis circuit open, skipping");
                return;
            }
            Err(CircuitError::Inner(e)) => {
                warn!(project_id, error_hash, error = %e, "ai diagnosis request failed");
                return;
            }
        };

        let mut aggregation = aggregation;
        aggregation.ai_diagnosis = Some(AiDiagnosis {
            summary: response.summary,
            suggested_fix: response.suggested_fix,
            generated_at: chrono::Utc::now(),
        });
        if let Err(e) = self.aggregations.upsert(aggregation).await {
            warn!(project_id, error_hash, error = %e, "failed to persist ai diagnosis");
        }
    }
}
