//! Aggregation worker (spec.md §4.7). The exact-match/similarity-merge/
//! create sequence below only avoids racing another job over the same
//! `(project_id, error_hash)` because `Pipeline` never calls `process`
//! directly — every call is routed through the aggregation shard queue in
//! `lib.rs`, which serializes same-key jobs onto one worker task
//! (spec.md §5). Calling this worker from anywhere else reintroduces the
//! lost-increment race the queue exists to prevent.

use super::error_processing::AggregateErrorJob;
use crate::error::IngestError;
use crate::fingerprint_index::FingerprintIndex;
use crate::metrics::{self, WorkerTimer};
use crate::occurrence_window::OccurrenceWindow;
use crate::repository::AggregationRepository;
use monitor_core::fingerprint::DEFAULT_SIMILARITY_THRESHOLD;
use monitor_core::model::ErrorAggregation;
use std::sync::Arc;
use tracing::info;

pub struct AggregationWorker {
    repository: Arc<dyn AggregationRepository>,
    index: Arc<FingerprintIndex>,
    windows: Arc<OccurrenceWindow>,
}

/// What happened to the aggregation, handed to the alert evaluator so it
/// only runs against aggregations that actually changed this tick.
pub struct AggregationOutcome {
    pub aggregation: ErrorAggregation,
    pub previous_occurrence_count: u64,
}

impl AggregationWorker {
    pub fn new(
        repository: Arc<dyn AggregationRepository>,
        index: Arc<FingerprintIndex>,
        windows: Arc<OccurrenceWindow>,
    ) -> Self {
        Self { repository, index, windows }
    }

    pub async fn process(&self, job: AggregateErrorJob) -> Result<AggregationOutcome, IngestError> {
        let _timer = WorkerTimer::start("aggregation");
        let now = chrono::Utc::now();
        let user_id = job.error.envelope.user_id.as_deref();

        if let Some(mut existing) = self
            .repository
            .find_exact(&job.project_id, &job.fingerprint)
            .await?
        {
            let previous = existing.occurrence_count;
            existing.record_occurrence(user_id, now);
            self.repository.upsert(existing.clone()).await?;
            self.windows.record(&existing.project_id, &existing.error_hash, now);
            metrics::record_aggregation("exact_match");
            return Ok(AggregationOutcome {
                aggregation: existing,
                previous_occurrence_count: previous,
            });
        }

        let candidates = self.index.candidates(&job.project_id, &job.fingerprint);
        let best = candidates
            .into_iter()
            .filter_map(|candidate_fp| {
                let score = monitor_core::fingerprint::similarity(&job.fingerprint, &candidate_fp);
                (score > DEFAULT_SIMILARITY_THRESHOLD).then_some((candidate_fp, score))
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((matched_fingerprint, score)) = best {
            if let Some(mut existing) = self
                .repository
                .find_exact(&job.project_id, &matched_fingerprint)
                .await?
            {
                info!(score, fingerprint = %job.fingerprint, matched = %matched_fingerprint, "merging near-duplicate fingerprint");
                let previous = existing.occurrence_count;
                existing.record_occurrence(user_id, now);
                self.repository.upsert(existing.clone()).await?;
                self.windows.record(&existing.project_id, &existing.error_hash, now);
                metrics::record_aggregation("similarity_merge");
                return Ok(AggregationOutcome {
                    aggregation: existing,
                    previous_occurrence_count: previous,
                });
            }
        }

        let mut aggregation = ErrorAggregation::new(
            job.project_id.clone(),
            job.fingerprint.clone(),
            job.error.error_type,
            job.error.message.clone(),
            job.error.stack.clone(),
            now,
        );
        if let Some(uid) = user_id {
            aggregation.affected_users.insert(uid.to_string());
        }
        self.repository.upsert(aggregation.clone()).await?;
        self.windows.record(&aggregation.project_id, &aggregation.error_hash, now);
        self.index.insert(&job.project_id, &job.fingerprint);
        metrics::record_aggregation("created");
        Ok(AggregationOutcome {
            aggregation,
            previous_occurrence_count: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemoryAggregationRepository;
    use crate::workers::error_processing::AggregateErrorJob;
    use monitor_core::model::{ErrorData, ErrorType, EventEnvelope, Platform};

    fn error_job(project_id: &str, fingerprint: &str, message: &str, user_id: Option<&str>) -> AggregateErrorJob {
        AggregateErrorJob {
            project_id: project_id.to_string(),
            fingerprint: fingerprint.to_string(),
            error: ErrorData {
                envelope: EventEnvelope {
                    id: "evt-1".to_string(),
                    timestamp: 0,
                    project_id: project_id.to_string(),
                    project_version: None,
                    session_id: "sess-1".to_string(),
                    user_id: user_id.map(|s| s.to_string()),
                    page_url: "https://example.test/".to_string(),
                    user_agent: "test-agent".to_string(),
                    platform: Platform::Web,
                    tags: None,
                },
                error_type: ErrorType::JsError,
                message: message.to_string(),
                stack: None,
                filename: None,
                lineno: None,
                colno: None,
                resolved: None,
                component_stack: None,
            },
        }
    }

    fn worker(repo: Arc<InMemoryAggregationRepository>) -> AggregationWorker {
        AggregationWorker::new(repo, Arc::new(FingerprintIndex::new()), Arc::new(OccurrenceWindow::new()))
    }

    #[tokio::test]
    async fn first_occurrence_creates_a_new_aggregation() {
        let repo = Arc::new(InMemoryAggregationRepository::default());
        let worker = worker(repo.clone());

        let outcome = worker
            .process(error_job("proj-1", "fp-a", "boom", Some("user-1")))
            .await
            .unwrap();
        assert_eq!(outcome.aggregation.occurrence_count, 1);
        assert_eq!(outcome.previous_occurrence_count, 0);
    }

    #[tokio::test]
    async fn repeated_exact_fingerprint_increments_count() {
        let repo = Arc::new(InMemoryAggregationRepository::default());
        let worker = worker(repo.clone());

        worker
            .process(error_job("proj-1", "fp-a", "boom", Some("user-1")))
            .await
            .unwrap();
        let outcome = worker
            .process(error_job("proj-1", "fp-a", "boom", Some("user-2")))
            .await
            .unwrap();
        assert_eq!(outcome.aggregation.occurrence_count, 2);
        assert_eq!(outcome.aggregation.affected_user_count(), 2);
        assert_eq!(outcome.previous_occurrence_count, 1);
    }
}
