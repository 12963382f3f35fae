//! Server-side ingestion pipeline (spec.md §4.5-§4.9): queue sharding,
//! per-key aggregation locking, source-map resolution, alert evaluation,
//! and notification dispatch, wired together by [`Pipeline`].

pub mod config;
pub mod config_cache;
pub mod error;
pub mod fingerprint_index;
pub mod metrics;
pub mod occurrence_window;
pub mod queue;
pub mod repository;
pub mod sink;
pub mod workers;

use config::IngestConfig;
use config_cache::ConfigCache;
use error::IngestError;
use fingerprint_index::FingerprintIndex;
use monitor_core::model::{ErrorData, MonitorData};
use occurrence_window::OccurrenceWindow;
use queue::{retry_with_backoff, Job, ShardedQueue};
use repository::{AggregationRepository, AlertHistoryRepository, AlertRuleRepository, ConfigRepository, SourceArchiveRepository};
use sink::RawEventSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};
use workers::aggregation::{AggregationOutcome, AggregationWorker};
use workers::ai_diagnosis::AiDiagnosisWorker;
use workers::alert::AlertEvaluator;
use workers::error_processing::{AggregateErrorJob, ErrorProcessingWorker};
use workers::notification::NotificationWorker;
use workers::sourcemap::SourceMapWorker;

/// One call onto the aggregation shard queue: the job to run, plus a
/// one-shot reply channel so `handle_error` can await the outcome of work
/// that now happens on the shard's own task instead of inline. Routing
/// every `AggregateErrorJob` through here (rather than calling
/// `AggregationWorker::process` directly) is what gives same-key updates
/// the per-key serialization spec.md §5 requires without a global mutex.
struct AggregationRequest {
    job: AggregateErrorJob,
    respond_to: oneshot::Sender<Result<AggregationOutcome, IngestError>>,
}

impl std::fmt::Debug for AggregationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationRequest").field("job", &self.job).finish()
    }
}

/// Everything the pipeline needs, assembled once at startup by
/// `monitor-app` and shared across every worker task.
pub struct Pipeline {
    error_processing: ErrorProcessingWorker,
    aggregation_queue: Arc<ShardedQueue<AggregationRequest>>,
    queue_config: config::QueueConfig,
    sourcemap: SourceMapWorker,
    alert: AlertEvaluator,
    notification: Option<NotificationWorker>,
    ai_diagnosis: Arc<AiDiagnosisWorker>,
    config_repo: Arc<dyn ConfigRepository>,
    sink: Arc<dyn RawEventSink>,
}

pub struct PipelineDeps {
    pub sink: Arc<dyn RawEventSink>,
    pub aggregations: Arc<dyn AggregationRepository>,
    pub configs: Arc<dyn ConfigRepository>,
    pub alert_rules: Arc<dyn AlertRuleRepository>,
    pub alert_history: Arc<dyn AlertHistoryRepository>,
    pub source_archives: Arc<dyn SourceArchiveRepository>,
}

impl Pipeline {
    /// `notification` is `None` when SMTP is not configured for this
    /// deployment (e.g. a local/test environment) — a fired alert is then
    /// logged instead of sent, never a hard failure.
    pub fn new(config: &IngestConfig, deps: PipelineDeps) -> Result<Self, IngestError> {
        let config_cache = Arc::new(ConfigCache::new(
            deps.configs.clone(),
            Duration::from_secs(config.cache.project_config_ttl_seconds),
        ));
        let index = Arc::new(FingerprintIndex::new());
        let windows = Arc::new(OccurrenceWindow::new());
        let notification = Some(NotificationWorker::new(
            config.notification.clone(),
            deps.alert_history.clone(),
        )?);

        let aggregation_worker = Arc::new(AggregationWorker::new(
            deps.aggregations.clone(),
            index,
            windows.clone(),
        ));
        let queue_config = config.queue.clone();
        let handler_config = queue_config.clone();
        let handler_worker = aggregation_worker.clone();
        let aggregation_queue = Arc::new(ShardedQueue::spawn(
            config.queue.n_shards,
            config.queue.worker_concurrency,
            Arc::new(move |request: AggregationRequest| {
                let worker = handler_worker.clone();
                let config = handler_config.clone();
                async move {
                    let AggregationRequest { job, respond_to } = request;
                    let retry_job = Job::new(job.project_id.clone(), job.fingerprint.clone(), job);
                    let outcome = retry_with_backoff(&config, retry_job, |job| worker.process(job.clone())).await;
                    let _ = respond_to.send(outcome);
                }
            }),
        ));

        Ok(Self {
            error_processing: ErrorProcessingWorker::new(deps.sink.clone(), config_cache),
            aggregation_queue,
            queue_config,
            sourcemap: SourceMapWorker::new(
                deps.source_archives,
                deps.aggregations.clone(),
                config.sourcemap.clone(),
            ),
            alert: AlertEvaluator::new(deps.alert_rules, deps.alert_history, windows),
            notification,
            ai_diagnosis: Arc::new(AiDiagnosisWorker::new(
                config.ai_diagnosis_endpoint.clone(),
                deps.aggregations,
            )),
            config_repo: deps.configs,
            sink: deps.sink,
        })
    }

    /// Intake-surface accessor used by `monitor-api`'s health/readiness
    /// checks to confirm the config store is reachable.
    pub fn config_repo(&self) -> &Arc<dyn ConfigRepository> {
        &self.config_repo
    }

    /// Persists a performance or behavior event directly to the raw sink
    /// (spec.md §4.5-§4.9 only define the error chain; performance/behavior
    /// telemetry has no aggregation or alerting counterpart).
    pub async fn handle_telemetry(&self, project_id: &str, data: MonitorData) -> Result<(), IngestError> {
        self.sink.append(project_id, &data).await
    }

    /// Runs the full spec.md §4.6-§4.9 chain for one incoming error event:
    /// fingerprint → persist → aggregate → resolve source location →
    /// evaluate alerts → notify. A failure in any stage after aggregation
    /// is logged and does not roll back the aggregation write (spec.md §7:
    /// "resource unavailable ... pipeline continues").
    ///
    /// `error_processing.process` (fingerprint + raw-sink append) is
    /// deliberately the one stage not driven through `retry_with_backoff`:
    /// the sink append is a plain `INSERT` with no dedupe key, so retrying
    /// it on a transient failure after a partial write risks a duplicate
    /// raw-event row rather than a safe no-op.
    pub async fn handle_error(&self, error: ErrorData) -> Result<(), IngestError> {
        let (aggregate_job, sourcemap_job) = self.error_processing.process(error).await?;
        let project_id = aggregate_job.project_id.clone();
        let fingerprint = aggregate_job.fingerprint.clone();

        let outcome = self.aggregate(aggregate_job).await?;

        if let Some(job) = sourcemap_job {
            let retry_job = Job::new(job.project_id.clone(), job.fingerprint.clone(), job);
            let result = retry_with_backoff(&self.queue_config, retry_job, |job| {
                self.sourcemap.process(
                    &job.project_id,
                    &job.fingerprint,
                    job.project_version.as_deref(),
                    &job.filename,
                    job.line,
                    job.col,
                )
            })
            .await;
            if let Err(e) = result {
                warn!(project_id = %project_id, error = %e, "source-map resolution failed");
            }
        }

        let fired = self.alert.evaluate(&outcome).await?;
        if !fired.is_empty() {
            if let Some(project) = self.config_repo.get(&project_id).await? {
                if let Some(notifier) = &self.notification {
                    for alert in fired {
                        let retry_job = Job::new(project_id.clone(), fingerprint.clone(), alert);
                        let result = retry_with_backoff(&self.queue_config, retry_job, |alert| {
                            notifier.dispatch(&project, alert.clone())
                        })
                        .await;
                        if let Err(e) = result {
                            warn!(project_id = %project_id, error = %e, "notification dispatch failed");
                        }
                    }
                } else {
                    warn!(project_id = %project_id, "alert fired but no notification transport configured");
                }
            }
        }

        if self.ai_diagnosis.enabled() {
            // Detached: spec.md §9 requires the LLM round-trip (up to 30s)
            // never blocks the ingestion response. Best-effort by
            // construction — `process` already swallows its own errors.
            let ai_diagnosis = self.ai_diagnosis.clone();
            let task_project_id = project_id.clone();
            let task_fingerprint = fingerprint.clone();
            tokio::spawn(async move {
                ai_diagnosis.process(&task_project_id, &task_fingerprint).await;
            });
        }

        info!(project_id = %project_id, fingerprint = %fingerprint, "event processed");
        Ok(())
    }

    /// Pushes an aggregation job onto the sharded queue and awaits its
    /// outcome. Routing every call through the shard queue (rather than
    /// calling `AggregationWorker::process` here directly) is what
    /// serializes concurrent updates to the same `(project_id, error_hash)`
    /// onto a single worker task.
    async fn aggregate(&self, job: AggregateErrorJob) -> Result<AggregationOutcome, IngestError> {
        let (respond_to, receiver) = oneshot::channel();
        let queue_job = Job::new(job.project_id.clone(), job.fingerprint.clone(), AggregationRequest { job, respond_to });
        self.aggregation_queue.push(queue_job).await?;
        receiver.await.map_err(|_| IngestError::Internal {
            worker: "aggregation".to_string(),
            message: "aggregation shard worker dropped the response channel".to_string(),
        })?
    }
}
