//! Error-processing worker (spec.md §4.6): fingerprint, persist to the raw
//! sink, load config, and fan out the downstream aggregate/sourcemap jobs.

use crate::config_cache::ConfigCache;
use crate::error::IngestError;
use crate::metrics::{self, WorkerTimer};
use crate::sink::RawEventSink;
use monitor_core::fingerprint::{compute_fingerprint, FeatureExtractionConfig, FingerprintInput};
use monitor_core::model::{ErrorData, MonitorData};
use std::sync::Arc;
use tracing::{info_span, Instrument};

/// A fingerprinted error ready to aggregate, plus whatever the source-map
/// worker needs if enabled.
#[derive(Debug, Clone)]
pub struct AggregateErrorJob {
    pub project_id: String,
    pub fingerprint: String,
    pub error: ErrorData,
}

#[derive(Debug, Clone)]
pub struct ProcessSourcemapJob {
    pub project_id: String,
    pub project_version: Option<String>,
    pub fingerprint: String,
    pub filename: String,
    pub line: u32,
    pub col: u32,
}

pub struct ErrorProcessingWorker {
    sink: Arc<dyn RawEventSink>,
    config_cache: Arc<ConfigCache>,
    feature_config: FeatureExtractionConfig,
}

impl ErrorProcessingWorker {
    pub fn new(sink: Arc<dyn RawEventSink>, config_cache: Arc<ConfigCache>) -> Self {
        Self {
            sink,
            config_cache,
            feature_config: FeatureExtractionConfig::default(),
        }
    }

    /// Runs steps 1-4 of spec.md §4.6, returning the jobs the caller should
    /// enqueue next. The caller owns routing them onto the sharded queues.
    pub async fn process(
        &self,
        error: ErrorData,
    ) -> Result<(AggregateErrorJob, Option<ProcessSourcemapJob>), IngestError> {
        let _timer = WorkerTimer::start("error_processing");
        let project_id = error.envelope.project_id.clone();
        let span = info_span!("error_processing", project_id = %project_id, event_id = %error.envelope.id);

        async {
            let input = FingerprintInput {
                error_type: Some(error.error_type),
                message: &error.message,
                stack: error.stack.as_deref(),
                filename: error.filename.as_deref(),
            };
            let fingerprint = compute_fingerprint(&input, &self.feature_config);

            self.sink
                .append(&project_id, &MonitorData::Error(error.clone()))
                .await?;

            let config = self.config_cache.get(&project_id).await?.ok_or_else(|| {
                IngestError::UnknownProject {
                    project_id: project_id.clone(),
                }
            })?;

            let sourcemap_job = match (config.flags.sourcemap, &error.filename, error.lineno, error.colno) {
                (true, Some(filename), Some(line), Some(col)) => Some(ProcessSourcemapJob {
                    project_id: project_id.clone(),
                    project_version: error.envelope.project_version.clone(),
                    fingerprint: fingerprint.clone(),
                    filename: filename.clone(),
                    line,
                    col,
                }),
                _ => None,
            };

            metrics::record_ingest(
                match error.envelope.platform {
                    monitor_core::model::Platform::Web => "web",
                    monitor_core::model::Platform::MiniProgram => "mini_program",
                },
                "enqueued",
            );

            Ok((
                AggregateErrorJob {
                    project_id,
                    fingerprint,
                    error,
                },
                sourcemap_job,
            ))
        }
        .instrument(span)
        .await
    }
}
