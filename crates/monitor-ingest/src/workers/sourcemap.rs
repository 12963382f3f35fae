//! Source-map worker (spec.md §4.8): bounded LRU of parsed consumers,
//! singleflight construction per `(project_id, minified_filename)`
//! (spec.md §5, "deduplicated via a singleflight guarantee").

use crate::config::SourceMapConfig;
use crate::error::IngestError;
use crate::metrics::{self, WorkerTimer};
use crate::repository::{AggregationRepository, SourceArchiveRepository};
use dashmap::DashMap;
use lru::LruCache;
use monitor_core::model::ResolvedSourceLocation;
use sourcemap::SourceMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::OnceCell;
use tracing::debug;

type Key = (String, String);

struct CachedConsumer {
    map: SourceMap,
    cached_at: std::time::Instant,
}

/// One shared slot per key so concurrent lookups for the same file await
/// the same parse instead of racing to build it twice.
type Slot = Arc<OnceCell<Option<Arc<CachedConsumer>>>>;

pub struct SourceMapWorker {
    archives: Arc<dyn SourceArchiveRepository>,
    aggregations: Arc<dyn AggregationRepository>,
    config: SourceMapConfig,
    cache: AsyncMutex<LruCache<Key, Slot>>,
    inflight: DashMap<Key, Slot>,
}

impl SourceMapWorker {
    pub fn new(
        archives: Arc<dyn SourceArchiveRepository>,
        aggregations: Arc<dyn AggregationRepository>,
        config: SourceMapConfig,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity.max(1)).unwrap();
        Self {
            archives,
            aggregations,
            config,
            cache: AsyncMutex::new(LruCache::new(capacity)),
            inflight: DashMap::new(),
        }
    }

    async fn consumer_for(
        &self,
        project_id: &str,
        version: &str,
        filename: &str,
    ) -> Option<Arc<CachedConsumer>> {
        let key = (project_id.to_string(), filename.to_string());

        if let Some(slot) = self.cache.lock().await.get(&key).cloned() {
            if let Some(Some(entry)) = slot.get() {
                if entry.cached_at.elapsed().as_secs() < self.config.cache_ttl_seconds {
                    metrics::record_sourcemap_cache("hit");
                    return Some(entry.clone());
                }
            }
        }

        let slot = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = slot
            .get_or_init(|| async {
                self.build_consumer(project_id, version, filename)
                    .await
                    .map(Arc::new)
            })
            .await
            .clone();

        self.inflight.remove(&key);
        metrics::record_sourcemap_cache(if result.is_some() { "miss_built" } else { "miss_absent" });

        if result.is_some() {
            self.cache.lock().await.put(key, slot);
        }
        result
    }

    async fn build_consumer(
        &self,
        project_id: &str,
        version: &str,
        filename: &str,
    ) -> Option<CachedConsumer> {
        for candidate in candidate_names(filename) {
            match self
                .archives
                .find_source_map_path(project_id, version, &candidate)
                .await
            {
                Ok(Some(path)) => match parse_map(&path, self.config.parse_timeout()).await {
                    Ok(map) => {
                        return Some(CachedConsumer {
                            map,
                            cached_at: std::time::Instant::now(),
                        })
                    }
                    Err(e) => debug!(path = %path.display(), error = %e, "source map unparsable"),
                },
                Ok(None) => continue,
                Err(e) => debug!(error = %e, "source archive lookup failed"),
            }
        }
        debug!(project_id, filename, "no source map found");
        None
    }

    /// `resolve(projectId, file, line, col)` (spec.md §4.8). Never retried
    /// on failure; `None` means the caller persists the event without
    /// enrichment.
    pub async fn resolve(
        &self,
        project_id: &str,
        version: Option<&str>,
        filename: &str,
        line: u32,
        col: u32,
    ) -> Option<ResolvedSourceLocation> {
        let version = version.unwrap_or("latest");
        let consumer = self.consumer_for(project_id, version, filename).await?;
        let token = consumer.map.lookup_token(line.saturating_sub(1), col)?;
        Some(ResolvedSourceLocation {
            source: token.get_source().unwrap_or(filename).to_string(),
            line: token.get_src_line() + 1,
            column: token.get_src_col(),
            name: token.get_name().map(|s| s.to_string()),
            source_content: token.get_source_view().map(|s| s.to_string()),
        })
    }

    /// Runs `resolve` then, on success, updates the aggregation's
    /// representative source location without touching the sink
    /// (spec.md §4.8, "does not rewrite the sink").
    pub async fn process(
        &self,
        project_id: &str,
        fingerprint: &str,
        version: Option<&str>,
        filename: &str,
        line: u32,
        col: u32,
    ) -> Result<(), IngestError> {
        let _timer = WorkerTimer::start("sourcemap");
        let Some(resolved) = self.resolve(project_id, version, filename, line, col).await else {
            return Ok(());
        };
        if let Some(mut aggregation) = self.aggregations.find_exact(project_id, fingerprint).await? {
            aggregation.source_location = Some(resolved);
            self.aggregations.upsert(aggregation).await?;
        }
        Ok(())
    }
}

fn candidate_names(filename: &str) -> Vec<String> {
    let basename = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    vec![
        format!("{filename}.map"),
        format!("{basename}.map"),
        format!("{filename}.js.map"),
        format!("{basename}.js.map"),
    ]
}

/// Bounded by `config.parse_timeout()` (spec.md §5, "source-map parse
/// 2s"): a pathological map can't stall the calling request past that
/// deadline. The `spawn_blocking` task itself keeps running to completion
/// on the blocking pool even after the timeout fires — only the result is
/// discarded — so this bounds latency, not the underlying CPU work.
async fn parse_map(path: &PathBuf, timeout: std::time::Duration) -> Result<SourceMap, IngestError> {
    let owned_path = path.clone();
    let parse = tokio::task::spawn_blocking(move || {
        let bytes = std::fs::read(&owned_path).map_err(|e| IngestError::ResourceUnavailable {
            message: format!("{}: {e}", owned_path.display()),
        })?;
        SourceMap::from_slice(&bytes).map_err(|e| IngestError::ResourceUnavailable {
            message: format!("{}: {e}", owned_path.display()),
        })
    });

    match tokio::time::timeout(timeout, parse).await {
        Ok(joined) => joined.map_err(|e| IngestError::Internal {
            worker: "sourcemap".to_string(),
            message: e.to_string(),
        })?,
        Err(_) => Err(IngestError::ResourceUnavailable {
            message: format!("{}: source-map parse timed out after {timeout:?}", path.display()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::{InMemoryAggregationRepository, InMemorySourceArchiveRepository};
    use monitor_core::model::{ErrorAggregation, ErrorType};

    #[tokio::test]
    async fn resolves_a_known_position_and_updates_the_aggregation() {
        let dir = tempfile::tempdir().unwrap();
        let map_path = dir.path().join("app.min.js.map");
        std::fs::write(
            &map_path,
            br#"{"version":3,"sources":["src/app.ts"],"names":[],"mappings":"AAAA","file":"app.min.js"}"#,
        )
        .unwrap();

        let archives = Arc::new(InMemorySourceArchiveRepository::default());
        archives.register("proj-1", "latest", "app.min.js.js.map", map_path.clone());

        let aggregations = Arc::new(InMemoryAggregationRepository::default());
        let now = chrono::Utc::now();
        aggregations
            .upsert(ErrorAggregation::new(
                "proj-1",
                "fp-a",
                ErrorType::JsError,
                "boom",
                None,
                now,
            ))
            .await
            .unwrap();

        let worker = SourceMapWorker::new(archives, aggregations.clone(), SourceMapConfig::default());
        worker
            .process("proj-1", "fp-a", Some("latest"), "app.min.js", 1, 0)
            .await
            .unwrap();

        let updated = aggregations.find_exact("proj-1", "fp-a").await.unwrap().unwrap();
        assert_eq!(
            updated.source_location.as_ref().map(|s| s.source.as_str()),
            Some("src/app.ts")
        );
    }

    #[tokio::test]
    async fn missing_map_resolves_to_none_without_error() {
        let archives = Arc::new(InMemorySourceArchiveRepository::default());
        let aggregations = Arc::new(InMemoryAggregationRepository::default());
        let worker = SourceMapWorker::new(archives, aggregations, SourceMapConfig::default());

        let resolved = worker
            .resolve("proj-1", Some("latest"), "missing.min.js", 1, 0)
            .await;
        assert!(resolved.is_none());
    }
}
