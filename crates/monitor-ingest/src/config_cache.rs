//! Shared-read, single-writer-on-invalidation project config cache
//! (spec.md §5, "Shared resources"; §9, "Config cache invalidation: short
//! TTL, e.g. 30s, is sufficient").

use crate::error::IngestError;
use crate::repository::ConfigRepository;
use dashmap::DashMap;
use monitor_core::model::ProjectConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry {
    config: ProjectConfig,
    cached_at: Instant,
}

pub struct ConfigCache {
    repository: Arc<dyn ConfigRepository>,
    entries: DashMap<String, Entry>,
    ttl: Duration,
}

impl ConfigCache {
    pub fn new(repository: Arc<dyn ConfigRepository>, ttl: Duration) -> Self {
        Self {
            repository,
            entries: DashMap::new(),
            ttl,
        }
    }

    pub async fn get(&self, project_id: &str) -> Result<Option<ProjectConfig>, IngestError> {
        if let Some(entry) = self.entries.get(project_id) {
            if entry.cached_at.elapsed() < self.ttl {
                return Ok(Some(entry.config.clone()));
            }
        }

        let fresh = self.repository.get(project_id).await?;
        if let Some(config) = &fresh {
            self.entries.insert(
                project_id.to_string(),
                Entry {
                    config: config.clone(),
                    cached_at: Instant::now(),
                },
            );
        } else {
            self.entries.remove(project_id);
        }
        Ok(fresh)
    }

    /// Drops a cached entry immediately, e.g. after an admin-facing config
    /// update, instead of waiting out the TTL.
    pub fn invalidate(&self, project_id: &str) {
        self.entries.remove(project_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemoryConfigRepository;
    use monitor_core::model::{AlertLevel, FeatureFlags};

    fn sample_config(project_id: &str) -> ProjectConfig {
        ProjectConfig {
            project_id: project_id.to_string(),
            name: "demo".to_string(),
            api_key: "key".to_string(),
            alert_email: None,
            alert_level: AlertLevel::Low,
            flags: FeatureFlags::default(),
            sourcemap_path: None,
        }
    }

    #[tokio::test]
    async fn caches_until_ttl_expires() {
        let repo = Arc::new(InMemoryConfigRepository::default());
        repo.insert(sample_config("proj-1"));
        let cache = ConfigCache::new(repo.clone(), Duration::from_millis(20));

        let first = cache.get("proj-1").await.unwrap();
        assert!(first.is_some());

        tokio::time::sleep(Duration::from_millis(30)).await;
        let second = cache.get("proj-1").await.unwrap();
        assert!(second.is_some());
    }

    #[tokio::test]
    async fn invalidate_forces_a_fresh_read() {
        let repo = Arc::new(InMemoryConfigRepository::default());
        repo.insert(sample_config("proj-1"));
        let cache = ConfigCache::new(repo.clone(), Duration::from_secs(30));

        cache.get("proj-1").await.unwrap();
        cache.invalidate("proj-1");
        assert!(cache.entries.is_empty());
    }
}
