//! Sits in front of the queue for error events (spec.md §4.2): filter,
//! sample, fingerprint, aggregate in-memory, decide when to emit.

use monitor_core::fingerprint::{
    compute_fingerprint, FeatureExtractionConfig, FingerprintInput,
};
use monitor_core::model::{ErrorAggregation, ErrorData, ErrorLevel, MonitorData};
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::debug;

pub struct ErrorManagerConfig {
    /// Regex allowlist of negations: an error matching any filter is
    /// dropped (spec.md §4.2, "filter (regex allowlist of negations)").
    pub filters: Vec<regex::Regex>,
    pub sample_rate: f64,
    pub max_aggregations: usize,
    pub max_recent_errors: usize,
    pub feature_config: FeatureExtractionConfig,
}

impl Default for ErrorManagerConfig {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sample_rate: 1.0,
            max_aggregations: 200,
            max_recent_errors: 5,
            feature_config: FeatureExtractionConfig::default(),
        }
    }
}

struct Aggregate {
    count: u64,
    first_seen_ms: i64,
    last_seen_ms: i64,
    level: ErrorLevel,
    affected_users: BTreeSet<String>,
    recent_errors: VecDeque<ErrorData>,
}

impl Aggregate {
    fn new(now_ms: i64, max_recent: usize, error: ErrorData) -> Self {
        let mut recent_errors = VecDeque::with_capacity(max_recent);
        recent_errors.push_back(error);
        Self {
            count: 1,
            first_seen_ms: now_ms,
            last_seen_ms: now_ms,
            level: ErrorLevel::from_volume(1, 0),
            affected_users: BTreeSet::new(),
            recent_errors,
        }
    }

    fn record(&mut self, now_ms: i64, error: ErrorData, max_recent: usize) {
        self.count += 1;
        self.last_seen_ms = now_ms;
        if let Some(uid) = error.envelope.user_id.clone() {
            self.affected_users.insert(uid);
        }
        self.level = ErrorLevel::from_volume(self.count, self.affected_users.len() as u64);
        self.recent_errors.push_back(error);
        while self.recent_errors.len() > max_recent {
            self.recent_errors.pop_front();
        }
    }
}

/// `count ∈ {1, 5, 10}` or `count mod 50 == 0` (spec.md §4.2, "emission
/// policy").
fn should_emit(count: u64) -> bool {
    matches!(count, 1 | 5 | 10) || (count >= 50 && count % 50 == 0)
}

pub struct ErrorManager {
    config: ErrorManagerConfig,
    aggregations: HashMap<String, Aggregate>,
}

impl ErrorManager {
    pub fn new(config: ErrorManagerConfig) -> Self {
        Self {
            config,
            aggregations: HashMap::new(),
        }
    }

    /// Returns `true` if this error should be dropped before fingerprinting
    /// — either an allowlisted-negation filter matches, or the sample roll
    /// fails (`roll > sampleRate`, spec.md §4.2).
    fn should_drop(&self, error: &ErrorData, roll: f64) -> bool {
        if roll > self.config.sample_rate {
            return true;
        }
        self.config
            .filters
            .iter()
            .any(|re| re.is_match(&error.message))
    }

    fn fingerprint_of(&self, error: &ErrorData) -> String {
        let input = FingerprintInput {
            error_type: Some(error.error_type),
            message: &error.message,
            stack: error.stack.as_deref(),
            filename: error.filename.as_deref(),
        };
        compute_fingerprint(&input, &self.config.feature_config)
    }

    /// Evicts the aggregation whose `last_seen_ms` is oldest when
    /// `max_aggregations` would otherwise be exceeded (spec.md §4.2, "on
    /// eviction: oldest-by-lastSeen").
    fn evict_if_needed(&mut self) {
        if self.aggregations.len() <= self.config.max_aggregations {
            return;
        }
        if let Some(oldest_key) = self
            .aggregations
            .iter()
            .min_by_key(|(_, agg)| agg.last_seen_ms)
            .map(|(k, _)| k.clone())
        {
            self.aggregations.remove(&oldest_key);
        }
    }

    /// Runs one error through filter/sample/fingerprint/aggregate and, if
    /// the emission policy fires, returns the most recent event tagged
    /// with `aggregation_count`, `aggregation_fingerprint`,
    /// `affected_users` (spec.md §4.2), ready for `BaseManager::add_to_queue`.
    pub fn handle(&mut self, error: ErrorData, roll: f64, now_ms: i64) -> Option<MonitorData> {
        if self.should_drop(&error, roll) {
            return None;
        }
        let fingerprint = self.fingerprint_of(&error);

        let max_recent = self.config.max_recent_errors;
        let agg = self
            .aggregations
            .entry(fingerprint.clone())
            .and_modify(|a| a.record(now_ms, error.clone(), max_recent))
            .or_insert_with(|| Aggregate::new(now_ms, max_recent, error.clone()));

        let count = agg.count;
        let affected_users = agg.affected_users.len() as u64;
        let emit = should_emit(count);
        debug!(fingerprint = %fingerprint, count, emit, "error aggregated");
        self.evict_if_needed();

        if !emit {
            return None;
        }

        let mut tagged = error;
        let tags = tagged.envelope.tags.get_or_insert_with(Default::default);
        tags.insert("aggregation_count".to_string(), count.to_string());
        tags.insert("aggregation_fingerprint".to_string(), fingerprint);
        tags.insert("affected_users".to_string(), affected_users.to_string());
        Some(MonitorData::Error(tagged))
    }

    /// Read-only snapshot for tests/diagnostics; not part of the emission path.
    pub fn aggregation_count(&self, fingerprint: &str) -> Option<u64> {
        self.aggregations.get(fingerprint).map(|a| a.count)
    }

    pub fn to_core_aggregation(
        &self,
        fingerprint: &str,
        project_id: &str,
    ) -> Option<ErrorAggregation> {
        let agg = self.aggregations.get(fingerprint)?;
        let last = agg.recent_errors.back()?;
        let mut core = ErrorAggregation::new(
            project_id,
            fingerprint,
            last.error_type,
            last.message.clone(),
            last.stack.clone(),
            chrono::DateTime::from_timestamp_millis(agg.first_seen_ms).unwrap_or_default(),
        );
        core.last_seen =
            chrono::DateTime::from_timestamp_millis(agg.last_seen_ms).unwrap_or_default();
        core.occurrence_count = agg.count;
        core.affected_users = agg.affected_users.clone();
        core.error_level = agg.level;
        Some(core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_core::model::{EventEnvelope, Platform};

    fn envelope() -> EventEnvelope {
        EventEnvelope {
            id: "evt-1".into(),
            timestamp: 0,
            project_id: "proj".into(),
            project_version: None,
            session_id: "sess".into(),
            user_id: Some("user-1".into()),
            page_url: "https://example.com".into(),
            user_agent: "ua".into(),
            platform: Platform::Web,
            tags: None,
        }
    }

    fn error(message: &str) -> ErrorData {
        ErrorData {
            envelope: envelope(),
            error_type: monitor_core::model::ErrorType::JsError,
            message: message.to_string(),
            stack: Some("at foo (app.js:1:1)".to_string()),
            filename: Some("/src/app.js".to_string()),
            lineno: Some(1),
            colno: Some(1),
            resolved: None,
            component_stack: None,
        }
    }

    #[test]
    fn emits_on_first_and_fifth_and_tenth_occurrence() {
        let mut mgr = ErrorManager::new(ErrorManagerConfig::default());
        let mut emitted_at_counts = Vec::new();
        for i in 0..10 {
            let result = mgr.handle(error("boom: connection refused"), 0.0, i);
            if result.is_some() {
                emitted_at_counts.push(i + 1);
            }
        }
        assert_eq!(emitted_at_counts, vec![1, 5, 10]);
    }

    #[test]
    fn tags_emitted_event_with_aggregation_metadata() {
        let mut mgr = ErrorManager::new(ErrorManagerConfig::default());
        let emitted = mgr.handle(error("boom"), 0.0, 0).unwrap();
        let tags = emitted.envelope().tags.as_ref().unwrap();
        assert_eq!(tags.get("aggregation_count").unwrap(), "1");
        assert!(tags.contains_key("aggregation_fingerprint"));
        assert_eq!(tags.get("affected_users").unwrap(), "0");
    }

    #[test]
    fn sample_roll_above_rate_drops_the_event() {
        let mut config = ErrorManagerConfig::default();
        config.sample_rate = 0.1;
        let mut mgr = ErrorManager::new(config);
        assert!(mgr.handle(error("boom"), 0.9, 0).is_none());
    }

    #[test]
    fn regex_filter_drops_matching_message() {
        let mut config = ErrorManagerConfig::default();
        config.filters.push(regex::Regex::new("ResizeObserver").unwrap());
        let mut mgr = ErrorManager::new(config);
        assert!(mgr
            .handle(error("ResizeObserver loop limit exceeded"), 0.0, 0)
            .is_none());
    }

    #[test]
    fn distinct_messages_fingerprint_separately() {
        let mut mgr = ErrorManager::new(ErrorManagerConfig::default());
        mgr.handle(error("TypeError: cannot read foo of undefined"), 0.0, 0);
        mgr.handle(error("RangeError: invalid array length"), 0.0, 0);
        assert_eq!(mgr.aggregations.len(), 2);
    }

    #[test]
    fn eviction_drops_oldest_by_last_seen_when_over_capacity() {
        let mut config = ErrorManagerConfig::default();
        config.max_aggregations = 2;
        let mut mgr = ErrorManager::new(config);
        mgr.handle(error("error-a"), 0.0, 0);
        mgr.handle(error("error-b"), 0.0, 1);
        mgr.handle(error("error-c"), 0.0, 2);
        assert_eq!(mgr.aggregations.len(), 2);
    }
}
