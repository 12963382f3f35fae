//! Rolling per-fingerprint occurrence window (spec.md §4.9, "over
//! timeWindowSeconds"). `ErrorAggregation` only carries a lifetime
//! `occurrence_count`, which can't answer "how many occurrences in the
//! last N seconds" — the aggregation worker timestamps every occurrence
//! here and the alert evaluator queries the window instead of the
//! lifetime count when a rule scopes itself to a time window.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;

/// Timestamps older than this are dropped even without a query pruning
/// them, so a fingerprint nobody alerts on doesn't grow unbounded.
const MAX_RETAINED_PER_KEY: usize = 10_000;

#[derive(Default)]
pub struct OccurrenceWindow {
    timestamps: DashMap<(String, String), VecDeque<DateTime<Utc>>>,
}

impl OccurrenceWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, project_id: &str, error_hash: &str, at: DateTime<Utc>) {
        let mut entry = self
            .timestamps
            .entry((project_id.to_string(), error_hash.to_string()))
            .or_default();
        entry.push_back(at);
        while entry.len() > MAX_RETAINED_PER_KEY {
            entry.pop_front();
        }
    }

    /// Count of occurrences recorded within the last `window_seconds` of
    /// `now`. `0` if the key has never been recorded.
    pub fn count_within(
        &self,
        project_id: &str,
        error_hash: &str,
        window_seconds: u64,
        now: DateTime<Utc>,
    ) -> u64 {
        let Some(entry) = self
            .timestamps
            .get(&(project_id.to_string(), error_hash.to_string()))
        else {
            return 0;
        };
        let cutoff = now - Duration::seconds(window_seconds as i64);
        entry.iter().filter(|ts| **ts >= cutoff).count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_occurrences_inside_the_window() {
        let window = OccurrenceWindow::new();
        let now = Utc::now();
        window.record("p", "fp", now - Duration::seconds(400));
        window.record("p", "fp", now - Duration::seconds(100));
        window.record("p", "fp", now);
        assert_eq!(window.count_within("p", "fp", 300, now), 2);
    }

    #[test]
    fn unknown_key_counts_as_zero() {
        let window = OccurrenceWindow::new();
        assert_eq!(window.count_within("p", "missing", 300, Utc::now()), 0);
    }

    #[test]
    fn distinct_fingerprints_do_not_share_a_window() {
        let window = OccurrenceWindow::new();
        let now = Utc::now();
        window.record("p", "fp-a", now);
        assert_eq!(window.count_within("p", "fp-b", 300, now), 0);
    }
}
