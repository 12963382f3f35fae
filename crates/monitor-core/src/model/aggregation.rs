use super::event::{ErrorType, ResolvedSourceLocation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStatus {
    New,
    Acknowledged,
    Fixing,
    Fixed,
    Ignored,
}

/// Error severity band derived from volume (spec.md §4.7, step 1).
/// Ordered so `level >= ErrorLevel::Warning` style comparisons work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorLevel {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl ErrorLevel {
    /// `(count≥100 ∨ users≥50 → 4)`, `(≥50 ∨ ≥20 → 3)`, `(≥10 ∨ ≥5 → 2)`,
    /// else 1 — spec.md §4.7.
    pub fn from_volume(count: u64, affected_users: u64) -> Self {
        if count >= 100 || affected_users >= 50 {
            ErrorLevel::Critical
        } else if count >= 50 || affected_users >= 20 {
            ErrorLevel::High
        } else if count >= 10 || affected_users >= 5 {
            ErrorLevel::Medium
        } else {
            ErrorLevel::Low
        }
    }
}

/// An AI-produced diagnosis blob, attached asynchronously by the optional
/// LLM diagnosis worker (spec.md §2.B.7). Failures to populate this never
/// block ingestion or alerting (spec.md §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiDiagnosis {
    pub summary: String,
    pub suggested_fix: Option<String>,
    pub generated_at: DateTime<Utc>,
}

/// Persistent record keyed by `(project_id, error_hash)` (spec.md §3).
/// Mutated only by the aggregation worker, under per-fingerprint
/// serialization (spec.md §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorAggregation {
    pub project_id: String,
    pub error_hash: String,
    pub error_type: ErrorType,
    pub message: String,
    pub stack: Option<String>,
    pub source_location: Option<ResolvedSourceLocation>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrence_count: u64,
    pub affected_users: BTreeSet<String>,
    pub error_level: ErrorLevel,
    pub status: AggregationStatus,
    pub alert_sent: bool,
    pub alert_sent_at: Option<DateTime<Utc>>,
    pub ai_diagnosis: Option<AiDiagnosis>,
}

impl ErrorAggregation {
    pub fn new(
        project_id: impl Into<String>,
        error_hash: impl Into<String>,
        error_type: ErrorType,
        message: impl Into<String>,
        stack: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            error_hash: error_hash.into(),
            error_type,
            message: message.into(),
            stack,
            source_location: None,
            first_seen: now,
            last_seen: now,
            occurrence_count: 1,
            affected_users: BTreeSet::new(),
            error_level: ErrorLevel::Low,
            status: AggregationStatus::New,
            alert_sent: false,
            alert_sent_at: None,
            ai_diagnosis: None,
        }
    }

    /// Invariant: `occurrence_count >= 1 && first_seen <= last_seen`
    /// (spec.md §3).
    pub fn check_invariants(&self) -> bool {
        self.occurrence_count >= 1 && self.first_seen <= self.last_seen
    }

    pub fn affected_user_count(&self) -> u64 {
        self.affected_users.len() as u64
    }

    /// Count threshold bands used for the emission/re-arm policy in
    /// spec.md §4.2 and §4.9: 1, 5, 10, 50, 100, ... re-arm `alert_sent`.
    pub fn crossed_new_band(&self, previous_count: u64) -> bool {
        const BANDS: [u64; 4] = [1, 5, 10, 50];
        let crosses_fixed_band = BANDS
            .iter()
            .any(|&b| previous_count < b && self.occurrence_count >= b);
        let crosses_modulo_band =
            previous_count / 50 != self.occurrence_count / 50 && self.occurrence_count >= 50;
        crosses_fixed_band || crosses_modulo_band
    }

    pub fn record_occurrence(&mut self, user_id: Option<&str>, now: DateTime<Utc>) {
        let previous_count = self.occurrence_count;
        self.occurrence_count += 1;
        self.last_seen = now;
        if let Some(uid) = user_id {
            self.affected_users.insert(uid.to_string());
        }
        self.error_level = ErrorLevel::from_volume(self.occurrence_count, self.affected_user_count());
        if self.crossed_new_band(previous_count) {
            self.alert_sent = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_level_thresholds() {
        assert_eq!(ErrorLevel::from_volume(1, 0), ErrorLevel::Low);
        assert_eq!(ErrorLevel::from_volume(10, 0), ErrorLevel::Medium);
        assert_eq!(ErrorLevel::from_volume(9, 5), ErrorLevel::Medium);
        assert_eq!(ErrorLevel::from_volume(50, 0), ErrorLevel::High);
        assert_eq!(ErrorLevel::from_volume(0, 20), ErrorLevel::High);
        assert_eq!(ErrorLevel::from_volume(100, 0), ErrorLevel::Critical);
        assert_eq!(ErrorLevel::from_volume(0, 50), ErrorLevel::Critical);
    }

    #[test]
    fn record_occurrence_upholds_invariants() {
        let now = Utc::now();
        let mut agg = ErrorAggregation::new(
            "proj1",
            "abc123",
            ErrorType::JsError,
            "boom",
            None,
            now,
        );
        assert!(agg.check_invariants());
        agg.record_occurrence(Some("user-1"), now + chrono::Duration::seconds(1));
        assert_eq!(agg.occurrence_count, 2);
        assert_eq!(agg.affected_user_count(), 1);
        assert!(agg.check_invariants());
    }

    #[test]
    fn crossing_a_new_band_rearms_alerting() {
        let now = Utc::now();
        let mut agg = ErrorAggregation::new("p", "h", ErrorType::JsError, "m", None, now);
        agg.alert_sent = true;
        for _ in 0..4 {
            agg.record_occurrence(None, now);
        }
        // count goes 1 -> 5, crossing the "5" band.
        assert_eq!(agg.occurrence_count, 5);
        assert!(!agg.alert_sent);
    }
}
