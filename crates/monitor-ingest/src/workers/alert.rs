//! Alert-rule evaluator (spec.md §4.9). Runs once per aggregation update,
//! after the aggregation worker's write, and only against rules that have
//! not already fired for this aggregation (`alertSent`/`AlertHistory`
//! idempotence, spec.md §8 property 8).

use super::aggregation::AggregationOutcome;
use crate::error::IngestError;
use crate::metrics::{self, WorkerTimer};
use crate::occurrence_window::OccurrenceWindow;
use crate::repository::{AlertHistoryRepository, AlertRuleRepository};
use monitor_core::model::{
    AlertAction, AlertCondition, AlertHistory, AlertHistoryStatus, AlertRule, AlertRuleType,
    ErrorAggregation,
};
use std::sync::Arc;
use uuid::Uuid;

/// A firing rule ready for notification dispatch, carrying everything
/// spec.md §4.9 says the notification job needs:
/// `{rule, projectConfig, triggeredValue, aggregation}`, plus the id of
/// the `Pending` `AlertHistory` row this evaluation already inserted, so
/// the notification worker updates that same row instead of appending a
/// second one for the same firing.
#[derive(Clone)]
pub struct FiredAlert {
    pub rule: AlertRule,
    pub triggered_value: f64,
    pub aggregation: ErrorAggregation,
    pub history_id: String,
}

pub struct AlertEvaluator {
    rules: Arc<dyn AlertRuleRepository>,
    history: Arc<dyn AlertHistoryRepository>,
    windows: Arc<OccurrenceWindow>,
}

impl AlertEvaluator {
    pub fn new(
        rules: Arc<dyn AlertRuleRepository>,
        history: Arc<dyn AlertHistoryRepository>,
        windows: Arc<OccurrenceWindow>,
    ) -> Self {
        Self { rules, history, windows }
    }

    pub async fn evaluate(&self, outcome: &AggregationOutcome) -> Result<Vec<FiredAlert>, IngestError> {
        let _timer = WorkerTimer::start("alert_evaluation");
        let aggregation = &outcome.aggregation;

        if aggregation.alert_sent {
            // Idempotence gate (spec.md §8 property 8): only a fresh band
            // crossing re-arms `alert_sent`, which the aggregation worker
            // already handled before calling us.
            return Ok(Vec::new());
        }

        let rules = self.rules.enabled_rules_for_project(&aggregation.project_id).await?;
        let mut fired = Vec::new();
        let now = chrono::Utc::now();

        for rule in rules {
            if self.history.has_fired(&rule.id, &aggregation.error_hash).await? {
                metrics::record_alert_evaluation(rule_type_label(rule.rule_type), false);
                continue;
            }

            let windowed_count = self.windows.count_within(
                &aggregation.project_id,
                &aggregation.error_hash,
                rule.time_window_seconds,
                now,
            );

            if let Some(triggered_value) = evaluate_rule(&rule, aggregation, windowed_count) {
                metrics::record_alert_evaluation(rule_type_label(rule.rule_type), true);
                let history_id = Uuid::new_v4().to_string();
                self.history
                    .insert(AlertHistory {
                        id: history_id.clone(),
                        rule_id: rule.id.clone(),
                        project_id: aggregation.project_id.clone(),
                        aggregation_error_hash: Some(aggregation.error_hash.clone()),
                        triggered_value,
                        threshold: rule.threshold,
                        time_window_seconds: rule.time_window_seconds,
                        message: format!(
                            "{} crossed threshold {} (observed {})",
                            aggregation.message, rule.threshold, triggered_value
                        ),
                        timestamp: now,
                        status: AlertHistoryStatus::Pending,
                    })
                    .await?;
                fired.push(FiredAlert {
                    rule,
                    triggered_value,
                    aggregation: aggregation.clone(),
                    history_id,
                });
            } else {
                metrics::record_alert_evaluation(rule_type_label(rule.rule_type), false);
            }
        }

        Ok(fired)
    }
}

fn rule_type_label(t: AlertRuleType) -> &'static str {
    match t {
        AlertRuleType::ErrorCount => "error_count",
        AlertRuleType::ErrorRate => "error_rate",
        AlertRuleType::Performance => "performance",
        AlertRuleType::Custom => "custom",
    }
}

/// Returns the observed value that crossed the threshold, or `None` if the
/// rule did not fire. `windowed_count` is the number of occurrences of
/// this aggregation's fingerprint inside `rule.time_window_seconds`
/// (spec.md §4.9, "over timeWindowSeconds") — `ErrorCount` rules compare
/// against it rather than the aggregation's lifetime `occurrence_count`,
/// which would fire on old occurrences that fall outside the window.
fn evaluate_rule(rule: &AlertRule, aggregation: &ErrorAggregation, windowed_count: u64) -> Option<f64> {
    let observed = match (&rule.rule_type, &rule.condition) {
        (AlertRuleType::ErrorCount, AlertCondition::AggregationCount) => windowed_count as f64,
        (AlertRuleType::ErrorCount, AlertCondition::ProjectTotalCount) => {
            // Project-total accounting lives in a separate rolling counter
            // outside the aggregation record; approximate with this
            // fingerprint's own windowed count until that counter exists.
            windowed_count as f64
        }
        (AlertRuleType::ErrorRate, AlertCondition::ErrorRate) => {
            // errorCount / totalEvents over the window; the aggregation
            // alone only carries the numerator, so this rule type needs
            // the project-level event counter populated by the intake
            // surface (monitor_api).
            return None;
        }
        (AlertRuleType::Performance, AlertCondition::Metric { .. }) => return None,
        (AlertRuleType::Custom, AlertCondition::Custom { expression }) => {
            return evaluate_custom(expression, aggregation).then(|| aggregation.occurrence_count as f64)
        }
        _ => return None,
    };

    rule.comparator.evaluate(observed, rule.threshold).then_some(observed)
}

/// Restricted predicate grammar settled on for `custom` rules: a single
/// `field op value` comparison against `occurrence_count` or
/// `affected_user_count`, e.g. `"occurrence_count > 10"` or
/// `"affected_user_count >= 5"`. `&&`/`||` composition is deliberately not
/// supported — spec.md §9 leaves the grammar open and flags this as an
/// implementation decision.
fn evaluate_custom(expression: &str, aggregation: &ErrorAggregation) -> bool {
    let tokens: Vec<&str> = expression.split_whitespace().collect();
    let [field, op, value] = match tokens[..] {
        [f, o, v] => [f, o, v],
        _ => return false,
    };

    let lhs = match field {
        "occurrence_count" => aggregation.occurrence_count as f64,
        "affected_user_count" => aggregation.affected_user_count() as f64,
        "error_level" => aggregation.error_level as u8 as f64,
        _ => return false,
    };

    let Ok(rhs) = value.parse::<f64>() else {
        return false;
    };

    match op {
        ">" => lhs > rhs,
        ">=" => lhs >= rhs,
        "<" => lhs < rhs,
        "<=" => lhs <= rhs,
        "==" => (lhs - rhs).abs() < f64::EPSILON,
        _ => false,
    }
}

#[allow(dead_code)]
fn actions_for(rule: &AlertRule) -> &[AlertAction] {
    &rule.actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::{InMemoryAlertHistoryRepository, InMemoryAlertRuleRepository};
    use monitor_core::model::{Comparator, ErrorType};

    fn aggregation_with_count(count: u64) -> ErrorAggregation {
        let now = chrono::Utc::now();
        let mut agg = ErrorAggregation::new("proj-1", "fp-a", ErrorType::JsError, "boom", None, now);
        agg.occurrence_count = count;
        agg
    }

    fn count_rule(threshold: f64) -> AlertRule {
        AlertRule {
            id: "rule-1".to_string(),
            project_id: "proj-1".to_string(),
            rule_type: AlertRuleType::ErrorCount,
            condition: AlertCondition::AggregationCount,
            comparator: Comparator::GreaterThan,
            threshold,
            time_window_seconds: 300,
            actions: vec![AlertAction::Email],
            enabled: true,
        }
    }

    fn window_with_occurrences(project_id: &str, error_hash: &str, count: u64) -> Arc<OccurrenceWindow> {
        let window = Arc::new(OccurrenceWindow::new());
        let now = chrono::Utc::now();
        for _ in 0..count {
            window.record(project_id, error_hash, now);
        }
        window
    }

    #[tokio::test]
    async fn fires_once_and_is_idempotent_on_second_evaluation() {
        let rules = Arc::new(InMemoryAlertRuleRepository::default());
        rules.insert(count_rule(10.0));
        let history = Arc::new(InMemoryAlertHistoryRepository::default());
        let windows = window_with_occurrences("proj-1", "fp-a", 11);
        let evaluator = AlertEvaluator::new(rules, history.clone(), windows);

        let outcome = AggregationOutcome {
            aggregation: aggregation_with_count(11),
            previous_occurrence_count: 10,
        };

        let fired = evaluator.evaluate(&outcome).await.unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(history.all().len(), 1);

        let fired_again = evaluator.evaluate(&outcome).await.unwrap();
        assert!(fired_again.is_empty());
        assert_eq!(history.all().len(), 1);
    }

    #[tokio::test]
    async fn alert_sent_gate_suppresses_reevaluation() {
        let rules = Arc::new(InMemoryAlertRuleRepository::default());
        rules.insert(count_rule(10.0));
        let history = Arc::new(InMemoryAlertHistoryRepository::default());
        let windows = window_with_occurrences("proj-1", "fp-a", 11);
        let evaluator = AlertEvaluator::new(rules, history.clone(), windows);

        let mut aggregation = aggregation_with_count(11);
        aggregation.alert_sent = true;
        let outcome = AggregationOutcome {
            aggregation,
            previous_occurrence_count: 10,
        };

        let fired = evaluator.evaluate(&outcome).await.unwrap();
        assert!(fired.is_empty());
        assert!(history.all().is_empty());
    }

    #[tokio::test]
    async fn error_count_rule_ignores_occurrences_outside_the_time_window() {
        let rules = Arc::new(InMemoryAlertRuleRepository::default());
        rules.insert(count_rule(10.0)); // time_window_seconds: 300
        let history = Arc::new(InMemoryAlertHistoryRepository::default());
        let windows = Arc::new(OccurrenceWindow::new());
        let now = chrono::Utc::now();
        // 11 lifetime occurrences, but only 2 fall inside the last 300s.
        windows.record("proj-1", "fp-a", now - chrono::Duration::seconds(1_000));
        for _ in 0..8 {
            windows.record("proj-1", "fp-a", now - chrono::Duration::seconds(900));
        }
        windows.record("proj-1", "fp-a", now);
        windows.record("proj-1", "fp-a", now);
        let evaluator = AlertEvaluator::new(rules, history.clone(), windows);

        let outcome = AggregationOutcome {
            aggregation: aggregation_with_count(11),
            previous_occurrence_count: 10,
        };

        let fired = evaluator.evaluate(&outcome).await.unwrap();
        assert!(fired.is_empty());
        assert!(history.all().is_empty());
    }

    #[test]
    fn custom_expression_parses_field_op_value() {
        let agg = aggregation_with_count(42);
        assert!(evaluate_custom("occurrence_count > 10", &agg));
        assert!(!evaluate_custom("occurrence_count < 10", &agg));
        assert!(!evaluate_custom("not a valid expr", &agg));
    }
}
