//! Result Normalization
//!
//! Converts raw persisted job rows (with worker-attached JSON fields) into
//! typed records. Each JSON field is validated independently; a field that
//! fails validation degrades to an empty collection instead of failing the
//! read. Action items additionally try a legacy per-feedback-item decode
//! before giving up. A stored status outside the closed enum degrades to
//! `failed` on read.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::types::{
    ActionItem, CategoryScore, EvaluationRecord, EvaluationResult, GradeResult, JobKind,
    JobRecord, JobStatus, Priority, SimulationMetrics, SimulationResult, TimelinePoint,
};

/// Outcome of validating one worker-attached JSON field.
///
/// Every fallback path is a named branch: callers can observe whether a
/// field validated or degraded, and tests can assert on it.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome<T> {
    Valid(T),
    Fallback,
}

impl<T: Default> FieldOutcome<T> {
    /// Resolve to the validated value or the field's empty default.
    pub fn into_value(self) -> T {
        match self {
            FieldOutcome::Valid(v) => v,
            FieldOutcome::Fallback => T::default(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, FieldOutcome::Fallback)
    }
}

fn decode<T: serde::de::DeserializeOwned>(raw: Option<&Value>) -> FieldOutcome<T> {
    match raw {
        None => FieldOutcome::Fallback,
        Some(value) => match serde_json::from_value::<T>(value.clone()) {
            Ok(v) => FieldOutcome::Valid(v),
            Err(e) => {
                debug!("field failed schema validation: {}", e);
                FieldOutcome::Fallback
            }
        },
    }
}

/// Validate a category-score array.
pub fn coerce_category_scores(raw: Option<&Value>) -> FieldOutcome<Vec<CategoryScore>> {
    decode(raw)
}

/// Validate a plain string-list field (strengths, risks, notes, bottlenecks).
pub fn coerce_string_list(raw: Option<&Value>) -> FieldOutcome<Vec<String>> {
    decode(raw)
}

/// Legacy feedback item: free-text feedback plus an arbitrary priority tag.
#[derive(Debug, Deserialize)]
struct LegacyFeedbackItem {
    feedback: String,
    #[serde(default)]
    priority: Option<String>,
}

/// Validate action items: the current shape first, then the legacy
/// per-feedback-item shape with priorities clamped to {P0,P1,P2}, then empty.
pub fn coerce_action_items(raw: Option<&Value>) -> FieldOutcome<Vec<ActionItem>> {
    let current: FieldOutcome<Vec<ActionItem>> = decode(raw);
    if let FieldOutcome::Valid(items) = current {
        return FieldOutcome::Valid(items);
    }

    match decode::<Vec<LegacyFeedbackItem>>(raw) {
        FieldOutcome::Valid(items) => FieldOutcome::Valid(
            items
                .into_iter()
                .map(|item| ActionItem {
                    title: item.feedback,
                    detail: None,
                    priority: item
                        .priority
                        .as_deref()
                        .map(Priority::clamp)
                        .unwrap_or(Priority::P2),
                })
                .collect(),
        ),
        FieldOutcome::Fallback => FieldOutcome::Fallback,
    }
}

/// Validate simulation metrics.
pub fn coerce_metrics(raw: Option<&Value>) -> FieldOutcome<SimulationMetrics> {
    decode(raw)
}

/// Validate the simulation timeline.
pub fn coerce_timeline(raw: Option<&Value>) -> FieldOutcome<Vec<TimelinePoint>> {
    decode(raw)
}

/// Parse a stored status string. Anything outside the closed enum degrades
/// to `failed` on read; this is defensive normalization, not a transition.
pub fn parse_status(raw: &str) -> JobStatus {
    match JobStatus::parse(raw) {
        Some(status) => status,
        None => {
            debug!("unknown stored status '{}', degrading to failed", raw);
            JobStatus::Failed
        }
    }
}

/// Build the typed grade result from a raw record. Result fields stay at
/// their empty defaults unless the job completed.
pub fn grade_result(record: &JobRecord, status: JobStatus) -> GradeResult {
    if status != JobStatus::Completed {
        return GradeResult::default();
    }
    GradeResult {
        overall_score: record.overall_score,
        category_scores: coerce_category_scores(record.category_scores.as_ref()).into_value(),
        action_items: coerce_action_items(record.action_items.as_ref()).into_value(),
        strengths: coerce_string_list(record.strengths.as_ref()).into_value(),
        risks: coerce_string_list(record.risks.as_ref()).into_value(),
        notes: coerce_string_list(record.notes.as_ref()).into_value(),
    }
}

fn simulation_result(record: &JobRecord, status: JobStatus) -> SimulationResult {
    if status != JobStatus::Completed {
        return SimulationResult::default();
    }
    SimulationResult {
        metrics: coerce_metrics(record.metrics.as_ref()).into_value(),
        timeline: coerce_timeline(record.timeline.as_ref()).into_value(),
        bottlenecks: coerce_string_list(record.bottlenecks.as_ref()).into_value(),
    }
}

/// Normalize a raw persisted record into the caller-facing shape.
pub fn normalize_record(record: JobRecord) -> EvaluationRecord {
    let status = parse_status(&record.status);
    let result = match record.kind {
        JobKind::Grade => EvaluationResult::Grade(grade_result(&record, status)),
        JobKind::Simulate => EvaluationResult::Simulation(simulation_result(&record, status)),
    };

    EvaluationRecord {
        id: record.id,
        version_id: record.version_id,
        kind: record.kind,
        status,
        queued_at: record.queued_at,
        started_at: record.started_at,
        completed_at: record.completed_at,
        failure_reason: record.failure_reason,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn completed_record() -> JobRecord {
        JobRecord {
            id: "job-1".to_string(),
            version_id: "version-1".to_string(),
            kind: JobKind::Grade,
            status: "completed".to_string(),
            queued_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            failure_reason: None,
            overall_score: Some(80.0),
            category_scores: None,
            action_items: None,
            strengths: None,
            risks: None,
            notes: None,
            metrics: None,
            timeline: None,
            bottlenecks: None,
        }
    }

    #[test]
    fn test_category_scores_valid() {
        let raw = json!([{"category": "scalability", "score": 80}]);
        let outcome = coerce_category_scores(Some(&raw));
        assert_eq!(
            outcome,
            FieldOutcome::Valid(vec![CategoryScore {
                category: "scalability".to_string(),
                score: 80.0,
            }])
        );
    }

    #[test]
    fn test_category_scores_malformed_falls_back_empty() {
        let raw = json!({"scalability": "eighty"});
        let outcome = coerce_category_scores(Some(&raw));
        assert!(outcome.is_fallback());
        assert!(outcome.into_value().is_empty());

        let raw = json!([{"category": "scalability", "score": "eighty"}]);
        assert!(coerce_category_scores(Some(&raw)).is_fallback());
    }

    #[test]
    fn test_string_list_malformed_falls_back_empty() {
        let raw = json!([1, 2, 3]);
        let outcome = coerce_string_list(Some(&raw));
        assert!(outcome.is_fallback());
        assert!(outcome.into_value().is_empty());
    }

    #[test]
    fn test_action_items_current_shape() {
        let raw = json!([{"title": "Add a cache", "priority": "P1"}]);
        let items = coerce_action_items(Some(&raw)).into_value();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Add a cache");
        assert_eq!(items[0].priority, Priority::P1);
    }

    #[test]
    fn test_action_items_legacy_fallback() {
        let raw = json!([
            {"feedback": "Shard the database", "priority": "P0"},
            {"feedback": "Tune the cache", "priority": "medium"},
            {"feedback": "Document the API"}
        ]);
        let items = coerce_action_items(Some(&raw)).into_value();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "Shard the database");
        assert_eq!(items[0].priority, Priority::P0);
        // Unknown priority clamps to P2
        assert_eq!(items[1].priority, Priority::P2);
        // Missing priority defaults to P2
        assert_eq!(items[2].priority, Priority::P2);
    }

    #[test]
    fn test_action_items_both_shapes_fail() {
        let raw = json!("not even close");
        let outcome = coerce_action_items(Some(&raw));
        assert!(outcome.is_fallback());
        assert!(outcome.into_value().is_empty());
    }

    #[test]
    fn test_status_degrades_to_failed() {
        assert_eq!(parse_status("completed"), JobStatus::Completed);
        assert_eq!(parse_status("half-done"), JobStatus::Failed);
        assert_eq!(parse_status(""), JobStatus::Failed);
    }

    #[test]
    fn test_normalize_completed_grade() {
        let mut record = completed_record();
        record.category_scores = Some(json!([{"category": "scalability", "score": 80}]));
        record.strengths = Some(json!(["clear separation of concerns"]));

        let normalized = normalize_record(record);
        assert_eq!(normalized.status, JobStatus::Completed);
        match normalized.result {
            EvaluationResult::Grade(grade) => {
                assert_eq!(grade.overall_score, Some(80.0));
                assert_eq!(grade.category_scores.len(), 1);
                assert_eq!(grade.strengths.len(), 1);
                assert!(grade.risks.is_empty());
            }
            EvaluationResult::Simulation(_) => panic!("wrong result kind"),
        }
    }

    #[test]
    fn test_normalize_pending_has_empty_result() {
        let mut record = completed_record();
        record.status = "pending".to_string();
        record.completed_at = None;
        // Stale attached JSON must not leak into a non-terminal read
        record.category_scores = Some(json!([{"category": "scalability", "score": 80}]));

        let normalized = normalize_record(record);
        assert_eq!(normalized.status, JobStatus::Pending);
        match normalized.result {
            EvaluationResult::Grade(grade) => {
                assert!(grade.overall_score.is_none());
                assert!(grade.category_scores.is_empty());
            }
            EvaluationResult::Simulation(_) => panic!("wrong result kind"),
        }
    }

    #[test]
    fn test_normalize_simulation() {
        let mut record = completed_record();
        record.kind = JobKind::Simulate;
        record.metrics = Some(json!({
            "p50_ms": 12.0, "p95_ms": 48.5, "p99_ms": 130.0, "throughput_rps": 950.0
        }));
        record.timeline = Some(json!([
            {"offset_secs": 0, "rps": 100.0, "error_rate": 0.0},
            {"offset_secs": 60, "rps": 900.0, "error_rate": 0.02}
        ]));
        record.bottlenecks = Some(json!(["primary database write path"]));

        let normalized = normalize_record(record);
        match normalized.result {
            EvaluationResult::Simulation(sim) => {
                assert_eq!(sim.metrics.p99_ms, 130.0);
                assert_eq!(sim.timeline.len(), 2);
                assert_eq!(sim.bottlenecks.len(), 1);
            }
            EvaluationResult::Grade(_) => panic!("wrong result kind"),
        }
    }

    #[test]
    fn test_normalize_simulation_malformed_metrics() {
        let mut record = completed_record();
        record.kind = JobKind::Simulate;
        record.metrics = Some(json!({"p50_ms": "fast"}));

        let normalized = normalize_record(record);
        match normalized.result {
            EvaluationResult::Simulation(sim) => {
                assert_eq!(sim.metrics, SimulationMetrics::default());
            }
            EvaluationResult::Grade(_) => panic!("wrong result kind"),
        }
    }
}
