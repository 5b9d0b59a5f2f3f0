//! Core types for the design evaluation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// JOB IDENTITY
// ============================================================================

/// Kind of evaluation performed on a design version.
///
/// Both kinds share the same lifecycle; they differ only in the worker that
/// consumes them and the shape of the attached result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Automated grading: produces a grade report.
    Grade,
    /// Load simulation: produces a simulation run.
    Simulate,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Grade => "grade",
            JobKind::Simulate => "simulate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "grade" => Some(JobKind::Grade),
            "simulate" => Some(JobKind::Simulate),
            _ => None,
        }
    }

    /// Queue name the external worker pool consumes for this kind.
    pub fn queue_name(&self) -> &'static str {
        match self {
            JobKind::Grade => "grade-reports",
            JobKind::Simulate => "simulation-runs",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an evaluation job.
///
/// Transitions are monotonic forward-only: pending -> running -> completed
/// or failed, plus the pending -> failed shortcut on enqueue failure. A
/// terminal status never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Position in the pending < running < terminal ordering. Both terminal
    /// states share the highest rank.
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Running => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }
}

/// Terminal status a worker may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalStatus {
    Completed,
    Failed,
}

impl From<TerminalStatus> for JobStatus {
    fn from(t: TerminalStatus) -> Self {
        match t {
            TerminalStatus::Completed => JobStatus::Completed,
            TerminalStatus::Failed => JobStatus::Failed,
        }
    }
}

// ============================================================================
// PERSISTED RECORDS
// ============================================================================

/// Parameters for creating a new evaluation job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: String,
    pub version_id: String,
    pub kind: JobKind,
    pub queued_at: DateTime<Utc>,
}

impl NewJob {
    pub fn create(version_id: &str, kind: JobKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            version_id: version_id.to_string(),
            kind,
            queued_at: Utc::now(),
        }
    }
}

/// Raw persisted job row, worker-attached JSON fields untouched.
///
/// `status` is kept as stored text and only interpreted by the normalizer;
/// the JSON fields are re-validated on every read.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: String,
    pub version_id: String,
    pub kind: JobKind,
    pub status: String,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    // Grade fields
    pub overall_score: Option<f64>,
    pub category_scores: Option<Value>,
    pub action_items: Option<Value>,
    pub strengths: Option<Value>,
    pub risks: Option<Value>,
    pub notes: Option<Value>,
    // Simulation fields
    pub metrics: Option<Value>,
    pub timeline: Option<Value>,
    pub bottlenecks: Option<Value>,
}

impl JobRecord {
    /// Fresh pending record for a new submission.
    pub fn pending(new: &NewJob) -> Self {
        Self {
            id: new.id.clone(),
            version_id: new.version_id.clone(),
            kind: new.kind,
            status: JobStatus::Pending.as_str().to_string(),
            queued_at: new.queued_at,
            started_at: None,
            completed_at: None,
            failure_reason: None,
            overall_score: None,
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
}

/// Completion report posted by the worker (or written directly to the store).
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionReport {
    pub status: TerminalStatus,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub category_scores: Option<Value>,
    #[serde(default)]
    pub action_items: Option<Value>,
    #[serde(default)]
    pub strengths: Option<Value>,
    #[serde(default)]
    pub risks: Option<Value>,
    #[serde(default)]
    pub notes: Option<Value>,
    #[serde(default)]
    pub metrics: Option<Value>,
    #[serde(default)]
    pub timeline: Option<Value>,
    #[serde(default)]
    pub bottlenecks: Option<Value>,
    /// Wall-clock duration reported by the worker, for job events only.
    #[serde(default)]
    pub duration_ms: Option<i64>,
}

impl CompletionReport {
    pub fn completed() -> Self {
        Self {
            status: TerminalStatus::Completed,
            failure_reason: None,
            overall_score: None,
            category_scores: None,
            action_items: None,
            strengths: None,
            risks: None,
            notes: None,
            metrics: None,
            timeline: None,
            bottlenecks: None,
            duration_ms: None,
        }
    }

    pub fn failed(reason: &str) -> Self {
        Self {
            status: TerminalStatus::Failed,
            failure_reason: Some(reason.to_string()),
            ..Self::completed()
        }
    }
}

/// Outcome of an idempotent completion write.
#[derive(Debug, Clone)]
pub enum CompletionWrite {
    /// Transition applied; record now terminal.
    Applied(JobRecord),
    /// Job was already in the reported terminal state; retry is a no-op.
    AlreadyTerminal(JobRecord),
}

impl CompletionWrite {
    pub fn into_record(self) -> JobRecord {
        match self {
            CompletionWrite::Applied(r) | CompletionWrite::AlreadyTerminal(r) => r,
        }
    }
}

// ============================================================================
// OWNERSHIP CHAIN
// ============================================================================

/// Project row, created by the external onboarding collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectMeta {
    pub id: String,
    pub user_id: String,
    pub name: String,
}

/// Design version row. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct VersionMeta {
    pub id: String,
    pub project_id: String,
    pub label: String,
}

// ============================================================================
// NORMALIZED RESULTS
// ============================================================================

/// Single category score inside a grade report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    pub score: f64,
}

/// Closed priority enum for action items. Unknown values clamp to P2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
}

impl Priority {
    /// Clamp an arbitrary stored tag to the closed enum.
    pub fn clamp(raw: &str) -> Self {
        match raw.trim() {
            "P0" => Priority::P0,
            "P1" => Priority::P1,
            _ => Priority::P2,
        }
    }
}

/// Actionable feedback item in a grade report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub title: String,
    #[serde(default)]
    pub detail: Option<String>,
    pub priority: Priority,
}

/// Typed grade result. Every collection defaults to empty when the stored
/// JSON fails validation; the read itself never fails.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GradeResult {
    pub overall_score: Option<f64>,
    pub category_scores: Vec<CategoryScore>,
    pub action_items: Vec<ActionItem>,
    pub strengths: Vec<String>,
    pub risks: Vec<String>,
    pub notes: Vec<String>,
}

/// Aggregate latency/throughput figures from a simulation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationMetrics {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub throughput_rps: f64,
}

/// One sampled point on the simulated load timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub offset_secs: u64,
    pub rps: f64,
    pub error_rate: f64,
}

/// Typed simulation result with the same fallback rules as grades.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationResult {
    pub metrics: SimulationMetrics,
    pub timeline: Vec<TimelinePoint>,
    pub bottlenecks: Vec<String>,
}

/// Kind-specific result payload. Empty/default until the job completes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationResult {
    Grade(GradeResult),
    Simulation(SimulationResult),
}

/// Normalized job record returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRecord {
    pub id: String,
    pub version_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub result: EvaluationResult,
}

// ============================================================================
// SHARE TOKENS
// ============================================================================

/// Share token row. Created by the external report-generation collaborator;
/// this core only validates and resolves.
#[derive(Debug, Clone)]
pub struct ShareTokenRecord {
    pub token: String,
    pub project_id: String,
    pub report_id: String,
    pub created_at: DateTime<Utc>,
    pub revoked: bool,
}

/// Public snapshot of a shared grade report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSnapshot {
    pub project_name: String,
    pub version_label: String,
    pub status: JobStatus,
    pub queued_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub result: GradeResult,
}

// ============================================================================
// QUEUE PAYLOAD
// ============================================================================

/// Message placed on the evaluation queue. Broker key = `job_id`, so retried
/// submissions for the same job dedup to at most one live entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    pub job_id: String,
    pub version_id: String,
    pub kind: JobKind,
}

// ============================================================================
// TELEMETRY RECORDS
// ============================================================================

/// One sampled inbound HTTP request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestTrace {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub duration_ms: i64,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Value,
}

/// Audit entry for a mutating inbound call. Recorded regardless of sampling.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub user_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub status_code: u16,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Value,
}

/// Queue-side state for job events. `Queued` precedes the job's own
/// `pending` record becoming visible to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobEventState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobEventState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobEventState::Queued => "queued",
            JobEventState::Running => "running",
            JobEventState::Completed => "completed",
            JobEventState::Failed => "failed",
        }
    }
}

/// One job lifecycle transition.
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub queue_name: String,
    pub job_type: String,
    pub job_id: String,
    pub state: JobEventState,
    pub attempt: i32,
    pub duration_ms: Option<i64>,
    pub error_message: Option<String>,
}

impl JobEvent {
    pub fn transition(kind: JobKind, job_id: &str, state: JobEventState) -> Self {
        Self {
            queue_name: kind.queue_name().to_string(),
            job_type: kind.as_str().to_string(),
            job_id: job_id.to_string(),
            state,
            attempt: 1,
            duration_ms: None,
            error_message: None,
        }
    }

    pub fn with_error(mut self, message: &str) -> Self {
        self.error_message = Some(message.to_string());
        self
    }

    pub fn with_duration(mut self, duration_ms: Option<i64>) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ordering() {
        assert!(JobStatus::Pending.rank() < JobStatus::Running.rank());
        assert!(JobStatus::Running.rank() < JobStatus::Completed.rank());
        assert_eq!(JobStatus::Completed.rank(), JobStatus::Failed.rank());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("exploded"), None);
    }

    #[test]
    fn test_priority_clamp() {
        assert_eq!(Priority::clamp("P0"), Priority::P0);
        assert_eq!(Priority::clamp("P1"), Priority::P1);
        assert_eq!(Priority::clamp("P2"), Priority::P2);
        assert_eq!(Priority::clamp("P9"), Priority::P2);
        assert_eq!(Priority::clamp("urgent"), Priority::P2);
        assert_eq!(Priority::clamp(""), Priority::P2);
    }

    #[test]
    fn test_kind_serde() {
        let msg = JobMessage {
            job_id: "j1".to_string(),
            version_id: "v1".to_string(),
            kind: JobKind::Grade,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"kind\":\"grade\""));
        let back: JobMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, JobKind::Grade);
    }

    #[test]
    fn test_completion_report_defaults() {
        let report: CompletionReport =
            serde_json::from_str(r#"{"status":"completed","overall_score":72.5}"#).unwrap();
        assert_eq!(report.status, TerminalStatus::Completed);
        assert_eq!(report.overall_score, Some(72.5));
        assert!(report.category_scores.is_none());
        assert!(report.failure_reason.is_none());
    }
}
