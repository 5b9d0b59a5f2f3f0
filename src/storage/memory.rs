//! In-memory storage.
//!
//! Backs tests and the `--memory` development mode with the same
//! state-machine semantics as the PostgreSQL store. Telemetry writes are
//! kept in plain vectors so tests can assert on what was recorded, and can
//! be switched to fail for exercising the sink's containment behavior.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::{EvaluationStore, Result, StorageError, TelemetryStore};
use crate::types::{
    AuditEntry, CompletionReport, CompletionWrite, JobEvent, JobKind, JobRecord, JobStatus,
    NewJob, ProjectMeta, RequestTrace, ShareTokenRecord, VersionMeta,
};

#[derive(Default)]
struct Inner {
    projects: HashMap<String, ProjectMeta>,
    versions: HashMap<String, VersionMeta>,
    jobs: HashMap<(JobKind, String), JobRecord>,
    share_tokens: HashMap<String, ShareTokenRecord>,
    requests: Vec<RequestTrace>,
    audits: Vec<AuditEntry>,
    job_events: Vec<JobEvent>,
    fail_telemetry: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Seeding ====================

    pub fn insert_project(&self, id: &str, user_id: &str, name: &str) {
        self.inner.write().projects.insert(
            id.to_string(),
            ProjectMeta {
                id: id.to_string(),
                user_id: user_id.to_string(),
                name: name.to_string(),
            },
        );
    }

    pub fn insert_version(&self, id: &str, project_id: &str, label: &str) {
        self.inner.write().versions.insert(
            id.to_string(),
            VersionMeta {
                id: id.to_string(),
                project_id: project_id.to_string(),
                label: label.to_string(),
            },
        );
    }

    // ==================== Test Introspection ====================

    pub fn job_count(&self) -> usize {
        self.inner.read().jobs.len()
    }

    pub fn request_count(&self) -> usize {
        self.inner.read().requests.len()
    }

    pub fn audit_count(&self) -> usize {
        self.inner.read().audits.len()
    }

    pub fn job_event_count(&self) -> usize {
        self.inner.read().job_events.len()
    }

    pub fn job_events(&self) -> Vec<JobEvent> {
        self.inner.read().job_events.clone()
    }

    pub fn audits(&self) -> Vec<AuditEntry> {
        self.inner.read().audits.clone()
    }

    /// Make telemetry writes fail, to exercise sink containment.
    pub fn set_fail_telemetry(&self, fail: bool) {
        self.inner.write().fail_telemetry = fail;
    }
}

#[async_trait]
impl EvaluationStore for MemoryStore {
    async fn get_project(&self, project_id: &str) -> Result<Option<ProjectMeta>> {
        Ok(self.inner.read().projects.get(project_id).cloned())
    }

    async fn get_version(&self, version_id: &str) -> Result<Option<VersionMeta>> {
        Ok(self.inner.read().versions.get(version_id).cloned())
    }

    async fn create_job(&self, new: &NewJob) -> Result<JobRecord> {
        let record = JobRecord::pending(new);
        self.inner
            .write()
            .jobs
            .insert((new.kind, new.id.clone()), record.clone());
        Ok(record)
    }

    async fn get_job(&self, kind: JobKind, job_id: &str) -> Result<Option<JobRecord>> {
        Ok(self
            .inner
            .read()
            .jobs
            .get(&(kind, job_id.to_string()))
            .cloned())
    }

    async fn mark_enqueue_failed(
        &self,
        kind: JobKind,
        job_id: &str,
        reason: &str,
    ) -> Result<JobRecord> {
        let mut inner = self.inner.write();
        let record = inner
            .jobs
            .get_mut(&(kind, job_id.to_string()))
            .ok_or_else(|| StorageError::NotFound(format!("{} job {}", kind, job_id)))?;

        if record.status == JobStatus::Pending.as_str() {
            record.status = JobStatus::Failed.as_str().to_string();
            record.failure_reason = Some(reason.to_string());
            record.completed_at = Some(Utc::now());
        }
        Ok(record.clone())
    }

    async fn mark_running(&self, kind: JobKind, job_id: &str) -> Result<JobRecord> {
        let mut inner = self.inner.write();
        let record = inner
            .jobs
            .get_mut(&(kind, job_id.to_string()))
            .ok_or_else(|| StorageError::NotFound(format!("{} job {}", kind, job_id)))?;

        if record.status == JobStatus::Pending.as_str() {
            record.status = JobStatus::Running.as_str().to_string();
            record.started_at = Some(Utc::now());
            return Ok(record.clone());
        }
        if record.status == JobStatus::Running.as_str() {
            return Ok(record.clone());
        }
        Err(StorageError::InvalidTransition {
            from: record.status.clone(),
            to: JobStatus::Running.as_str().to_string(),
        })
    }

    async fn complete_job(
        &self,
        kind: JobKind,
        job_id: &str,
        report: &CompletionReport,
    ) -> Result<CompletionWrite> {
        let target: JobStatus = report.status.into();
        let mut inner = self.inner.write();
        let record = inner
            .jobs
            .get_mut(&(kind, job_id.to_string()))
            .ok_or_else(|| StorageError::NotFound(format!("{} job {}", kind, job_id)))?;

        let current = record.status.clone();
        if current == JobStatus::Pending.as_str() || current == JobStatus::Running.as_str() {
            let now = Utc::now();
            record.status = target.as_str().to_string();
            record.started_at = record.started_at.or(Some(now));
            record.completed_at = Some(now);
            record.failure_reason = report.failure_reason.clone();
            record.overall_score = report.overall_score;
            record.category_scores = report.category_scores.clone();
            record.action_items = report.action_items.clone();
            record.strengths = report.strengths.clone();
            record.risks = report.risks.clone();
            record.notes = report.notes.clone();
            record.metrics = report.metrics.clone();
            record.timeline = report.timeline.clone();
            record.bottlenecks = report.bottlenecks.clone();
            return Ok(CompletionWrite::Applied(record.clone()));
        }

        if current == target.as_str() {
            return Ok(CompletionWrite::AlreadyTerminal(record.clone()));
        }
        Err(StorageError::InvalidTransition {
            from: current,
            to: target.as_str().to_string(),
        })
    }

    async fn get_share_token(&self, token: &str) -> Result<Option<ShareTokenRecord>> {
        Ok(self.inner.read().share_tokens.get(token).cloned())
    }

    async fn insert_share_token(&self, record: &ShareTokenRecord) -> Result<()> {
        self.inner
            .write()
            .share_tokens
            .entry(record.token.clone())
            .or_insert_with(|| record.clone());
        Ok(())
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn record_request(&self, trace: &RequestTrace) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.fail_telemetry {
            return Err(StorageError::Database("telemetry store down".to_string()));
        }
        inner.requests.push(trace.clone());
        Ok(())
    }

    async fn record_audit(&self, entry: &AuditEntry) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.fail_telemetry {
            return Err(StorageError::Database("telemetry store down".to_string()));
        }
        inner.audits.push(entry.clone());
        Ok(())
    }

    async fn record_job_event(&self, event: &JobEvent) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.fail_telemetry {
            return Err(StorageError::Database("telemetry store down".to_string()));
        }
        inner.job_events.push(event.clone());
        Ok(())
    }
}
