//! Data persistence layer.
//!
//! `EvaluationStore` covers the ownership chain, job lifecycle writes, and
//! share-token lookup; `TelemetryStore` covers the best-effort telemetry
//! tables. Both have a PostgreSQL implementation for production and an
//! in-memory implementation for tests and local development.

pub mod memory;
pub mod pg;

use async_trait::async_trait;

use crate::types::{
    AuditEntry, CompletionReport, CompletionWrite, JobEvent, JobKind, JobRecord, NewJob,
    ProjectMeta, RequestTrace, ShareTokenRecord, VersionMeta,
};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

impl From<tokio_postgres::Error> for StorageError {
    fn from(err: tokio_postgres::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for StorageError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Persistent store for the evaluation pipeline.
///
/// Job writes enforce the forward-only state machine: a terminal row is
/// never updated except by an idempotent retry of the same terminal state.
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    // ==================== Ownership Chain ====================

    async fn get_project(&self, project_id: &str) -> Result<Option<ProjectMeta>>;
    async fn get_version(&self, version_id: &str) -> Result<Option<VersionMeta>>;

    // ==================== Jobs ====================

    /// Insert a new pending job row.
    async fn create_job(&self, new: &NewJob) -> Result<JobRecord>;

    /// Fetch a raw job row.
    async fn get_job(&self, kind: JobKind, job_id: &str) -> Result<Option<JobRecord>>;

    /// pending -> failed shortcut used when the enqueue itself fails.
    /// Sets `failure_reason` and `completed_at`. If the job has already
    /// moved past pending the current row is returned unchanged.
    async fn mark_enqueue_failed(
        &self,
        kind: JobKind,
        job_id: &str,
        reason: &str,
    ) -> Result<JobRecord>;

    /// pending -> running. A repeat call while running is a no-op; a call
    /// against a terminal row fails with `InvalidTransition`.
    async fn mark_running(&self, kind: JobKind, job_id: &str) -> Result<JobRecord>;

    /// Apply a worker completion report. Idempotent per job id: a retry
    /// reporting the same terminal state returns `AlreadyTerminal`; a
    /// conflicting terminal state fails with `InvalidTransition`.
    async fn complete_job(
        &self,
        kind: JobKind,
        job_id: &str,
        report: &CompletionReport,
    ) -> Result<CompletionWrite>;

    // ==================== Share Tokens ====================

    async fn get_share_token(&self, token: &str) -> Result<Option<ShareTokenRecord>>;

    /// Used by the external report-generation collaborator (and tests).
    async fn insert_share_token(&self, record: &ShareTokenRecord) -> Result<()>;
}

/// Best-effort store for request traces, audit entries, and job events.
/// Callers go through the telemetry sink, never through this trait directly.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    async fn record_request(&self, trace: &RequestTrace) -> Result<()>;
    async fn record_audit(&self, entry: &AuditEntry) -> Result<()>;
    async fn record_job_event(&self, event: &JobEvent) -> Result<()>;
}
