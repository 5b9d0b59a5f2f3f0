//! PostgreSQL Storage for the Design Challenge Server
//!
//! Persistent storage for evaluation jobs, the ownership chain, share
//! tokens, and telemetry. Ownership rows (projects, design versions) are
//! written by the external onboarding collaborator; this store only reads
//! them. Job rows are written exclusively through the state-machine methods
//! below.

use async_trait::async_trait;
use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;
use tracing::{debug, info};

use super::{EvaluationStore, Result, StorageError, TelemetryStore};
use crate::types::{
    AuditEntry, CompletionReport, CompletionWrite, JobEvent, JobKind, JobRecord, JobStatus,
    NewJob, ProjectMeta, RequestTrace, ShareTokenRecord, VersionMeta,
};

const SCHEMA: &str = r#"
-- Ownership chain (rows created by the onboarding service; read-only here)
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_projects_user ON projects(user_id);

CREATE TABLE IF NOT EXISTS design_versions (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    label TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_versions_project ON design_versions(project_id);

-- Grade reports (one row per grading submission)
CREATE TABLE IF NOT EXISTS grade_reports (
    id TEXT PRIMARY KEY,
    version_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    queued_at TIMESTAMPTZ NOT NULL,
    started_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    failure_reason TEXT,
    overall_score DOUBLE PRECISION,
    category_scores JSONB,
    action_items JSONB,
    strengths JSONB,
    risks JSONB,
    notes JSONB,
    metrics JSONB,
    timeline JSONB,
    bottlenecks JSONB
);

CREATE INDEX IF NOT EXISTS idx_grade_reports_version ON grade_reports(version_id);
CREATE INDEX IF NOT EXISTS idx_grade_reports_status ON grade_reports(status);

-- Simulation runs (same shape, separate table)
CREATE TABLE IF NOT EXISTS simulation_runs (
    id TEXT PRIMARY KEY,
    version_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    queued_at TIMESTAMPTZ NOT NULL,
    started_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    failure_reason TEXT,
    overall_score DOUBLE PRECISION,
    category_scores JSONB,
    action_items JSONB,
    strengths JSONB,
    risks JSONB,
    notes JSONB,
    metrics JSONB,
    timeline JSONB,
    bottlenecks JSONB
);

CREATE INDEX IF NOT EXISTS idx_simulation_runs_version ON simulation_runs(version_id);
CREATE INDEX IF NOT EXISTS idx_simulation_runs_status ON simulation_runs(status);

-- Durable work queue; broker key = job_id (at most one live entry per job)
CREATE TABLE IF NOT EXISTS eval_queue (
    job_id TEXT PRIMARY KEY,
    queue_name TEXT NOT NULL,
    payload JSONB NOT NULL,
    enqueued_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_eval_queue_name ON eval_queue(queue_name);

-- Share tokens (created by the report-generation service; resolved here)
CREATE TABLE IF NOT EXISTS share_tokens (
    token TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    report_id TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    revoked BOOLEAN NOT NULL DEFAULT FALSE
);

-- Telemetry (best-effort, written via the sink only)
CREATE TABLE IF NOT EXISTS request_traces (
    request_id TEXT PRIMARY KEY,
    method TEXT NOT NULL,
    path TEXT NOT NULL,
    status_code INTEGER NOT NULL,
    duration_ms BIGINT NOT NULL,
    user_id TEXT,
    ip_address TEXT,
    user_agent TEXT,
    metadata JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS audit_entries (
    id BIGSERIAL PRIMARY KEY,
    user_id TEXT,
    action TEXT NOT NULL,
    resource_type TEXT NOT NULL,
    resource_id TEXT,
    status_code INTEGER NOT NULL,
    ip_address TEXT,
    user_agent TEXT,
    metadata JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_audit_action ON audit_entries(action);

CREATE TABLE IF NOT EXISTS job_events (
    id BIGSERIAL PRIMARY KEY,
    queue_name TEXT NOT NULL,
    job_type TEXT NOT NULL,
    job_id TEXT NOT NULL,
    state TEXT NOT NULL,
    attempt INTEGER NOT NULL,
    duration_ms BIGINT,
    error_message TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_job_events_job ON job_events(job_id);
"#;

const JOB_COLUMNS: &str = "id, version_id, status, queued_at, started_at, completed_at, \
     failure_reason, overall_score, category_scores, action_items, strengths, risks, notes, \
     metrics, timeline, bottlenecks";

fn table(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Grade => "grade_reports",
        JobKind::Simulate => "simulation_runs",
    }
}

fn job_from_row(kind: JobKind, row: &tokio_postgres::Row) -> JobRecord {
    JobRecord {
        id: row.get(0),
        version_id: row.get(1),
        kind,
        status: row.get(2),
        queued_at: row.get(3),
        started_at: row.get(4),
        completed_at: row.get(5),
        failure_reason: row.get(6),
        overall_score: row.get(7),
        category_scores: row.get(8),
        action_items: row.get(9),
        strengths: row.get(10),
        risks: row.get(11),
        notes: row.get(12),
        metrics: row.get(13),
        timeline: row.get(14),
        bottlenecks: row.get(15),
    }
}

#[derive(Clone)]
pub struct PgStorage {
    pool: Pool,
}

impl PgStorage {
    /// Create storage from a connection URL and initialize the schema.
    pub async fn new(database_url: &str) -> Result<Self> {
        let mut config = Config::new();
        config.url = Some(database_url.to_string());
        let pool = config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let client = pool.get().await?;
        info!("Connected to PostgreSQL database");

        client.batch_execute(SCHEMA).await?;
        info!("Database schema initialized");

        Ok(Self { pool })
    }

    /// Shared connection pool, used to construct the queue client.
    pub fn pool(&self) -> Pool {
        self.pool.clone()
    }

    async fn fetch_job(&self, kind: JobKind, job_id: &str) -> Result<Option<JobRecord>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM {} WHERE id = $1", JOB_COLUMNS, table(kind)),
                &[&job_id],
            )
            .await?;
        Ok(row.map(|r| job_from_row(kind, &r)))
    }
}

#[async_trait]
impl EvaluationStore for PgStorage {
    async fn get_project(&self, project_id: &str) -> Result<Option<ProjectMeta>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, user_id, name FROM projects WHERE id = $1",
                &[&project_id],
            )
            .await?;
        Ok(row.map(|r| ProjectMeta {
            id: r.get(0),
            user_id: r.get(1),
            name: r.get(2),
        }))
    }

    async fn get_version(&self, version_id: &str) -> Result<Option<VersionMeta>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, project_id, label FROM design_versions WHERE id = $1",
                &[&version_id],
            )
            .await?;
        Ok(row.map(|r| VersionMeta {
            id: r.get(0),
            project_id: r.get(1),
            label: r.get(2),
        }))
    }

    async fn create_job(&self, new: &NewJob) -> Result<JobRecord> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO {} (id, version_id, status, queued_at)
                     VALUES ($1, $2, 'pending', $3)
                     RETURNING {}",
                    table(new.kind),
                    JOB_COLUMNS
                ),
                &[&new.id, &new.version_id, &new.queued_at],
            )
            .await?;

        debug!("Created {} job {}", new.kind, new.id);
        Ok(job_from_row(new.kind, &row))
    }

    async fn get_job(&self, kind: JobKind, job_id: &str) -> Result<Option<JobRecord>> {
        self.fetch_job(kind, job_id).await
    }

    async fn mark_enqueue_failed(
        &self,
        kind: JobKind,
        job_id: &str,
        reason: &str,
    ) -> Result<JobRecord> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE {} SET status = 'failed', failure_reason = $2, completed_at = NOW()
                     WHERE id = $1 AND status = 'pending'
                     RETURNING {}",
                    table(kind),
                    JOB_COLUMNS
                ),
                &[&job_id, &reason],
            )
            .await?;

        match row {
            Some(r) => Ok(job_from_row(kind, &r)),
            // Raced past pending; return whatever the row is now.
            None => self
                .fetch_job(kind, job_id)
                .await?
                .ok_or_else(|| StorageError::NotFound(format!("{} job {}", kind, job_id))),
        }
    }

    async fn mark_running(&self, kind: JobKind, job_id: &str) -> Result<JobRecord> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE {} SET status = 'running', started_at = NOW()
                     WHERE id = $1 AND status = 'pending'
                     RETURNING {}",
                    table(kind),
                    JOB_COLUMNS
                ),
                &[&job_id],
            )
            .await?;

        if let Some(r) = row {
            return Ok(job_from_row(kind, &r));
        }

        let current = self
            .fetch_job(kind, job_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("{} job {}", kind, job_id)))?;

        if current.status == JobStatus::Running.as_str() {
            return Ok(current);
        }
        Err(StorageError::InvalidTransition {
            from: current.status,
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
        let client = self.pool.get().await?;

        let params: [&(dyn ToSql + Sync); 12] = [
            &job_id,
            &target.as_str(),
            &report.failure_reason,
            &report.overall_score,
            &report.category_scores,
            &report.action_items,
            &report.strengths,
            &report.risks,
            &report.notes,
            &report.metrics,
            &report.timeline,
            &report.bottlenecks,
        ];

        let row = client
            .query_opt(
                &format!(
                    "UPDATE {} SET
                        status = $2,
                        started_at = COALESCE(started_at, NOW()),
                        completed_at = NOW(),
                        failure_reason = $3,
                        overall_score = $4,
                        category_scores = $5,
                        action_items = $6,
                        strengths = $7,
                        risks = $8,
                        notes = $9,
                        metrics = $10,
                        timeline = $11,
                        bottlenecks = $12
                     WHERE id = $1 AND status IN ('pending', 'running')
                     RETURNING {}",
                    table(kind),
                    JOB_COLUMNS
                ),
                &params,
            )
            .await?;

        if let Some(r) = row {
            debug!("Job {} reached terminal state {}", job_id, target.as_str());
            return Ok(CompletionWrite::Applied(job_from_row(kind, &r)));
        }

        let current = self
            .fetch_job(kind, job_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("{} job {}", kind, job_id)))?;

        if current.status == target.as_str() {
            return Ok(CompletionWrite::AlreadyTerminal(current));
        }
        Err(StorageError::InvalidTransition {
            from: current.status,
            to: target.as_str().to_string(),
        })
    }

    async fn get_share_token(&self, token: &str) -> Result<Option<ShareTokenRecord>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT token, project_id, report_id, created_at, revoked
                 FROM share_tokens WHERE token = $1",
                &[&token],
            )
            .await?;
        Ok(row.map(|r| ShareTokenRecord {
            token: r.get(0),
            project_id: r.get(1),
            report_id: r.get(2),
            created_at: r.get(3),
            revoked: r.get(4),
        }))
    }

    async fn insert_share_token(&self, record: &ShareTokenRecord) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO share_tokens (token, project_id, report_id, created_at, revoked)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (token) DO NOTHING",
                &[
                    &record.token,
                    &record.project_id,
                    &record.report_id,
                    &record.created_at,
                    &record.revoked,
                ],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TelemetryStore for PgStorage {
    async fn record_request(&self, trace: &RequestTrace) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO request_traces
                    (request_id, method, path, status_code, duration_ms, user_id, ip_address, user_agent, metadata)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 ON CONFLICT (request_id) DO NOTHING",
                &[
                    &trace.request_id,
                    &trace.method,
                    &trace.path,
                    &(trace.status_code as i32),
                    &trace.duration_ms,
                    &trace.user_id,
                    &trace.ip_address,
                    &trace.user_agent,
                    &trace.metadata,
                ],
            )
            .await?;
        Ok(())
    }

    async fn record_audit(&self, entry: &AuditEntry) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO audit_entries
                    (user_id, action, resource_type, resource_id, status_code, ip_address, user_agent, metadata)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                &[
                    &entry.user_id,
                    &entry.action,
                    &entry.resource_type,
                    &entry.resource_id,
                    &(entry.status_code as i32),
                    &entry.ip_address,
                    &entry.user_agent,
                    &entry.metadata,
                ],
            )
            .await?;
        Ok(())
    }

    async fn record_job_event(&self, event: &JobEvent) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO job_events
                    (queue_name, job_type, job_id, state, attempt, duration_ms, error_message)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
                &[
                    &event.queue_name,
                    &event.job_type,
                    &event.job_id,
                    &event.state.as_str(),
                    &event.attempt,
                    &event.duration_ms,
                    &event.error_message,
                ],
            )
            .await?;
        Ok(())
    }
}
