//! Evaluation Orchestrator
//!
//! Drives the job state machine: submission -> enqueue -> (external worker)
//! -> ingestion -> terminal state. The ownership guard runs before any row
//! is created. An enqueue failure degrades into a visible failed job on the
//! same record rather than a lost submission; the submitter always receives
//! a valid pending-or-terminal record.

use std::sync::Arc;

use tracing::warn;

use crate::error::EvalError;
use crate::guard;
use crate::normalize::normalize_record;
use crate::queue::{JobQueue, QueueError};
use crate::storage::{EvaluationStore, StorageError};
use crate::telemetry::TelemetrySink;
use crate::types::{
    CompletionReport, CompletionWrite, EvaluationRecord, JobEvent, JobEventState, JobKind,
    JobMessage, NewJob, TerminalStatus,
};

/// Fixed, non-leaking failure reason persisted when the broker rejects an
/// enqueue. Broker error details go to the log, never to the caller.
pub const ENQUEUE_FAILURE_REASON: &str = "failed to enqueue job";

pub struct Orchestrator {
    store: Arc<dyn EvaluationStore>,
    queue: Arc<dyn JobQueue>,
    telemetry: TelemetrySink,
}

fn storage_err(e: StorageError) -> EvalError {
    EvalError::Storage(e.to_string())
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn EvaluationStore>,
        queue: Arc<dyn JobQueue>,
        telemetry: TelemetrySink,
    ) -> Self {
        Self {
            store,
            queue,
            telemetry,
        }
    }

    /// Submit a version for evaluation.
    ///
    /// Ownership is checked before the job row exists; a guard failure
    /// creates nothing. On enqueue failure the same record transitions
    /// straight to failed and is returned, never an error.
    pub async fn submit(
        &self,
        user_id: &str,
        version_id: &str,
        kind: JobKind,
    ) -> Result<EvaluationRecord, EvalError> {
        guard::check_version_access(self.store.as_ref(), user_id, version_id).await?;

        let new = NewJob::create(version_id, kind);
        let job = self.store.create_job(&new).await.map_err(storage_err)?;

        let message = JobMessage {
            job_id: new.id.clone(),
            version_id: version_id.to_string(),
            kind,
        };

        match self.queue.enqueue(&message).await {
            Ok(()) => {
                self.telemetry.record_job_event(JobEvent::transition(
                    kind,
                    &new.id,
                    JobEventState::Queued,
                ));
                Ok(normalize_record(job))
            }
            Err(QueueError::Unavailable(e)) => {
                warn!("Enqueue failed for {} job {}: {}", kind, new.id, e);
                let failed = self
                    .store
                    .mark_enqueue_failed(kind, &new.id, ENQUEUE_FAILURE_REASON)
                    .await
                    .map_err(storage_err)?;
                self.telemetry.record_job_event(
                    JobEvent::transition(kind, &new.id, JobEventState::Failed)
                        .with_error(ENQUEUE_FAILURE_REASON),
                );
                Ok(normalize_record(failed))
            }
        }
    }

    /// Fetch a job for its owner, normalized.
    pub async fn get(
        &self,
        user_id: &str,
        kind: JobKind,
        job_id: &str,
    ) -> Result<EvaluationRecord, EvalError> {
        let job = guard::check_job_access(self.store.as_ref(), user_id, kind, job_id).await?;
        Ok(normalize_record(job))
    }

    /// Worker-side: mark a job running. Repeat calls while running are
    /// no-ops; calls against a terminal job are rejected.
    pub async fn start(&self, kind: JobKind, job_id: &str) -> Result<EvaluationRecord, EvalError> {
        let record = self
            .store
            .mark_running(kind, job_id)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => EvalError::NotFound("job"),
                StorageError::InvalidTransition { from, to } => EvalError::Validation(format!(
                    "cannot transition job {} from {} to {}",
                    job_id, from, to
                )),
                other => storage_err(other),
            })?;

        self.telemetry.record_job_event(JobEvent::transition(
            kind,
            job_id,
            JobEventState::Running,
        ));
        Ok(normalize_record(record))
    }

    /// Worker-side: ingest a completion report. Idempotent per job id: a
    /// retry of the same terminal state is a no-op; a conflicting terminal
    /// state is rejected without touching the row.
    pub async fn ingest_completion(
        &self,
        kind: JobKind,
        job_id: &str,
        report: &CompletionReport,
    ) -> Result<EvaluationRecord, EvalError> {
        let write = self
            .store
            .complete_job(kind, job_id, report)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => EvalError::NotFound("job"),
                StorageError::InvalidTransition { from, to } => EvalError::Validation(format!(
                    "job {} is already {}, cannot report {}",
                    job_id, from, to
                )),
                other => storage_err(other),
            })?;

        if let CompletionWrite::Applied(_) = &write {
            let state = match report.status {
                TerminalStatus::Completed => JobEventState::Completed,
                TerminalStatus::Failed => JobEventState::Failed,
            };
            let mut event = JobEvent::transition(kind, job_id, state)
                .with_duration(report.duration_ms);
            if let Some(reason) = &report.failure_reason {
                event = event.with_error(reason);
            }
            self.telemetry.record_job_event(event);
        }

        Ok(normalize_record(write.into_record()))
    }
}
