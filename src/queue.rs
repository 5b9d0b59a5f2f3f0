//! Evaluation Job Queue Client
//!
//! Decouples request handling from worker execution. Work is keyed by the
//! job's own id, so a retried submission dedups to at most one live entry
//! per job. The client is constructed explicitly at startup and injected
//! into the orchestrator; the only failure mode the orchestrator handles is
//! the broker being unavailable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use deadpool_postgres::Pool;
use parking_lot::Mutex;
use tracing::debug;

use crate::types::JobMessage;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Broker unreachable or timed out at enqueue time.
    #[error("queue unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit work keyed by `msg.job_id`. Enqueueing an id that is already
    /// queued is a no-op.
    async fn enqueue(&self, msg: &JobMessage) -> Result<(), QueueError>;
}

// ============================================================================
// POSTGRES-BACKED QUEUE
// ============================================================================

/// Durable queue over the `eval_queue` table. The external worker pool
/// consumes and deletes entries; this client only produces them.
pub struct PgQueue {
    pool: Pool,
}

impl PgQueue {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PgQueue {
    async fn enqueue(&self, msg: &JobMessage) -> Result<(), QueueError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;

        let payload =
            serde_json::to_value(msg).map_err(|e| QueueError::Unavailable(e.to_string()))?;

        client
            .execute(
                "INSERT INTO eval_queue (job_id, queue_name, payload)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (job_id) DO NOTHING",
                &[&msg.job_id, &msg.kind.queue_name(), &payload],
            )
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;

        debug!("Enqueued {} job {}", msg.kind, msg.job_id);
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY QUEUE
// ============================================================================

/// In-memory queue for tests and local development, with a switch to
/// simulate a broker outage.
#[derive(Default)]
pub struct MemoryQueue {
    entries: Mutex<HashMap<String, JobMessage>>,
    unavailable: AtomicBool,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the broker going down (or coming back).
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, job_id: &str) -> Option<JobMessage> {
        self.entries.lock().get(job_id).cloned()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, msg: &JobMessage) -> Result<(), QueueError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("broker unreachable".to_string()));
        }
        self.entries
            .lock()
            .entry(msg.job_id.clone())
            .or_insert_with(|| msg.clone());
        Ok(())
    }
}
