//! Error taxonomy for the evaluation pipeline.
//!
//! Guard and orchestrator failures (`NotFound`, `Forbidden`) propagate to the
//! caller as typed errors. Queue and store errors at submission time are
//! absorbed into a persisted failed job and never re-thrown past `submit`.
//! Telemetry failures never reach this type at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    /// Resource (or share token) absent or malformed.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Resource exists but belongs to a different user.
    #[error("forbidden")]
    Forbidden,

    /// Broker unreachable at enqueue time. Absorbed into a failed terminal
    /// state by the orchestrator, never surfaced to the submitter.
    #[error("queue unavailable: {0}")]
    QueueUnavailable(String),

    /// Malformed inbound data (bad completion report, conflicting terminal
    /// state, invalid request body).
    #[error("validation failure: {0}")]
    Validation(String),

    /// PDF requested before the report reached a terminal state.
    #[error("report not ready")]
    NotReady,

    /// Missing or invalid caller/worker credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Persistence-layer failure outside the submission path.
    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, EvalError>;
