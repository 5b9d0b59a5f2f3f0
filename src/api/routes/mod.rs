//! API route handlers.
//!
//! - `jobs`: evaluation submission and owner-only retrieval
//! - `shared`: public share-token reads and PDF export
//! - `internal`: worker callback surface (shared-secret auth)

pub mod internal;
pub mod jobs;
pub mod shared;

use serde::Serialize;

use super::errors::ApiError;
use crate::error::EvalError;
use crate::types::{EvaluationRecord, JobKind};

/// Parse the `{kind}` path segment. An unknown kind is indistinguishable
/// from an unknown job.
pub(crate) fn parse_kind(raw: &str) -> Result<JobKind, ApiError> {
    JobKind::parse(raw).ok_or(ApiError(EvalError::NotFound("job")))
}

#[derive(Debug, Serialize)]
pub struct EvaluationResponse {
    pub success: bool,
    pub evaluation: EvaluationRecord,
}

impl EvaluationResponse {
    pub fn new(evaluation: EvaluationRecord) -> Self {
        Self {
            success: true,
            evaluation,
        }
    }
}
