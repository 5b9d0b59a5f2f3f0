//! Evaluation submission and retrieval endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::{parse_kind, EvaluationResponse};
use crate::api::errors::{status_for, ApiError};
use crate::api::middleware::{client_ip, user_agent};
use crate::api::ApiState;
use crate::auth;
use crate::types::{AuditEntry, JobKind};

#[derive(Debug, Deserialize)]
pub struct SubmitEvaluationRequest {
    pub version_id: String,
    pub kind: JobKind,
}

/// POST /api/v1/evaluations
///
/// Submits a design version for evaluation. Always answers with a valid
/// pending-or-failed record for the owner; a queue outage shows up as a
/// failed record, never as a 5xx.
pub async fn submit_evaluation(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<SubmitEvaluationRequest>,
) -> Result<(StatusCode, Json<EvaluationResponse>), ApiError> {
    let user = auth::require_caller(&headers)?;

    let result = state
        .orchestrator
        .submit(&user, &body.version_id, body.kind)
        .await;

    let status_code = match &result {
        Ok(_) => StatusCode::ACCEPTED,
        Err(e) => status_for(e),
    };
    state.telemetry.record_audit(AuditEntry {
        user_id: Some(user.clone()),
        action: "evaluation.submit".to_string(),
        resource_type: body.kind.as_str().to_string(),
        resource_id: result.as_ref().ok().map(|r| r.id.clone()),
        status_code: status_code.as_u16(),
        ip_address: client_ip(&headers),
        user_agent: user_agent(&headers),
        metadata: json!({ "version_id": body.version_id }),
    });

    let record = result?;
    Ok((StatusCode::ACCEPTED, Json(EvaluationResponse::new(record))))
}

/// GET /api/v1/evaluations/{kind}/{id}
///
/// Owner-only normalized view of a job.
pub async fn get_evaluation(
    State(state): State<Arc<ApiState>>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<EvaluationResponse>, ApiError> {
    let user = auth::require_caller(&headers)?;
    let kind = parse_kind(&kind)?;

    let record = state.orchestrator.get(&user, kind, &id).await?;
    Ok(Json(EvaluationResponse::new(record)))
}
