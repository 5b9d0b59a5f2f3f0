//! Worker callback surface.
//!
//! The external worker pool reports lifecycle transitions here,
//! authenticated by the shared worker token. Completion is idempotent per
//! job id; a retry of an already-applied terminal state is a no-op.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::json;

use super::{parse_kind, EvaluationResponse};
use crate::api::errors::{status_for, ApiError};
use crate::api::middleware::{client_ip, user_agent};
use crate::api::ApiState;
use crate::auth;
use crate::types::{AuditEntry, CompletionReport};

/// POST /api/v1/internal/evaluations/{kind}/{id}/start
pub async fn start_evaluation(
    State(state): State<Arc<ApiState>>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<EvaluationResponse>, ApiError> {
    auth::require_worker(&headers, &state.config.worker_token)?;
    let kind = parse_kind(&kind)?;

    let result = state.orchestrator.start(kind, &id).await;

    let status_code = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => status_for(e),
    };
    state.telemetry.record_audit(AuditEntry {
        user_id: None,
        action: "evaluation.start".to_string(),
        resource_type: kind.as_str().to_string(),
        resource_id: Some(id.clone()),
        status_code: status_code.as_u16(),
        ip_address: client_ip(&headers),
        user_agent: user_agent(&headers),
        metadata: json!({}),
    });

    let record = result?;
    Ok(Json(EvaluationResponse::new(record)))
}

/// POST /api/v1/internal/evaluations/{kind}/{id}/complete
pub async fn complete_evaluation(
    State(state): State<Arc<ApiState>>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(report): Json<CompletionReport>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    auth::require_worker(&headers, &state.config.worker_token)?;
    let kind = parse_kind(&kind)?;

    let result = state.orchestrator.ingest_completion(kind, &id, &report).await;

    let status_code = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => status_for(e),
    };
    state.telemetry.record_audit(AuditEntry {
        user_id: None,
        action: "evaluation.complete".to_string(),
        resource_type: kind.as_str().to_string(),
        resource_id: Some(id.clone()),
        status_code: status_code.as_u16(),
        ip_address: client_ip(&headers),
        user_agent: user_agent(&headers),
        metadata: json!({ "reported_status": report.status }),
    });

    let record = result?;
    Ok(Json(EvaluationResponse::new(record)))
}
