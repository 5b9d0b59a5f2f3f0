//! Public share-token endpoints.
//!
//! No authentication: possession of a valid token is the authorization.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::api::errors::ApiError;
use crate::api::ApiState;
use crate::types::ReportSnapshot;

#[derive(Debug, Serialize)]
pub struct SharedReportResponse {
    pub success: bool,
    pub report: ReportSnapshot,
}

/// GET /api/v1/shared/{token}
pub async fn get_shared_report(
    State(state): State<Arc<ApiState>>,
    Path(token): Path<String>,
) -> Result<Json<SharedReportResponse>, ApiError> {
    let report = state.gateway.resolve(&token).await?;
    Ok(Json(SharedReportResponse {
        success: true,
        report,
    }))
}

/// GET /api/v1/shared/{token}/pdf
///
/// Binary export; requires the report to be terminal.
pub async fn get_shared_report_pdf(
    State(state): State<Arc<ApiState>>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let export = state.gateway.render_pdf(&token).await?;

    let disposition = format!("attachment; filename=\"{}\"", export.filename);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.bytes,
    )
        .into_response())
}
