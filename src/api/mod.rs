//! REST API implementation.

pub mod errors;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::ChallengeConfig;
use crate::orchestrator::Orchestrator;
use crate::share::ShareGateway;
use crate::telemetry::TelemetrySink;

/// Maximum accepted request body size (completion reports included).
const MAX_BODY_BYTES: usize = 262_144;

/// Shared state used across all API endpoints.
pub struct ApiState {
    pub orchestrator: Orchestrator,
    pub gateway: ShareGateway,
    pub telemetry: TelemetrySink,
    pub config: ChallengeConfig,
}

/// Assemble the application router.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/evaluations", post(routes::jobs::submit_evaluation))
        .route(
            "/api/v1/evaluations/:kind/:id",
            get(routes::jobs::get_evaluation),
        )
        .route("/api/v1/shared/:token", get(routes::shared::get_shared_report))
        .route(
            "/api/v1/shared/:token/pdf",
            get(routes::shared::get_shared_report_pdf),
        )
        .route(
            "/api/v1/internal/evaluations/:kind/:id/start",
            post(routes::internal::start_evaluation),
        )
        .route(
            "/api/v1/internal/evaluations/:kind/:id/complete",
            post(routes::internal::complete_evaluation),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::trace_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
