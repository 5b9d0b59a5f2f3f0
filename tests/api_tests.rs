//! HTTP-level tests for the REST API surface.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use design_challenge::api::{self, ApiState};
use design_challenge::config::ChallengeConfig;
use design_challenge::orchestrator::Orchestrator;
use design_challenge::queue::MemoryQueue;
use design_challenge::share::ShareGateway;
use design_challenge::storage::memory::MemoryStore;
use design_challenge::storage::EvaluationStore;
use design_challenge::telemetry::TelemetrySink;
use design_challenge::types::ShareTokenRecord;

const WORKER_TOKEN: &str = "worker-secret";

fn app() -> (Arc<MemoryStore>, Router) {
    let store = Arc::new(MemoryStore::new());
    store.insert_project("proj-u", "user-u", "checkout flow");
    store.insert_version("ver-v", "proj-u", "v3");

    let config = ChallengeConfig {
        worker_token: WORKER_TOKEN.to_string(),
        ..ChallengeConfig::default()
    };

    let queue = Arc::new(MemoryQueue::new());
    let telemetry = TelemetrySink::new(store.clone(), &config.telemetry);
    let orchestrator = Orchestrator::new(store.clone(), queue, telemetry.clone());
    let gateway = ShareGateway::new(store.clone(), config.export.clone());

    let state = Arc::new(ApiState {
        orchestrator,
        gateway,
        telemetry,
        config,
    });
    (store, api::router(state))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::empty()).unwrap()
}

async fn submit(router: &Router, user: &str) -> String {
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/evaluations",
            Some(user),
            json!({"version_id": "ver-v", "kind": "grade"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    body["evaluation"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn submission_requires_authentication() {
    let (_store, router) = app();
    let response = router
        .oneshot(post_json(
            "/api/v1/evaluations",
            None,
            json!({"version_id": "ver-v", "kind": "grade"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn submission_returns_pending_record() {
    let (_store, router) = app();
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/evaluations",
            Some("user-u"),
            json!({"version_id": "ver-v", "kind": "grade"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["evaluation"]["status"], json!("pending"));
    assert_eq!(body["evaluation"]["failure_reason"], json!(null));
}

#[tokio::test]
async fn foreign_version_is_forbidden_and_missing_is_not_found() {
    let (store, router) = app();
    store.insert_project("proj-other", "user-other", "their project");
    store.insert_version("ver-other", "proj-other", "v1");

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/evaluations",
            Some("user-u"),
            json!({"version_id": "ver-other", "kind": "grade"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .oneshot(post_json(
            "/api/v1/evaluations",
            Some("user-u"),
            json!({"version_id": "ver-404", "kind": "grade"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn owner_only_retrieval() {
    let (_store, router) = app();
    let id = submit(&router, "user-u").await;

    let response = router
        .clone()
        .oneshot(get(
            &format!("/api/v1/evaluations/grade/{}", id),
            Some("user-u"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(get(
            &format!("/api/v1/evaluations/grade/{}", id),
            Some("user-other"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Unknown kind segment behaves like an unknown job
    let response = router
        .oneshot(get(
            &format!("/api/v1/evaluations/audit/{}", id),
            Some("user-u"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn worker_callbacks_require_the_shared_secret() {
    let (_store, router) = app();
    let id = submit(&router, "user-u").await;

    let uri = format!("/api/v1/internal/evaluations/grade/{}/complete", id);
    let report = json!({"status": "completed", "overall_score": 80.0});

    let response = router
        .clone()
        .oneshot(post_json(&uri, None, report.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri(&uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-worker-token", WORKER_TOKEN)
        .body(Body::from(report.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["evaluation"]["status"], json!("completed"));
}

#[tokio::test]
async fn shared_report_surface() {
    let (store, router) = app();
    let id = submit(&router, "user-u").await;

    // Too-short token: rejected on format alone
    let response = router
        .clone()
        .oneshot(get("/api/v1/shared/ab", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let token = "integration_token_42";
    store
        .insert_share_token(&ShareTokenRecord {
            token: token.to_string(),
            project_id: "proj-u".to_string(),
            report_id: id.clone(),
            created_at: chrono::Utc::now(),
            revoked: false,
        })
        .await
        .unwrap();

    // PDF before terminal state
    let response = router
        .clone()
        .oneshot(get(&format!("/api/v1/shared/{}/pdf", token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Complete via the worker surface, then export
    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/internal/evaluations/grade/{}/complete", id))
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-worker-token", WORKER_TOKEN)
        .body(Body::from(
            json!({"status": "completed", "overall_score": 88.5}).to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(get(&format!("/api/v1/shared/{}", token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["report"]["status"], json!("completed"));
    assert_eq!(body["report"]["result"]["overall_score"], json!(88.5));

    let response = router
        .oneshot(get(&format!("/api/v1/shared/{}/pdf", token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"checkout_flow_v3_report.pdf\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.starts_with(b"%PDF-1.4"));
}
