//! Request-trace middleware.
//!
//! Records one trace per inbound request through the telemetry sink. The
//! sink is fire-and-forget, so tracing adds no latency and a telemetry
//! outage cannot fail a request.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use serde_json::json;

use super::ApiState;
use crate::auth;
use crate::types::RequestTrace;

pub(crate) fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub async fn trace_requests(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let user_id = auth::caller_id(request.headers());
    let ip_address = client_ip(request.headers());
    let agent = user_agent(request.headers());

    let response = next.run(request).await;

    state.telemetry.record_request(RequestTrace {
        request_id: uuid::Uuid::new_v4().to_string(),
        method,
        path,
        status_code: response.status().as_u16(),
        duration_ms: start.elapsed().as_millis() as i64,
        user_id,
        ip_address,
        user_agent: agent,
        metadata: json!({}),
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), Some("203.0.113.9".to_string()));
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }
}
