//! API error mapping.
//!
//! Typed pipeline errors map onto HTTP statuses; internal queue/storage
//! details never leak into a response body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::EvalError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

/// HTTP status for a pipeline error. Also used when auditing a failed call.
pub fn status_for(err: &EvalError) -> StatusCode {
    match err {
        EvalError::NotFound(_) => StatusCode::NOT_FOUND,
        EvalError::Forbidden => StatusCode::FORBIDDEN,
        EvalError::Validation(_) => StatusCode::BAD_REQUEST,
        EvalError::NotReady => StatusCode::CONFLICT,
        EvalError::Unauthorized => StatusCode::UNAUTHORIZED,
        EvalError::QueueUnavailable(_) | EvalError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Debug)]
pub struct ApiError(pub EvalError);

impl From<EvalError> for ApiError {
    fn from(err: EvalError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = match &self.0 {
            // Internal details stay in the logs
            EvalError::QueueUnavailable(_) | EvalError::Storage(_) => {
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (
            status,
            Json(ErrorBody {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&EvalError::NotFound("job")), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&EvalError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&EvalError::NotReady), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&EvalError::Unauthorized),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&EvalError::QueueUnavailable("down".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
