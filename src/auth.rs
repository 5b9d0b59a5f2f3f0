//! Authentication Helpers
//!
//! Credential issuance and sessions live in the upstream auth proxy; by the
//! time a request reaches this service the caller identity is a trusted
//! `X-User-Id` header. Worker callbacks authenticate with a shared secret
//! compared in constant time.

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

use crate::error::EvalError;

/// Header carrying the authenticated caller id, set by the auth proxy.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the worker pool's shared secret on internal callbacks.
pub const WORKER_TOKEN_HEADER: &str = "x-worker-token";

/// Extract the caller id, if the request is authenticated.
pub fn caller_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Extract the caller id or fail `Unauthorized`.
pub fn require_caller(headers: &HeaderMap) -> Result<String, EvalError> {
    caller_id(headers).ok_or(EvalError::Unauthorized)
}

/// Constant-time equality via digest comparison; the inputs' lengths are
/// not observable either.
fn digest_eq(a: &str, b: &str) -> bool {
    Sha256::digest(a.as_bytes()) == Sha256::digest(b.as_bytes())
}

/// Verify the worker shared secret on an internal callback. An empty
/// configured token disables the internal surface entirely.
pub fn require_worker(headers: &HeaderMap, expected: &str) -> Result<(), EvalError> {
    if expected.is_empty() {
        return Err(EvalError::Unauthorized);
    }
    let presented = headers
        .get(WORKER_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if digest_eq(presented, expected) {
        Ok(())
    } else {
        Err(EvalError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn test_caller_id_extraction() {
        assert_eq!(
            caller_id(&headers(&[(USER_ID_HEADER, "user-1")])),
            Some("user-1".to_string())
        );
        assert_eq!(caller_id(&headers(&[(USER_ID_HEADER, "  ")])), None);
        assert_eq!(caller_id(&headers(&[])), None);
        assert!(matches!(
            require_caller(&headers(&[])),
            Err(EvalError::Unauthorized)
        ));
    }

    #[test]
    fn test_worker_token_check() {
        let good = headers(&[(WORKER_TOKEN_HEADER, "secret-1")]);
        assert!(require_worker(&good, "secret-1").is_ok());

        let bad = headers(&[(WORKER_TOKEN_HEADER, "wrong")]);
        assert!(matches!(
            require_worker(&bad, "secret-1"),
            Err(EvalError::Unauthorized)
        ));

        assert!(matches!(
            require_worker(&headers(&[]), "secret-1"),
            Err(EvalError::Unauthorized)
        ));

        // Empty configured token disables the internal surface
        assert!(matches!(
            require_worker(&good, ""),
            Err(EvalError::Unauthorized)
        ));
    }
}
