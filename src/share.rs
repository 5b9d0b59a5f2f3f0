//! Share/Export Gateway
//!
//! Resolves opaque share tokens into public report snapshots and renders
//! PDF exports. Token possession is the authorization: resolution bypasses
//! the ownership guard by design. A malformed token is rejected before any
//! store lookup and is indistinguishable from an unknown one to the caller.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

use crate::config::ExportConfig;
use crate::error::EvalError;
use crate::guard;
use crate::normalize;
use crate::pdf;
use crate::storage::EvaluationStore;
use crate::types::{JobKind, ReportSnapshot};

pub const TOKEN_MIN_LEN: usize = 16;
pub const TOKEN_MAX_LEN: usize = 128;

/// Format precondition for share tokens: 16-128 chars of `[A-Za-z0-9_-]`.
pub fn is_valid_token(token: &str) -> bool {
    (TOKEN_MIN_LEN..=TOKEN_MAX_LEN).contains(&token.len())
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Generate a fresh share token. Used by the report-generation collaborator
/// and by tests; this core itself never mints tokens.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Sanitize an attachment filename: control characters and quotes are
/// stripped, every other character outside `[A-Za-z0-9._-]` becomes a
/// single underscore per run, the result is trimmed and truncated, and a
/// `.pdf` suffix is forced. Falls back to `fallback` when nothing survives.
pub fn sanitize_filename(raw: &str, max_len: usize, fallback: &str) -> String {
    let mut out = String::new();
    let mut in_run = false;
    for c in raw.chars() {
        if c.is_control() || c == '"' || c == '\'' {
            continue;
        }
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }

    let mut base: &str = out.trim_matches('_');
    if base.trim_matches(|c| c == '.' || c == '_' || c == '-').is_empty() {
        return fallback.to_string();
    }
    if base.len() > max_len {
        base = &base[..max_len];
    }

    if base.to_ascii_lowercase().ends_with(".pdf") {
        base.to_string()
    } else {
        format!("{}.pdf", base)
    }
}

/// Rendered PDF export with its attachment filename.
#[derive(Debug, Clone)]
pub struct PdfExport {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub struct ShareGateway {
    store: Arc<dyn EvaluationStore>,
    export: ExportConfig,
}

impl ShareGateway {
    pub fn new(store: Arc<dyn EvaluationStore>, export: ExportConfig) -> Self {
        Self { store, export }
    }

    /// Resolve a token to its public report snapshot.
    pub async fn resolve(&self, token: &str) -> Result<ReportSnapshot, EvalError> {
        if !is_valid_token(token) {
            return Err(EvalError::NotFound("share token"));
        }

        let record = self
            .store
            .get_share_token(token)
            .await
            .map_err(|e| EvalError::Storage(e.to_string()))?
            .ok_or(EvalError::NotFound("share token"))?;

        if record.revoked {
            return Err(EvalError::NotFound("share token"));
        }

        let job = self
            .store
            .get_job(JobKind::Grade, &record.report_id)
            .await
            .map_err(|e| EvalError::Storage(e.to_string()))?
            .ok_or(EvalError::NotFound("share token"))?;

        let (version, project) =
            guard::resolve_version(self.store.as_ref(), &job.version_id).await?;

        let status = normalize::parse_status(&job.status);
        let result = normalize::grade_result(&job, status);

        Ok(ReportSnapshot {
            project_name: project.name,
            version_label: version.label,
            status,
            queued_at: job.queued_at,
            completed_at: job.completed_at,
            failure_reason: job.failure_reason,
            result,
        })
    }

    /// Render the shared report as a PDF attachment. Requires the report to
    /// be in a terminal state.
    pub async fn render_pdf(&self, token: &str) -> Result<PdfExport, EvalError> {
        let snapshot = self.resolve(token).await?;
        if !snapshot.status.is_terminal() {
            return Err(EvalError::NotReady);
        }

        let raw_name = format!(
            "{} {} report.pdf",
            snapshot.project_name, snapshot.version_label
        );
        let filename = sanitize_filename(
            &raw_name,
            self.export.max_filename_len,
            &self.export.fallback_filename,
        );
        let bytes = pdf::render_report_pdf(&snapshot);

        Ok(PdfExport { filename, bytes })
    }
}
