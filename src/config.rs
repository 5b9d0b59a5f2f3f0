//! Server Configuration
//!
//! Configuration for the design challenge server:
//! - Bind address and database connection
//! - Telemetry sampling rate
//! - Worker callback authentication
//! - PDF export limits

use serde::{Deserialize, Serialize};

/// Complete server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeConfig {
    /// Host to bind the HTTP server to
    pub host: String,
    /// Port to bind the HTTP server to
    pub port: u16,
    /// PostgreSQL connection URL; empty selects the in-memory store
    pub database_url: Option<String>,
    /// Telemetry configuration
    pub telemetry: TelemetryConfig,
    /// Shared secret the worker pool presents on completion callbacks
    pub worker_token: String,
    /// Export configuration
    pub export: ExportConfig,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: None,
            telemetry: TelemetryConfig::default(),
            worker_token: String::new(),
            export: ExportConfig::default(),
        }
    }
}

/// Telemetry sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Request-trace sampling rate in [0,1]. >=1 records every request,
    /// <=0 records none; in between, an independent draw per request.
    pub sample_rate: f64,
    /// Capacity of the internal failure channel. Failures beyond this are
    /// dropped silently.
    pub failure_channel_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1.0,
            failure_channel_capacity: 256,
        }
    }
}

/// PDF export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Maximum length of a sanitized attachment filename (before the
    /// forced .pdf suffix)
    pub max_filename_len: usize,
    /// Fallback filename when sanitization leaves nothing
    pub fallback_filename: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_filename_len: 64,
            fallback_filename: "report.pdf".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ChallengeConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.telemetry.sample_rate, 1.0);
        assert_eq!(config.export.fallback_filename, "report.pdf");
        assert!(config.database_url.is_none());
    }
}
