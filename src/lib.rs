//! Design Review Challenge for Platform Network
//!
//! Users submit versioned design artifacts for asynchronous evaluation:
//! automated grading (a grade report with category scores and action items)
//! or load simulation (simulated traffic with latency/throughput figures).
//! Results are retrieved by the owner, or publicly through an opaque share
//! token with a rendered PDF export.
//!
//! ## Module Structure
//!
//! - `types`: Core domain types (job kinds, statuses, results, telemetry records)
//! - `error`: Error taxonomy shared across the pipeline
//! - `config`: Server configuration
//! - `auth`: Caller identity and worker token checks
//! - `guard`: Ownership resolution and access enforcement
//! - `orchestrator`: Submission/retrieval state machine
//! - `normalize`: Schema validation and fallback for worker-attached JSON
//! - `queue`: Evaluation job queue client
//! - `telemetry`: Fire-and-forget request/audit/job-event sink
//! - `share`: Share-token gateway and filename sanitization
//! - `pdf`: PDF export for grade reports
//! - `storage`: Data persistence (postgres, memory)
//! - `api`: REST API

/// Core domain types
pub mod types;

/// Error taxonomy
pub mod error;

/// Server configuration
pub mod config;

/// Caller identity and worker authentication
pub mod auth;

/// Ownership and access guard
pub mod guard;

/// Evaluation orchestrator
pub mod orchestrator;

/// Result normalization
pub mod normalize;

/// Evaluation job queue client
pub mod queue;

/// Telemetry sink
pub mod telemetry;

/// Share/export gateway
pub mod share;

/// PDF rendering
pub mod pdf;

/// Data persistence layer
pub mod storage;

/// REST API
pub mod api;

pub use error::EvalError;
pub use orchestrator::Orchestrator;
pub use telemetry::TelemetrySink;
