//! Telemetry Sink
//!
//! Best-effort recording of request traces, audit entries, and job-state
//! events. Every call is fire-and-forget: the write is spawned onto the
//! runtime and the caller continues immediately. A write failure is pushed
//! into a bounded internal channel and logged once by a drain task; it is
//! never propagated to the caller, because telemetry loss must never turn
//! into a user-visible request failure.
//!
//! Request traces are stochastically sampled by the configured rate; audit
//! entries and job events are always recorded.

use std::sync::Arc;

use rand::Rng;
use tokio::sync::mpsc;
use tracing::warn;

use crate::config::TelemetryConfig;
use crate::storage::TelemetryStore;
use crate::types::{AuditEntry, JobEvent, RequestTrace};

/// A contained telemetry write failure, drained by the logger task.
#[derive(Debug)]
struct SinkFailure {
    record_kind: &'static str,
    message: String,
}

#[derive(Clone)]
pub struct TelemetrySink {
    store: Arc<dyn TelemetryStore>,
    sample_rate: f64,
    failures: mpsc::Sender<SinkFailure>,
}

impl TelemetrySink {
    /// Build the sink and spawn its failure-drain task.
    pub fn new(store: Arc<dyn TelemetryStore>, config: &TelemetryConfig) -> Self {
        let (tx, mut rx) = mpsc::channel::<SinkFailure>(config.failure_channel_capacity.max(1));

        tokio::spawn(async move {
            while let Some(failure) = rx.recv().await {
                warn!(
                    "telemetry {} write failed: {}",
                    failure.record_kind, failure.message
                );
            }
        });

        Self {
            store,
            sample_rate: config.sample_rate,
            failures: tx,
        }
    }

    /// Record a request trace, subject to sampling. Never blocks, never fails.
    pub fn record_request(&self, trace: RequestTrace) {
        if !sample(self.sample_rate, rand::thread_rng().gen::<f64>()) {
            return;
        }
        let store = self.store.clone();
        let failures = self.failures.clone();
        tokio::spawn(async move {
            if let Err(e) = store.record_request(&trace).await {
                let _ = failures.try_send(SinkFailure {
                    record_kind: "request",
                    message: e.to_string(),
                });
            }
        });
    }

    /// Record an audit entry. Not subject to sampling.
    pub fn record_audit(&self, entry: AuditEntry) {
        let store = self.store.clone();
        let failures = self.failures.clone();
        tokio::spawn(async move {
            if let Err(e) = store.record_audit(&entry).await {
                let _ = failures.try_send(SinkFailure {
                    record_kind: "audit",
                    message: e.to_string(),
                });
            }
        });
    }

    /// Record a job-state transition. Not subject to sampling.
    pub fn record_job_event(&self, event: JobEvent) {
        let store = self.store.clone();
        let failures = self.failures.clone();
        tokio::spawn(async move {
            if let Err(e) = store.record_job_event(&event).await {
                let _ = failures.try_send(SinkFailure {
                    record_kind: "job_event",
                    message: e.to_string(),
                });
            }
        });
    }
}

/// Sampling decision: rate >= 1 always records, rate <= 0 never records,
/// otherwise the per-call uniform draw in [0,1) decides.
fn sample(rate: f64, draw: f64) -> bool {
    if rate >= 1.0 {
        return true;
    }
    if rate <= 0.0 {
        return false;
    }
    draw < rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use serde_json::json;

    fn trace(id: &str) -> RequestTrace {
        RequestTrace {
            request_id: id.to_string(),
            method: "GET".to_string(),
            path: "/api/v1/health".to_string(),
            status_code: 200,
            duration_ms: 3,
            user_id: None,
            ip_address: None,
            user_agent: None,
            metadata: json!({}),
        }
    }

    fn audit() -> AuditEntry {
        AuditEntry {
            user_id: Some("user-1".to_string()),
            action: "evaluation.submit".to_string(),
            resource_type: "grade_report".to_string(),
            resource_id: Some("job-1".to_string()),
            status_code: 202,
            ip_address: None,
            user_agent: None,
            metadata: json!({}),
        }
    }

    async fn settle() {
        // Spawned writes complete on first poll against the memory store;
        // a few yields are enough on the current-thread test runtime.
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_sampling_decision() {
        assert!(sample(1.0, 0.999));
        assert!(sample(1.5, 0.0));
        assert!(!sample(0.0, 0.0));
        assert!(!sample(-0.2, 0.5));
        assert!(sample(0.5, 0.25));
        assert!(!sample(0.5, 0.75));
    }

    #[tokio::test]
    async fn test_rate_one_records_every_request() {
        let store = Arc::new(MemoryStore::new());
        let sink = TelemetrySink::new(
            store.clone(),
            &TelemetryConfig {
                sample_rate: 1.0,
                failure_channel_capacity: 8,
            },
        );

        for i in 0..5 {
            sink.record_request(trace(&format!("req-{}", i)));
        }
        settle().await;
        assert_eq!(store.request_count(), 5);
    }

    #[tokio::test]
    async fn test_rate_zero_records_nothing() {
        let store = Arc::new(MemoryStore::new());
        let sink = TelemetrySink::new(
            store.clone(),
            &TelemetryConfig {
                sample_rate: 0.0,
                failure_channel_capacity: 8,
            },
        );

        for i in 0..5 {
            sink.record_request(trace(&format!("req-{}", i)));
        }
        settle().await;
        assert_eq!(store.request_count(), 0);
    }

    #[tokio::test]
    async fn test_audit_ignores_sampling() {
        let store = Arc::new(MemoryStore::new());
        let sink = TelemetrySink::new(
            store.clone(),
            &TelemetryConfig {
                sample_rate: 0.0,
                failure_channel_capacity: 8,
            },
        );

        sink.record_audit(audit());
        settle().await;
        assert_eq!(store.audit_count(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_contained() {
        let store = Arc::new(MemoryStore::new());
        store.set_fail_telemetry(true);
        let sink = TelemetrySink::new(store.clone(), &TelemetryConfig::default());

        // None of these calls may error or panic.
        sink.record_request(trace("req-1"));
        sink.record_audit(audit());
        sink.record_job_event(crate::types::JobEvent::transition(
            crate::types::JobKind::Grade,
            "job-1",
            crate::types::JobEventState::Queued,
        ));
        settle().await;

        assert_eq!(store.request_count(), 0);
        assert_eq!(store.audit_count(), 0);
        assert_eq!(store.job_event_count(), 0);
    }
}
