//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the bridge.
//! Each bridge owns its registry, so isolated instances never collide.
//!
//! # Metrics
//!
//! - `bridge_requests_total` - Screening requests created
//! - `bridge_submissions_total{path,outcome}` - Result submissions by path and outcome
//! - `bridge_pending_requests` - Requests awaiting a result
//! - `bridge_forwards_deferred_total` - Forwards refused by the compliance sink
//! - `bridge_compliance_updates_total` - Manual and batch status updates pushed

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Screening requests created
    pub requests_total: IntCounter,

    /// Submissions by path (`signed`/`direct`) and outcome (`accepted` or an error kind)
    pub submissions_total: IntCounterVec,

    /// Requests awaiting a result
    pub pending_requests: IntGauge,

    /// Forwards refused by the sink
    pub forwards_deferred: IntCounter,

    /// Manual and batch status updates
    pub compliance_updates: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let requests_total =
            IntCounter::new("bridge_requests_total", "Screening requests created")?;
        registry.register(Box::new(requests_total.clone()))?;

        let submissions_total = IntCounterVec::new(
            Opts::new("bridge_submissions_total", "Result submissions by path and outcome"),
            &["path", "outcome"],
        )?;
        registry.register(Box::new(submissions_total.clone()))?;

        let pending_requests =
            IntGauge::new("bridge_pending_requests", "Requests awaiting a result")?;
        registry.register(Box::new(pending_requests.clone()))?;

        let forwards_deferred = IntCounter::new(
            "bridge_forwards_deferred_total",
            "Forwards refused by the compliance sink",
        )?;
        registry.register(Box::new(forwards_deferred.clone()))?;

        let compliance_updates = IntCounter::new(
            "bridge_compliance_updates_total",
            "Manual and batch status updates pushed",
        )?;
        registry.register(Box::new(compliance_updates.clone()))?;

        Ok(Self {
            requests_total,
            submissions_total,
            pending_requests,
            forwards_deferred,
            compliance_updates,
            registry,
        })
    }

    /// Count one submission
    pub fn record_submission(&self, path: &str, outcome: &str) {
        self.submissions_total
            .with_label_values(&[path, outcome])
            .inc();
    }

    /// Submissions recorded under `path`/`outcome`
    pub fn submissions(&self, path: &str, outcome: &str) -> u64 {
        self.submissions_total
            .with_label_values(&[path, outcome])
            .get()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("requests_total", &self.requests_total.get())
            .field("pending_requests", &self.pending_requests.get())
            .finish()
    }
}
