//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on convergence engine and its building blocks."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use prometheus::{self, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::Operation;

/// Shared registry the lifecycle metrics are published to.
pub type SharedRegistry = Arc<Registry>;

/// Counters and histograms describing lifecycle operations.
#[derive(Clone)]
pub struct LifecycleMetrics {
    registry: SharedRegistry,
    operations_total: IntCounterVec,
    create_retries_total: IntCounterVec,
    wait_duration_seconds: HistogramVec,
}

impl LifecycleMetrics {
    /// Register the lifecycle metric family against the provided registry.
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let operations_total = IntCounterVec::new(
            Opts::new(
                "r_addon_lifecycle_operations_total",
                "Lifecycle operations completed, by operation and outcome",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let create_retries_total = IntCounterVec::new(
            Opts::new(
                "r_addon_create_retries_total",
                "Create attempts rejected while a prior instance was being cleaned up",
            ),
            &["addon"],
        )?;
        registry.register(Box::new(create_retries_total.clone()))?;

        let histogram_opts = HistogramOpts::new(
            "r_addon_wait_duration_seconds",
            "Time spent waiting for the control plane to reach a terminal state",
        )
        .buckets(prometheus::exponential_buckets(1.0, 2.0, 14)?);
        let wait_duration_seconds = HistogramVec::new(histogram_opts, &["operation", "outcome"])?;
        registry.register(Box::new(wait_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            operations_total,
            create_retries_total,
            wait_duration_seconds,
        })
    }

    /// Register against a fresh private registry.
    pub fn standalone() -> Result<Self> {
        Self::new(Arc::new(Registry::new()))
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_operation(&self, operation: Operation, outcome: &str) {
        self.operations_total
            .with_label_values(&[operation.as_str(), outcome])
            .inc();
    }

    pub fn record_create_retries(&self, addon: &str, retries: u32) {
        if retries > 0 {
            self.create_retries_total
                .with_label_values(&[addon])
                .inc_by(u64::from(retries));
        }
    }

    pub fn observe_wait(&self, operation: Operation, outcome: &str, duration: Duration) {
        self.wait_duration_seconds
            .with_label_values(&[operation.as_str(), outcome])
            .observe(duration.as_secs_f64());
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let families = self.registry.gather();
        Ok(TextEncoder::new().encode_to_string(&families)?)
    }
}

impl std::fmt::Debug for LifecycleMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleMetrics").finish_non_exhaustive()
    }
}
