//! ---
//! addon_section: "03-logging"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Structured logging adapters for lifecycle operations."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline stderr subscriber suitable for command line tools.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Cluster the add-on is attached to.
    pub cluster: Option<&'a str>,
    /// Add-on name.
    pub addon: Option<&'a str>,
    /// Lifecycle operation (create, read, update, delete).
    pub operation: Option<&'a str>,
    /// Attempt counter for retried remote calls.
    pub attempt: Option<u64>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a cluster name.
    pub fn with_cluster(mut self, cluster: &'a str) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Attach an add-on name.
    pub fn with_addon(mut self, addon: &'a str) -> Self {
        self.addon = Some(addon);
        self
    }

    /// Attach the lifecycle operation.
    pub fn with_operation(mut self, operation: &'a str) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Attach an attempt counter.
    pub fn with_attempt(mut self, attempt: u64) -> Self {
        self.attempt = Some(attempt);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// The operation converged.
    Success,
    /// The operation finished but left something for the operator to act on.
    Warning,
    /// The operation failed or was aborted.
    Fault,
}

impl LifecycleOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            LifecycleOutcome::Success => "success",
            LifecycleOutcome::Warning => "warning",
            LifecycleOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event with an outcome classification.
pub fn log_lifecycle_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: LifecycleOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    // `tracing::event!` needs a constant level per call site.
    macro_rules! emit {
        ($level:expr) => {
            tracing::event!(
                $level,
                event,
                outcome = outcome.as_str(),
                cluster = ctx.cluster.unwrap_or(""),
                addon = ctx.addon.unwrap_or(""),
                operation = ctx.operation.unwrap_or(""),
                attempt = ctx.attempt.unwrap_or_default(),
                message = %message
            )
        };
    }
    match outcome {
        LifecycleOutcome::Success => emit!(Level::INFO),
        LifecycleOutcome::Warning => emit!(Level::WARN),
        LifecycleOutcome::Fault => emit!(Level::ERROR),
    }
}
