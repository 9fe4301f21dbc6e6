//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on convergence engine and its building blocks."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
//! Convergence engine that drives a single cluster add-on through its
//! create/read/update/delete lifecycle against an eventually-consistent
//! control plane.
//!
//! The building blocks are layered leaves first: [`identifier`] encodes the
//! composite key, [`finder`] queries remote state, [`waiter`] polls until a
//! terminal status, and [`engine`] sequences whole lifecycle transitions.

pub mod api;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod finder;
pub mod identifier;
pub mod metrics;
pub mod model;
pub mod outcome;
pub mod retry;
pub mod settings;
pub mod state;
pub mod tags;
pub mod waiter;

pub use api::{AddonApi, ApiError, CreateAddonRequest, DeleteAddonRequest, UpdateAddonRequest};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use engine::AddonReconciler;
pub use error::{AddonError, ErrorKind, Operation};
pub use identifier::{AddonId, ID_SEPARATOR};
pub use metrics::LifecycleMetrics;
pub use model::{
    Addon, AddonStatus, AddonUpdate, DesiredAddon, EffectivePolicy, HealthIssue,
    ResolveConflicts, UpdateErrorDetail, UpdateStatus,
};
pub use outcome::{CreateOutcome, DeleteOutcome, ReadMode, ReadOutcome};
pub use retry::{Backoff, BackoffPolicy, RetryError};
pub use settings::EngineSettings;
pub use state::AddonState;
pub use tags::{TagPolicy, TagSet};
pub use waiter::WaitConfig;

/// Re-exported so callers can build cancellation signals without a direct dependency.
pub use tokio_util::sync::CancellationToken;
