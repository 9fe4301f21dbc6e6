//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Shared primitives and utilities for the convergence runtime."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
//! Core shared primitives for the R-Addon workspace.
//! This crate exposes configuration loading, tracing initialisation, and
//! version metadata utilities consumed across the workspace.

pub mod config;
pub mod logging;
pub mod version;

pub use config::{
    AppConfig, LoadedAppConfig, LoggingConfig, PollingConfig, RetryConfig, TagConfig,
    TimeoutConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use version::VersionInfo;
