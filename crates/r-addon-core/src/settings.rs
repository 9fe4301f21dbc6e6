//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on convergence engine and its building blocks."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use std::time::Duration;

use r_addon_common::AppConfig;

use crate::retry::BackoffPolicy;
use crate::tags::TagPolicy;
use crate::waiter::WaitConfig;

/// Runtime knobs of the lifecycle engine, derived from [`AppConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub create_wait: WaitConfig,
    pub update_wait: WaitConfig,
    pub delete_wait: WaitConfig,
    /// Total time spent retrying a create rejected during prior-instance cleanup.
    pub propagation_timeout: Duration,
    pub backoff: BackoffPolicy,
    pub tags: TagPolicy,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            create_wait: WaitConfig::for_create(&config.timeouts, &config.polling),
            update_wait: WaitConfig::for_update(&config.timeouts, &config.polling),
            delete_wait: WaitConfig::for_delete(&config.timeouts, &config.polling),
            propagation_timeout: config.retry.propagation_timeout,
            backoff: BackoffPolicy::from_config(&config.retry),
            tags: TagPolicy::from_config(&config.tags),
        }
    }

    /// Shrink every wait to `timeout` and poll every `poll_interval`.
    pub fn with_waits(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.create_wait = WaitConfig::new(timeout, poll_interval);
        self.update_wait = WaitConfig::new(timeout, poll_interval);
        self.delete_wait = WaitConfig::new(timeout, poll_interval);
        self
    }

    pub fn with_tags(mut self, tags: TagPolicy) -> Self {
        self.tags = tags;
        self
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
