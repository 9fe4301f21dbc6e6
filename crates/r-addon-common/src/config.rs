//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Shared primitives and utilities for the convergence runtime."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_create_timeout() -> Duration {
    Duration::from_secs(20 * 60)
}

fn default_update_timeout() -> Duration {
    Duration::from_secs(20 * 60)
}

fn default_delete_timeout() -> Duration {
    Duration::from_secs(40 * 60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_propagation_timeout() -> Duration {
    Duration::from_secs(2 * 60)
}

fn default_retry_base_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_retry_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_retry_jitter() -> Duration {
    Duration::from_millis(100)
}

fn default_ignored_prefixes() -> Vec<String> {
    vec!["aws:".to_owned()]
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for the convergence runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub tags: TagConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    /// `None` when no file was found and defaults were applied.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "R_ADDON_CONFIG";

    /// Load configuration from disk, respecting the `R_ADDON_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        let loaded = Self::load_with_source(candidates)?;
        match loaded.source {
            Some(_) => Ok(loaded.config),
            None => Err(anyhow!(
                "no configuration files found. inspected: {}",
                candidates
                    .iter()
                    .map(|p| p.as_ref().display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }

    /// Load configuration together with the effective source path, falling back to
    /// defaults when neither the override nor any candidate exists.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        debug!("no configuration file found; using defaults");
        Ok(LoadedAppConfig {
            config: Self::default(),
            source: None,
        })
    }

    /// Read and validate a single configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.timeouts.validate()?;
        self.polling.validate(&self.timeouts)?;
        self.retry.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Upper bounds for each asynchronous lifecycle operation.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_create_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub create: Duration,
    #[serde(default = "default_update_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub update: Duration,
    #[serde(default = "default_delete_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub delete: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            create: default_create_timeout(),
            update: default_update_timeout(),
            delete: default_delete_timeout(),
        }
    }
}

impl TimeoutConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("create", self.create),
            ("update", self.update),
            ("delete", self.delete),
        ] {
            if value.is_zero() {
                return Err(anyhow!("timeouts.{} must be greater than zero", name));
            }
        }
        Ok(())
    }

    /// Smallest of the three operation timeouts.
    pub fn shortest(&self) -> Duration {
        self.create.min(self.update).min(self.delete)
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub interval: Duration,
    #[serde(default)]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub initial_delay: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            initial_delay: Duration::ZERO,
        }
    }
}

impl PollingConfig {
    pub fn validate(&self, timeouts: &TimeoutConfig) -> Result<()> {
        if self.interval.is_zero() {
            return Err(anyhow!("polling.interval must be greater than zero"));
        }
        if self.interval >= timeouts.shortest() {
            return Err(anyhow!(
                "polling.interval ({:?}) must be shorter than every operation timeout",
                self.interval
            ));
        }
        Ok(())
    }
}

/// Backoff budget applied to retryable create failures.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_propagation_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub propagation_timeout: Duration,
    #[serde(default = "default_retry_base_delay")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub base_delay: Duration,
    #[serde(default = "default_retry_max_delay")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub max_delay: Duration,
    #[serde(default = "default_retry_jitter")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            propagation_timeout: default_propagation_timeout(),
            base_delay: default_retry_base_delay(),
            max_delay: default_retry_max_delay(),
            jitter: default_retry_jitter(),
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_delay.is_zero() {
            return Err(anyhow!("retry.base_delay must be greater than zero"));
        }
        if self.base_delay > self.max_delay {
            return Err(anyhow!(
                "retry.base_delay ({:?}) exceeds retry.max_delay ({:?})",
                self.base_delay,
                self.max_delay
            ));
        }
        Ok(())
    }
}

/// Provider-level tag handling applied to every add-on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagConfig {
    #[serde(default = "default_ignored_prefixes")]
    pub ignore_key_prefixes: Vec<String>,
    #[serde(default)]
    pub ignore_keys: Vec<String>,
    #[serde(default)]
    pub default_tags: IndexMap<String, String>,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            ignore_key_prefixes: default_ignored_prefixes(),
            ignore_keys: Vec::new(),
            default_tags: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
