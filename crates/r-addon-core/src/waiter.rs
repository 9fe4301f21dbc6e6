//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on convergence engine and its building blocks."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
//! Polling waiters that block until the control plane reaches a terminal state.
//!
//! Every wait is a cancellable, time-bounded suspension: the loop sleeps between
//! polls with `tokio::time::sleep`, races both the sleep and the remote call
//! against the caller's [`CancellationToken`] and the deadline, and only
//! reports a timeout once the deadline has actually passed.

use std::future::Future;
use std::time::Duration;

use r_addon_common::{PollingConfig, TimeoutConfig};
use r_addon_logging::{addon_debug, LogContext};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::api::AddonApi;
use crate::error::{AddonError, Operation};
use crate::finder::{find_addon, find_addon_update};
use crate::identifier::AddonId;
use crate::model::{Addon, AddonStatus, AddonUpdate, UpdateStatus};

/// Bounds for a single wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Pause before the first poll.
    pub initial_delay: Duration,
}

impl WaitConfig {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
            initial_delay: Duration::ZERO,
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn for_create(timeouts: &TimeoutConfig, polling: &PollingConfig) -> Self {
        Self::new(timeouts.create, polling.interval).with_initial_delay(polling.initial_delay)
    }

    pub fn for_update(timeouts: &TimeoutConfig, polling: &PollingConfig) -> Self {
        Self::new(timeouts.update, polling.interval).with_initial_delay(polling.initial_delay)
    }

    pub fn for_delete(timeouts: &TimeoutConfig, polling: &PollingConfig) -> Self {
        Self::new(timeouts.delete, polling.interval).with_initial_delay(polling.initial_delay)
    }
}

/// Classification of one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll<T> {
    Ready(T),
    /// Keep polling; carries the observed status for timeout reporting.
    Pending(Option<String>),
    Failed {
        status: String,
        reason: String,
        conflict: bool,
    },
}

/// Poll `observe` until it reports a terminal state, the deadline passes, or
/// `cancel` fires.
pub async fn poll_until<T, F, Fut>(
    operation: Operation,
    id: &AddonId,
    config: WaitConfig,
    cancel: &CancellationToken,
    mut observe: F,
) -> Result<T, AddonError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Poll<T>, AddonError>>,
{
    let started = Instant::now();
    let deadline = started + config.timeout;
    let mut last_status: Option<String> = None;
    let ctx = LogContext::new()
        .with_cluster(id.cluster_name())
        .with_addon(id.addon_name())
        .with_operation(operation.as_str());

    pause(operation, id, config.initial_delay, deadline, cancel).await?;

    let mut polls = 0u64;
    loop {
        polls += 1;
        let observed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AddonError::cancelled(operation, id)),
            observed = observe() => observed?,
            _ = tokio::time::sleep_until(deadline) => {
                return Err(AddonError::Timeout {
                    operation,
                    id: id.to_string(),
                    last_status,
                    timeout: config.timeout,
                });
            }
        };
        match observed {
            Poll::Ready(value) => {
                addon_debug!(
                    context = ctx.clone().with_attempt(polls),
                    "wait finished after {:?}",
                    started.elapsed()
                );
                return Ok(value);
            }
            Poll::Failed {
                status,
                reason,
                conflict,
            } => {
                let id = id.to_string();
                if conflict {
                    return Err(AddonError::Conflict {
                        operation,
                        id,
                        detail: reason,
                    });
                }
                return Err(AddonError::TerminalFailure {
                    operation,
                    id,
                    status,
                    reason,
                });
            }
            Poll::Pending(status) => {
                addon_debug!(
                    context = ctx.clone().with_attempt(polls),
                    "still waiting (status: {})",
                    status.as_deref().unwrap_or("unknown")
                );
                if status.is_some() {
                    last_status = status;
                }
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(AddonError::Timeout {
                operation,
                id: id.to_string(),
                last_status,
                timeout: config.timeout,
            });
        }
        pause(operation, id, config.poll_interval, deadline, cancel).await?;
    }
}

/// Sleep for `interval` but never past `deadline`, aborting on cancellation.
async fn pause(
    operation: Operation,
    id: &AddonId,
    interval: Duration,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Result<(), AddonError> {
    if cancel.is_cancelled() {
        return Err(AddonError::cancelled(operation, id));
    }
    if interval.is_zero() {
        return Ok(());
    }
    let wake = (Instant::now() + interval).min(deadline);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AddonError::cancelled(operation, id)),
        _ = tokio::time::sleep_until(wake) => Ok(()),
    }
}

fn classify_addon(addon: Addon) -> Poll<Addon> {
    match addon.status {
        AddonStatus::Active => Poll::Ready(addon),
        AddonStatus::CreateFailed | AddonStatus::Degraded => Poll::Failed {
            status: addon.status.to_string(),
            reason: addon.health_summary(),
            conflict: addon.has_configuration_conflict(),
        },
        ref other => Poll::Pending(Some(other.to_string())),
    }
}

/// Wait until the add-on is ACTIVE. CREATE_FAILED and DEGRADED are terminal.
///
/// The add-on may briefly be invisible right after creation, so not-found
/// counts as pending.
pub async fn wait_addon_active(
    api: &dyn AddonApi,
    id: &AddonId,
    config: WaitConfig,
    cancel: &CancellationToken,
) -> Result<Addon, AddonError> {
    poll_until(Operation::Create, id, config, cancel, move || async move {
        match find_addon(api, id, cancel).await {
            Ok(addon) => Ok(classify_addon(addon)),
            Err(err) if err.is_not_found() => Ok(Poll::Pending(None)),
            Err(err) => Err(err),
        }
    })
    .await
}

/// Wait until the add-on is gone. DELETE_FAILED is terminal.
pub async fn wait_addon_deleted(
    api: &dyn AddonApi,
    id: &AddonId,
    config: WaitConfig,
    cancel: &CancellationToken,
) -> Result<(), AddonError> {
    poll_until(Operation::Delete, id, config, cancel, move || async move {
        match find_addon(api, id, cancel).await {
            Ok(addon) if addon.status == AddonStatus::DeleteFailed => Ok(Poll::Failed {
                status: addon.status.to_string(),
                reason: addon.health_summary(),
                conflict: false,
            }),
            Ok(addon) => Ok(Poll::Pending(Some(addon.status.to_string()))),
            Err(err) if err.is_not_found() => Ok(Poll::Ready(())),
            Err(err) => Err(err),
        }
    })
    .await
}

fn classify_update(update: AddonUpdate) -> Poll<AddonUpdate> {
    match update.status {
        UpdateStatus::Successful => Poll::Ready(update),
        UpdateStatus::Failed | UpdateStatus::Cancelled => Poll::Failed {
            status: update.status.to_string(),
            reason: update.error_summary(),
            conflict: update.has_configuration_conflict(),
        },
        ref other => Poll::Pending(Some(other.to_string())),
    }
}

/// Wait until the update sub-operation is Successful. Failed and Cancelled are terminal.
pub async fn wait_addon_update_successful(
    api: &dyn AddonApi,
    id: &AddonId,
    update_id: &str,
    config: WaitConfig,
    cancel: &CancellationToken,
) -> Result<AddonUpdate, AddonError> {
    poll_until(Operation::Update, id, config, cancel, move || async move {
        find_addon_update(api, id, update_id, cancel)
            .await
            .map(classify_update)
    })
    .await
}
