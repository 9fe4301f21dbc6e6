//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on convergence engine and its building blocks."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
//! Lifecycle engine sequencing create, read, update and delete transitions.

use std::sync::Arc;

use r_addon_logging::{
    addon_debug, addon_info, addon_warn, log_lifecycle_event, LifecycleOutcome, LogContext,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::{AddonApi, ApiError, CreateAddonRequest, DeleteAddonRequest, UpdateAddonRequest};
use crate::error::{AddonError, ErrorKind, Operation};
use crate::finder::{cancellable, find_addon};
use crate::identifier::AddonId;
use crate::metrics::LifecycleMetrics;
use crate::model::{DesiredAddon, EffectivePolicy, ResolveConflicts};
use crate::outcome::{CreateOutcome, DeleteOutcome, ReadMode, ReadOutcome};
use crate::retry::{Backoff, RetryError};
use crate::settings::EngineSettings;
use crate::state::AddonState;
use crate::waiter::{wait_addon_active, wait_addon_deleted, wait_addon_update_successful};

fn log_context(id: &AddonId, operation: Operation) -> LogContext<'_> {
    LogContext::new()
        .with_cluster(id.cluster_name())
        .with_addon(id.addon_name())
        .with_operation(operation.as_str())
}

fn error_label(err: &AddonError) -> &'static str {
    match err.kind() {
        ErrorKind::Cancelled => "cancelled",
        ErrorKind::Timeout => "timeout",
        _ => "failure",
    }
}

fn outcome_label<T>(result: &Result<T, AddonError>) -> &'static str {
    result.as_ref().map_or_else(error_label, |_| "success")
}

fn client_request_token() -> String {
    Uuid::new_v4().to_string()
}

/// Drives one add-on at a time through its lifecycle against an [`AddonApi`].
///
/// The reconciler keeps no per-add-on state; every call re-resolves remote
/// state, so a single instance can be shared behind an `Arc` across tasks.
pub struct AddonReconciler {
    api: Arc<dyn AddonApi>,
    settings: EngineSettings,
    backoff: Backoff,
    metrics: Option<LifecycleMetrics>,
}

impl AddonReconciler {
    pub fn new(api: Arc<dyn AddonApi>, settings: EngineSettings) -> Self {
        let backoff = Backoff::new(settings.backoff);
        Self {
            api,
            settings,
            backoff,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: LifecycleMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Seed the create backoff jitter for deterministic runs.
    pub fn with_backoff_seed(mut self, seed: u64) -> Self {
        self.backoff = Backoff::new(self.settings.backoff).with_seed(seed);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn record(&self, operation: Operation, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_operation(operation, outcome);
        }
    }

    fn observe_wait<T>(&self, operation: Operation, started: Instant, result: &Result<T, AddonError>) {
        if let Some(metrics) = &self.metrics {
            metrics.observe_wait(operation, outcome_label(result), started.elapsed());
        }
    }

    fn warn_overlapping_policies(&self, desired: &DesiredAddon, ctx: &LogContext<'_>) {
        if desired.has_overlapping_policies() {
            addon_warn!(
                context = ctx.clone(),
                "both resolve_conflicts and resolve_conflicts_on_create/update are set; \
                 resolve_conflicts takes precedence"
            );
        }
    }

    /// Create the add-on and wait for it to become ACTIVE.
    ///
    /// Once the control plane accepts the request the identifier is always
    /// returned, either as [`CreateOutcome::Created`] or as
    /// [`CreateOutcome::Tainted`] when the add-on never became healthy.
    pub async fn create(
        &self,
        desired: &DesiredAddon,
        cancel: &CancellationToken,
    ) -> Result<CreateOutcome, AddonError> {
        desired.validate()?;
        let id = desired.id()?;
        let ctx = log_context(&id, Operation::Create);
        self.warn_overlapping_policies(desired, &ctx);

        let policy = desired.create_policy();
        let tags = self.settings.tags.tags_in(&desired.tags);
        let api = self.api.as_ref();
        let attempt_ctx = ctx.clone();

        let accepted = self
            .backoff
            .retry_when(
                self.settings.propagation_timeout,
                cancel,
                ApiError::is_prior_instance_cleanup,
                move |attempt| {
                    if attempt > 1 {
                        addon_info!(
                            context = attempt_ctx.clone().with_attempt(u64::from(attempt)),
                            "retrying create while the previous instance is cleaned up"
                        );
                    }
                    api.create_addon(CreateAddonRequest {
                        cluster_name: desired.cluster_name.clone(),
                        addon_name: desired.addon_name.clone(),
                        addon_version: desired.addon_version.clone(),
                        configuration_values: desired.configuration_values.clone(),
                        service_account_role_arn: desired.service_account_role_arn.clone(),
                        resolve_conflicts: policy.value,
                        tags: tags.clone(),
                        client_request_token: client_request_token(),
                    })
                },
            )
            .await;

        match accepted {
            Ok((_, attempts)) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_create_retries(id.addon_name(), attempts - 1);
                }
                addon_info!(context = ctx.clone().with_attempt(u64::from(attempts)), "create accepted");
            }
            Err(RetryError::Cancelled { .. }) => {
                self.record(Operation::Create, "cancelled");
                return Err(AddonError::cancelled(Operation::Create, &id));
            }
            Err(RetryError::Exhausted { attempts }) => {
                self.record(Operation::Create, "timeout");
                let err = AddonError::Timeout {
                    operation: Operation::Create,
                    id: id.to_string(),
                    last_status: None,
                    timeout: self.settings.propagation_timeout,
                };
                log_lifecycle_event(
                    Some(&ctx.clone().with_attempt(u64::from(attempts))),
                    "addon.create",
                    &err.to_string(),
                    LifecycleOutcome::Fault,
                );
                return Err(err);
            }
            Err(RetryError::Failed { attempts, error }) => {
                self.record(Operation::Create, "failure");
                let err = AddonError::remote(Operation::Create, &id, error);
                log_lifecycle_event(
                    Some(&ctx.clone().with_attempt(u64::from(attempts))),
                    "addon.create",
                    &err.to_string(),
                    LifecycleOutcome::Fault,
                );
                return Err(err);
            }
        }

        let started = Instant::now();
        let waited = wait_addon_active(api, &id, self.settings.create_wait, cancel).await;
        self.observe_wait(Operation::Create, started, &waited);

        let settled = match waited {
            Ok(_) => self.read_id(&id, ReadMode::NewResource, cancel).await,
            Err(err) => Err(self.remediate(err, policy, Operation::Create)),
        };

        match settled {
            Ok(ReadOutcome::Found(state)) => {
                self.record(Operation::Create, "success");
                log_lifecycle_event(
                    Some(&ctx),
                    "addon.create",
                    "add-on active",
                    LifecycleOutcome::Success,
                );
                Ok(CreateOutcome::Created(state))
            }
            Ok(ReadOutcome::Gone) => Ok(self.taint(
                id.clone(),
                AddonError::NotFound { id: id.to_string() },
                &ctx,
            )),
            Err(error) => Ok(self.taint(id.clone(), error, &ctx)),
        }
    }

    fn taint(&self, id: AddonId, error: AddonError, ctx: &LogContext<'_>) -> CreateOutcome {
        self.record(Operation::Create, "tainted");
        let warning = format!(
            "add-on ({id}) was created but did not reach ACTIVE; the next apply will delete \
             and recreate it, discarding configuration made outside of the declared state"
        );
        log_lifecycle_event(
            Some(ctx),
            "addon.create",
            &format!("{error}; {warning}"),
            LifecycleOutcome::Warning,
        );
        CreateOutcome::Tainted { id, error, warning }
    }

    /// Attach the conflict-policy hint when the policy in force would not
    /// have overridden the failing fields. Create only hints on conflicts.
    fn remediate(&self, err: AddonError, policy: EffectivePolicy, operation: Operation) -> AddonError {
        if err.is_cancelled() || policy.is_overwrite() {
            return err;
        }
        if operation == Operation::Create && err.kind() != ErrorKind::Conflict {
            return err;
        }
        err.with_remediation(policy.attribute, ResolveConflicts::Overwrite)
    }

    /// Read the remote add-on behind a persisted identifier.
    pub async fn read(
        &self,
        id: &str,
        mode: ReadMode,
        cancel: &CancellationToken,
    ) -> Result<ReadOutcome, AddonError> {
        let id = AddonId::parse(id)?;
        self.read_id(&id, mode, cancel).await
    }

    async fn read_id(
        &self,
        id: &AddonId,
        mode: ReadMode,
        cancel: &CancellationToken,
    ) -> Result<ReadOutcome, AddonError> {
        match find_addon(self.api.as_ref(), id, cancel).await {
            Ok(addon) => Ok(ReadOutcome::Found(AddonState::from_remote(
                id.clone(),
                addon,
                &self.settings.tags,
            ))),
            Err(err) if err.is_not_found() && mode == ReadMode::Refresh => {
                addon_warn!(
                    context = log_context(id, Operation::Read),
                    "add-on not found, removing from state"
                );
                Ok(ReadOutcome::Gone)
            }
            Err(err) => Err(err),
        }
    }

    /// Adopt an existing remote add-on by identifier.
    pub async fn import(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<AddonState, AddonError> {
        let id = AddonId::parse(id)?;
        match self.read_id(&id, ReadMode::NewResource, cancel).await? {
            ReadOutcome::Found(state) => {
                self.record(Operation::Import, "success");
                Ok(state)
            }
            ReadOutcome::Gone => Err(AddonError::NotFound { id: id.to_string() }),
        }
    }

    /// Converge an existing add-on towards `desired` and return the refreshed state.
    pub async fn update(
        &self,
        prior: &AddonState,
        desired: &DesiredAddon,
        cancel: &CancellationToken,
    ) -> Result<ReadOutcome, AddonError> {
        desired.validate()?;
        let id = prior.id.clone();
        if desired.id()? != id {
            return Err(AddonError::InvalidInput(format!(
                "cluster_name and addon_name cannot change (tracked as {id})"
            )));
        }
        let ctx = log_context(&id, Operation::Update);
        self.warn_overlapping_policies(desired, &ctx);

        let merged = desired.with_computed(prior);
        let version_changed = merged.addon_version != prior.addon_version;
        let values_changed = merged.configuration_values != prior.configuration_values;
        let role_changed = merged.service_account_role_arn != prior.service_account_role_arn;

        if version_changed || values_changed || role_changed {
            let result = self.apply_update(&id, prior, &merged, &ctx, cancel).await;
            self.record(Operation::Update, outcome_label(&result));
            if let Err(err) = result {
                log_lifecycle_event(
                    Some(&ctx),
                    "addon.update",
                    &err.to_string(),
                    LifecycleOutcome::Fault,
                );
                return Err(err);
            }
        } else {
            addon_debug!(context = ctx.clone(), "no add-on attribute changes");
        }

        self.apply_tags(&id, prior, desired, &ctx, cancel).await?;
        self.read_id(&id, ReadMode::Refresh, cancel).await
    }

    async fn apply_update(
        &self,
        id: &AddonId,
        prior: &AddonState,
        merged: &DesiredAddon,
        ctx: &LogContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), AddonError> {
        let policy = merged.update_policy();
        // Always send a configured role so the remote never silently falls back
        // to node permissions; an empty string clears it.
        let role_changed = merged.service_account_role_arn != prior.service_account_role_arn;
        let service_account_role_arn = if role_changed || merged.service_account_role_arn.is_some()
        {
            Some(merged.service_account_role_arn.clone().unwrap_or_default())
        } else {
            None
        };
        let request = UpdateAddonRequest {
            cluster_name: id.cluster_name().to_owned(),
            addon_name: id.addon_name().to_owned(),
            addon_version: merged
                .addon_version
                .clone()
                .filter(|version| Some(version) != prior.addon_version.as_ref()),
            configuration_values: merged
                .configuration_values
                .clone()
                .filter(|values| Some(values) != prior.configuration_values.as_ref()),
            service_account_role_arn,
            resolve_conflicts: policy.value,
            client_request_token: client_request_token(),
        };

        let api = self.api.as_ref();
        let update = cancellable(cancel, Operation::Update, id, api.update_addon(request)).await?;
        addon_info!(context = ctx.clone(), "update {} accepted", update.id);

        let started = Instant::now();
        let waited = wait_addon_update_successful(
            api,
            id,
            &update.id,
            self.settings.update_wait,
            cancel,
        )
        .await;
        self.observe_wait(Operation::Update, started, &waited);
        waited
            .map(|_| ())
            .map_err(|err| self.remediate(err, policy, Operation::Update))
    }

    async fn apply_tags(
        &self,
        id: &AddonId,
        prior: &AddonState,
        desired: &DesiredAddon,
        ctx: &LogContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), AddonError> {
        let wanted = self.settings.tags.tags_in(&desired.tags);
        let (upserts, removals) = self.settings.tags.diff(&prior.tags_all, &wanted);
        let api = self.api.as_ref();
        if !removals.is_empty() {
            addon_debug!(context = ctx.clone(), "removing {} tag(s)", removals.len());
            cancellable(
                cancel,
                Operation::Update,
                id,
                api.untag_resource(&prior.arn, removals),
            )
            .await?;
        }
        if !upserts.is_empty() {
            addon_debug!(context = ctx.clone(), "setting {} tag(s)", upserts.len());
            cancellable(
                cancel,
                Operation::Update,
                id,
                api.tag_resource(&prior.arn, upserts),
            )
            .await?;
        }
        Ok(())
    }

    /// Delete the add-on and wait until the control plane no longer reports it.
    ///
    /// With `preserve` the in-cluster objects are left running.
    pub async fn delete(
        &self,
        id: &str,
        preserve: bool,
        cancel: &CancellationToken,
    ) -> Result<DeleteOutcome, AddonError> {
        let id = AddonId::parse(id)?;
        let ctx = log_context(&id, Operation::Delete);
        let request = DeleteAddonRequest {
            cluster_name: id.cluster_name().to_owned(),
            addon_name: id.addon_name().to_owned(),
            preserve,
        };

        let api = self.api.as_ref();
        match cancellable(cancel, Operation::Delete, &id, api.delete_addon(request)).await {
            Ok(()) => addon_info!(context = ctx.clone(), "delete accepted (preserve: {preserve})"),
            Err(err) if err.is_not_found() => {
                addon_info!(context = ctx.clone(), "add-on already deleted");
                self.record(Operation::Delete, "success");
                return Ok(DeleteOutcome::Deleted);
            }
            Err(err) => {
                self.record(Operation::Delete, error_label(&err));
                log_lifecycle_event(
                    Some(&ctx),
                    "addon.delete",
                    &err.to_string(),
                    LifecycleOutcome::Fault,
                );
                return Err(err);
            }
        }

        let started = Instant::now();
        let waited = wait_addon_deleted(api, &id, self.settings.delete_wait, cancel).await;
        self.observe_wait(Operation::Delete, started, &waited);
        match waited {
            Ok(()) => {
                self.record(Operation::Delete, "success");
                log_lifecycle_event(
                    Some(&ctx),
                    "addon.delete",
                    "add-on deleted",
                    LifecycleOutcome::Success,
                );
                Ok(DeleteOutcome::Deleted)
            }
            Err(error) => {
                self.record(Operation::Delete, "pending");
                log_lifecycle_event(
                    Some(&ctx),
                    "addon.delete",
                    &format!("{error}; removing from state anyway"),
                    LifecycleOutcome::Warning,
                );
                Ok(DeleteOutcome::Pending { error })
            }
        }
    }
}
