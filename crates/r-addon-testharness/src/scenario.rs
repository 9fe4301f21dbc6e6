//! ---
//! addon_section: "11-simulation"
//! addon_subsection: "01-bootstrap"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Declarative lifecycle scenarios replayed against the fake control plane."
//! addon_version: "v0.1.0"
//! addon_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use r_addon_core::api::ApiError;
use r_addon_core::model::{DesiredAddon, HealthIssue, UpdateErrorDetail, UpdateStatus};
use r_addon_core::{
    AddonReconciler, AddonState, BackoffPolicy, CancellationToken, CreateOutcome, DeleteOutcome,
    Diagnostics, EngineSettings, ReadMode, ReadOutcome,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::fake::{FakeControlPlane, FakeStep};

fn default_wait_ms() -> u64 {
    5_000
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_propagation_ms() -> u64 {
    2_000
}

/// Declarative lifecycle scenario loaded from YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub timing: ScenarioTiming,
    pub addon: DesiredAddon,
    #[serde(default)]
    pub script: ScenarioScript,
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("unable to read scenario {}", path.as_ref().display()))?;
        contents
            .parse::<Self>()
            .with_context(|| format!("invalid scenario {}", path.as_ref().display()))
    }
}

impl std::str::FromStr for Scenario {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> std::result::Result<Self, Self::Err> {
        serde_yaml::from_str::<Self>(input).map_err(anyhow::Error::new)
    }
}

/// Wait bounds used while replaying, in milliseconds so scenarios finish quickly.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioTiming {
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_propagation_ms")]
    pub propagation_ms: u64,
}

impl Default for ScenarioTiming {
    fn default() -> Self {
        Self {
            wait_ms: default_wait_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            propagation_ms: default_propagation_ms(),
        }
    }
}

impl ScenarioTiming {
    fn settings(&self) -> EngineSettings {
        let mut settings = EngineSettings::default().with_waits(
            Duration::from_millis(self.wait_ms),
            Duration::from_millis(self.poll_interval_ms),
        );
        settings.propagation_timeout = Duration::from_millis(self.propagation_ms);
        settings.backoff = BackoffPolicy::new(
            Duration::from_millis(self.poll_interval_ms.max(1)),
            Duration::from_millis(self.poll_interval_ms.max(1) * 8),
            Duration::ZERO,
        );
        settings
    }
}

/// Remote behaviour scripted into the fake control plane before the steps run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioScript {
    #[serde(default)]
    pub create: Vec<FakeStep>,
    #[serde(default)]
    pub create_errors: Vec<ScriptedError>,
    #[serde(default)]
    pub health: Vec<HealthIssue>,
    #[serde(default)]
    pub update_statuses: Vec<UpdateStatus>,
    #[serde(default)]
    pub update_errors: Vec<UpdateErrorDetail>,
    #[serde(default)]
    pub delete: Vec<FakeStep>,
}

/// Remote error injected into the next create call.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptedError {
    pub kind: ScriptedErrorKind,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedErrorKind {
    InvalidParameter,
    ResourceInUse,
    ResourceNotFound,
    Throttling,
    Transport,
}

impl ScriptedError {
    fn to_api_error(&self) -> ApiError {
        let message = self.message.clone();
        match self.kind {
            ScriptedErrorKind::InvalidParameter => ApiError::InvalidParameter(message),
            ScriptedErrorKind::ResourceInUse => ApiError::ResourceInUse(message),
            ScriptedErrorKind::ResourceNotFound => ApiError::ResourceNotFound(message),
            ScriptedErrorKind::Throttling => ApiError::Throttling(message),
            ScriptedErrorKind::Transport => ApiError::Transport(message),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioStep {
    #[serde(flatten)]
    pub action: StepAction,
    /// Outcome the step must produce for the scenario to pass.
    #[serde(default)]
    pub expect: Option<StepOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    Create,
    Read,
    Import,
    /// Change the desired add-on and converge it.
    Update {
        #[serde(default)]
        addon_version: Option<String>,
        #[serde(default)]
        configuration_values: Option<String>,
        #[serde(default)]
        service_account_role_arn: Option<String>,
        /// Drop the role ARN from the desired state.
        #[serde(default)]
        clear_service_account_role_arn: bool,
        #[serde(default)]
        tags: Option<BTreeMap<String, String>>,
    },
    Delete {
        #[serde(default)]
        preserve: bool,
    },
    /// Remove the add-on from the fake without telling the engine.
    RemoveOutOfBand,
}

impl StepAction {
    pub fn label(&self) -> &'static str {
        match self {
            StepAction::Create => "create",
            StepAction::Read => "read",
            StepAction::Import => "import",
            StepAction::Update { .. } => "update",
            StepAction::Delete { .. } => "delete",
            StepAction::RemoveOutOfBand => "remove_out_of_band",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Ok,
    Tainted,
    Gone,
    Pending,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub action: &'static str,
    pub outcome: StepOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<StepOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<AddonState>,
    pub diagnostics: Diagnostics,
}

impl StepReport {
    pub fn met_expectation(&self) -> bool {
        self.expected.map_or(true, |expected| expected == self.outcome)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub steps: Vec<StepReport>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.steps.iter().all(StepReport::met_expectation)
    }
}

/// Replays a [`Scenario`] against a fresh [`FakeControlPlane`].
pub struct ScenarioRunner {
    fake: Arc<FakeControlPlane>,
    reconciler: AddonReconciler,
    cancel: CancellationToken,
}

impl ScenarioRunner {
    pub fn new(scenario: &Scenario) -> Self {
        let fake = Arc::new(FakeControlPlane::new());
        let reconciler = AddonReconciler::new(fake.clone(), scenario.timing.settings());
        Self {
            fake,
            reconciler,
            cancel: CancellationToken::new(),
        }
    }

    pub fn control_plane(&self) -> Arc<FakeControlPlane> {
        self.fake.clone()
    }

    fn apply_script(&self, scenario: &Scenario) {
        let cluster = scenario.addon.cluster_name.as_str();
        let addon = scenario.addon.addon_name.as_str();
        let script = &scenario.script;
        if !script.create.is_empty() {
            self.fake.script_create(cluster, addon, script.create.clone());
        }
        for error in &script.create_errors {
            self.fake.fail_next_create(error.to_api_error());
        }
        if !script.health.is_empty() {
            self.fake.set_health(cluster, addon, script.health.clone());
        }
        if !script.update_statuses.is_empty() {
            self.fake.script_update(
                cluster,
                addon,
                script.update_statuses.clone(),
                script.update_errors.clone(),
            );
        }
        if !script.delete.is_empty() {
            self.fake.script_delete(cluster, addon, script.delete.clone());
        }
    }

    pub async fn run(&self, scenario: &Scenario) -> Result<ScenarioReport> {
        self.apply_script(scenario);
        let mut desired = scenario.addon.clone();
        let mut tracked: Option<String> = None;
        let mut state: Option<AddonState> = None;
        let mut steps = Vec::with_capacity(scenario.steps.len());

        for step in &scenario.steps {
            let (outcome, diagnostics) = self
                .run_step(&step.action, &mut desired, &mut tracked, &mut state)
                .await;
            info!(
                scenario = %scenario.name,
                action = step.action.label(),
                outcome = ?outcome,
                "scenario step finished"
            );
            steps.push(StepReport {
                action: step.action.label(),
                outcome,
                expected: step.expect,
                id: tracked.clone(),
                state: state.clone(),
                diagnostics,
            });
        }

        Ok(ScenarioReport {
            name: scenario.name.clone(),
            steps,
        })
    }

    async fn run_step(
        &self,
        action: &StepAction,
        desired: &mut DesiredAddon,
        tracked: &mut Option<String>,
        state: &mut Option<AddonState>,
    ) -> (StepOutcome, Diagnostics) {
        let cancel = &self.cancel;
        match action {
            StepAction::Create => match self.reconciler.create(desired, cancel).await {
                Ok(outcome) => {
                    let diagnostics = outcome.diagnostics();
                    *tracked = Some(outcome.id().encode());
                    match outcome {
                        CreateOutcome::Created(created) => {
                            *state = Some(created);
                            (StepOutcome::Ok, diagnostics)
                        }
                        CreateOutcome::Tainted { .. } => {
                            *state = None;
                            (StepOutcome::Tainted, diagnostics)
                        }
                    }
                }
                Err(err) => (StepOutcome::Failed, Diagnostics::from_error(&err)),
            },
            StepAction::Read => {
                let Some(id) = tracked.clone() else {
                    return untracked();
                };
                match self.reconciler.read(&id, ReadMode::Refresh, cancel).await {
                    Ok(outcome) => {
                        let diagnostics = outcome.diagnostics();
                        match outcome {
                            ReadOutcome::Found(found) => {
                                *state = Some(found);
                                (StepOutcome::Ok, diagnostics)
                            }
                            ReadOutcome::Gone => {
                                *tracked = None;
                                *state = None;
                                (StepOutcome::Gone, diagnostics)
                            }
                        }
                    }
                    Err(err) => (StepOutcome::Failed, Diagnostics::from_error(&err)),
                }
            }
            StepAction::Import => {
                let id = match desired.id() {
                    Ok(id) => id.encode(),
                    Err(err) => return (StepOutcome::Failed, Diagnostics::from_error(&err)),
                };
                match self.reconciler.import(&id, cancel).await {
                    Ok(imported) => {
                        *tracked = Some(id);
                        *state = Some(imported);
                        (StepOutcome::Ok, Diagnostics::new())
                    }
                    Err(err) => (StepOutcome::Failed, Diagnostics::from_error(&err)),
                }
            }
            StepAction::Update {
                addon_version,
                configuration_values,
                service_account_role_arn,
                clear_service_account_role_arn,
                tags,
            } => {
                let Some(prior) = state.clone() else {
                    return untracked();
                };
                if addon_version.is_some() {
                    desired.addon_version = addon_version.clone();
                }
                if configuration_values.is_some() {
                    desired.configuration_values = configuration_values.clone();
                }
                if service_account_role_arn.is_some() {
                    desired.service_account_role_arn = service_account_role_arn.clone();
                }
                if *clear_service_account_role_arn {
                    desired.service_account_role_arn = None;
                }
                if let Some(tags) = tags {
                    desired.tags = tags.clone();
                }
                match self.reconciler.update(&prior, desired, cancel).await {
                    Ok(ReadOutcome::Found(updated)) => {
                        *state = Some(updated);
                        (StepOutcome::Ok, Diagnostics::new())
                    }
                    Ok(gone @ ReadOutcome::Gone) => {
                        *tracked = None;
                        *state = None;
                        (StepOutcome::Gone, gone.diagnostics())
                    }
                    Err(err) => (StepOutcome::Failed, Diagnostics::from_error(&err)),
                }
            }
            StepAction::Delete { preserve } => {
                let Some(id) = tracked.clone() else {
                    return untracked();
                };
                match self.reconciler.delete(&id, *preserve, cancel).await {
                    Ok(outcome) => {
                        let diagnostics = outcome.diagnostics();
                        *tracked = None;
                        *state = None;
                        match outcome {
                            DeleteOutcome::Deleted => (StepOutcome::Ok, diagnostics),
                            DeleteOutcome::Pending { .. } => (StepOutcome::Pending, diagnostics),
                        }
                    }
                    Err(err) => (StepOutcome::Failed, Diagnostics::from_error(&err)),
                }
            }
            StepAction::RemoveOutOfBand => {
                let removed = self
                    .fake
                    .remove_out_of_band(&desired.cluster_name, &desired.addon_name);
                let mut diagnostics = Diagnostics::new();
                if !removed {
                    diagnostics.warning("nothing to remove", None);
                }
                (StepOutcome::Ok, diagnostics)
            }
        }
    }
}

fn untracked() -> (StepOutcome, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    diagnostics.error("no tracked add-on for this step", None);
    (StepOutcome::Failed, diagnostics)
}
