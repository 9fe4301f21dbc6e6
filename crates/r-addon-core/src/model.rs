//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on convergence engine and its building blocks."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AddonError;
use crate::identifier::AddonId;
use crate::state::AddonState;

/// Error code reported by the control plane when an apply collides with
/// objects managed by another field manager.
pub const CONFIGURATION_CONFLICT_CODE: &str = "ConfigurationConflict";

/// Longest cluster name accepted by the control plane.
const MAX_CLUSTER_NAME_LEN: usize = 100;

/// Status of the add-on itself as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AddonStatus {
    Creating,
    Active,
    CreateFailed,
    Updating,
    Deleting,
    DeleteFailed,
    Degraded,
    UpdateFailed,
    /// Status value this build does not know about; kept verbatim.
    Other(String),
}

impl AddonStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AddonStatus::Creating => "CREATING",
            AddonStatus::Active => "ACTIVE",
            AddonStatus::CreateFailed => "CREATE_FAILED",
            AddonStatus::Updating => "UPDATING",
            AddonStatus::Deleting => "DELETING",
            AddonStatus::DeleteFailed => "DELETE_FAILED",
            AddonStatus::Degraded => "DEGRADED",
            AddonStatus::UpdateFailed => "UPDATE_FAILED",
            AddonStatus::Other(other) => other,
        }
    }
}

impl From<&str> for AddonStatus {
    fn from(value: &str) -> Self {
        match value {
            "CREATING" => AddonStatus::Creating,
            "ACTIVE" => AddonStatus::Active,
            "CREATE_FAILED" => AddonStatus::CreateFailed,
            "UPDATING" => AddonStatus::Updating,
            "DELETING" => AddonStatus::Deleting,
            "DELETE_FAILED" => AddonStatus::DeleteFailed,
            "DEGRADED" => AddonStatus::Degraded,
            "UPDATE_FAILED" => AddonStatus::UpdateFailed,
            other => AddonStatus::Other(other.to_owned()),
        }
    }
}

impl From<String> for AddonStatus {
    fn from(value: String) -> Self {
        AddonStatus::from(value.as_str())
    }
}

impl From<AddonStatus> for String {
    fn from(value: AddonStatus) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for AddonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of an asynchronous update sub-operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UpdateStatus {
    InProgress,
    Failed,
    Cancelled,
    Successful,
    Other(String),
}

impl UpdateStatus {
    pub fn as_str(&self) -> &str {
        match self {
            UpdateStatus::InProgress => "InProgress",
            UpdateStatus::Failed => "Failed",
            UpdateStatus::Cancelled => "Cancelled",
            UpdateStatus::Successful => "Successful",
            UpdateStatus::Other(other) => other,
        }
    }
}

impl From<&str> for UpdateStatus {
    fn from(value: &str) -> Self {
        match value {
            "InProgress" => UpdateStatus::InProgress,
            "Failed" => UpdateStatus::Failed,
            "Cancelled" => UpdateStatus::Cancelled,
            "Successful" => UpdateStatus::Successful,
            other => UpdateStatus::Other(other.to_owned()),
        }
    }
}

impl From<String> for UpdateStatus {
    fn from(value: String) -> Self {
        UpdateStatus::from(value.as_str())
    }
}

impl From<UpdateStatus> for String {
    fn from(value: UpdateStatus) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the control plane treats fields changed out-of-band when applying an add-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolveConflicts {
    None,
    Overwrite,
    /// Only valid on update and through the legacy attribute.
    Preserve,
}

impl ResolveConflicts {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveConflicts::None => "NONE",
            ResolveConflicts::Overwrite => "OVERWRITE",
            ResolveConflicts::Preserve => "PRESERVE",
        }
    }
}

impl fmt::Display for ResolveConflicts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResolveConflicts {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NONE" => Ok(ResolveConflicts::None),
            "OVERWRITE" => Ok(ResolveConflicts::Overwrite),
            "PRESERVE" => Ok(ResolveConflicts::Preserve),
            other => Err(format!("unknown conflict resolution: {}", other)),
        }
    }
}

/// Health issue attached to an add-on in a degraded or failed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthIssue {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub resource_ids: Vec<String>,
}

/// Error detail attached to a failed update sub-operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateErrorDetail {
    pub error_code: String,
    pub error_message: String,
    #[serde(default)]
    pub resource_ids: Vec<String>,
}

/// Remote representation of an add-on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addon {
    pub cluster_name: String,
    pub addon_name: String,
    pub addon_version: Option<String>,
    pub arn: String,
    pub status: AddonStatus,
    pub configuration_values: Option<String>,
    pub service_account_role_arn: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub health: Vec<HealthIssue>,
}

impl Addon {
    /// Whether any health issue reports a field-manager conflict.
    pub fn has_configuration_conflict(&self) -> bool {
        self.health
            .iter()
            .any(|issue| issue.code == CONFIGURATION_CONFLICT_CODE)
    }

    /// Health issues rendered as `code: message` pairs.
    pub fn health_summary(&self) -> String {
        if self.health.is_empty() {
            return "no health issues reported".to_owned();
        }
        self.health
            .iter()
            .map(|issue| format!("{}: {}", issue.code, issue.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Remote representation of an update sub-operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonUpdate {
    pub id: String,
    pub status: UpdateStatus,
    #[serde(default)]
    pub errors: Vec<UpdateErrorDetail>,
    pub created_at: DateTime<Utc>,
}

impl AddonUpdate {
    pub fn has_configuration_conflict(&self) -> bool {
        self.errors
            .iter()
            .any(|error| error.error_code == CONFIGURATION_CONFLICT_CODE)
    }

    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return "no errors reported".to_owned();
        }
        self.errors
            .iter()
            .map(|error| format!("{}: {}", error.error_code, error.error_message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Conflict policy that applies to one operation, plus the attribute it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectivePolicy {
    /// Attribute an operator should set to change the policy.
    pub attribute: &'static str,
    /// `None` leaves the choice to the control plane (which defaults to `NONE`).
    pub value: Option<ResolveConflicts>,
}

impl EffectivePolicy {
    pub fn is_overwrite(&self) -> bool {
        self.value == Some(ResolveConflicts::Overwrite)
    }
}

/// Validated desired state handed over by the declarative configuration layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DesiredAddon {
    pub cluster_name: String,
    pub addon_name: String,
    pub addon_version: Option<String>,
    pub configuration_values: Option<String>,
    pub service_account_role_arn: Option<String>,
    /// Legacy single policy; wins over the split attributes when both are set.
    pub resolve_conflicts: Option<ResolveConflicts>,
    pub resolve_conflicts_on_create: Option<ResolveConflicts>,
    pub resolve_conflicts_on_update: Option<ResolveConflicts>,
    pub preserve: bool,
    pub tags: BTreeMap<String, String>,
}

impl DesiredAddon {
    pub fn new(cluster_name: impl Into<String>, addon_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            addon_name: addon_name.into(),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.addon_version = Some(version.into());
        self
    }

    pub fn with_configuration_values(mut self, values: impl Into<String>) -> Self {
        self.configuration_values = Some(values.into());
        self
    }

    pub fn with_service_account_role_arn(mut self, arn: impl Into<String>) -> Self {
        self.service_account_role_arn = Some(arn.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> Result<AddonId, AddonError> {
        AddonId::new(self.cluster_name.as_str(), self.addon_name.as_str())
    }

    /// Whether both the legacy and a split policy attribute are populated.
    pub fn has_overlapping_policies(&self) -> bool {
        self.resolve_conflicts.is_some()
            && (self.resolve_conflicts_on_create.is_some()
                || self.resolve_conflicts_on_update.is_some())
    }

    /// Policy sent with the create request: legacy, then `resolve_conflicts_on_create`.
    pub fn create_policy(&self) -> EffectivePolicy {
        match (self.resolve_conflicts, self.resolve_conflicts_on_create) {
            (Some(value), _) => EffectivePolicy {
                attribute: "resolve_conflicts",
                value: Some(value),
            },
            (None, value) => EffectivePolicy {
                attribute: "resolve_conflicts_on_create",
                value,
            },
        }
    }

    /// Policy sent with update requests: legacy, then `resolve_conflicts_on_update`.
    pub fn update_policy(&self) -> EffectivePolicy {
        match (self.resolve_conflicts, self.resolve_conflicts_on_update) {
            (Some(value), _) => EffectivePolicy {
                attribute: "resolve_conflicts",
                value: Some(value),
            },
            (None, value) => EffectivePolicy {
                attribute: "resolve_conflicts_on_update",
                value,
            },
        }
    }

    /// Fill optional-computed fields the caller left unset from remote state.
    pub fn with_computed(&self, state: &AddonState) -> DesiredAddon {
        let mut merged = self.clone();
        if merged.addon_version.is_none() {
            merged.addon_version = state.addon_version.clone();
        }
        if merged.configuration_values.is_none() {
            merged.configuration_values = state.configuration_values.clone();
        }
        merged
    }

    /// Syntax checks normally applied by the schema layer.
    pub fn validate(&self) -> Result<(), AddonError> {
        validate_cluster_name(&self.cluster_name)?;
        if self.addon_name.trim().is_empty() {
            return Err(AddonError::InvalidInput("addon_name must not be empty".into()));
        }
        self.id()?;
        if let Some(version) = &self.addon_version {
            validate_addon_version(version)?;
        }
        if let Some(arn) = &self.service_account_role_arn {
            validate_arn(arn)?;
        }
        if self.resolve_conflicts_on_create == Some(ResolveConflicts::Preserve) {
            return Err(AddonError::InvalidInput(
                "resolve_conflicts_on_create must be one of NONE, OVERWRITE".into(),
            ));
        }
        Ok(())
    }
}

fn validate_cluster_name(name: &str) -> Result<(), AddonError> {
    let mut chars = name.chars();
    let valid_first = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid_first || !valid_rest || name.len() > MAX_CLUSTER_NAME_LEN {
        return Err(AddonError::InvalidInput(format!(
            "cluster_name ({name}) must be 1-{MAX_CLUSTER_NAME_LEN} characters, start with an \
             alphanumeric character, and contain only alphanumerics, hyphens, and underscores"
        )));
    }
    Ok(())
}

fn validate_addon_version(version: &str) -> Result<(), AddonError> {
    let parsed = version
        .strip_prefix('v')
        .and_then(|rest| semver::Version::parse(rest).ok());
    if parsed.is_none() {
        return Err(AddonError::InvalidInput(format!(
            "addon_version ({version}) must follow semantic version format (e.g. v1.2.0)"
        )));
    }
    Ok(())
}

fn validate_arn(arn: &str) -> Result<(), AddonError> {
    let parts: Vec<&str> = arn.splitn(6, ':').collect();
    let well_formed = parts.len() == 6
        && parts[0] == "arn"
        && !parts[1].is_empty()
        && !parts[2].is_empty()
        && !parts[5].is_empty();
    if !well_formed {
        return Err(AddonError::InvalidInput(format!(
            "service_account_role_arn ({arn}) is an invalid ARN"
        )));
    }
    Ok(())
}
