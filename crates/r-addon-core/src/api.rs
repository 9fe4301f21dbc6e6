//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on convergence engine and its building blocks."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
//! Remote control-plane contract.
//!
//! The engine never talks to the network itself; it drives an [`AddonApi`]
//! implementation supplied by the embedding provider (or the fake control
//! plane in `r-addon-testharness`).

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::model::{Addon, AddonUpdate, ResolveConflicts};

/// Errors reported by the remote control plane, grouped by exception family.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("ResourceNotFoundException: {0}")]
    ResourceNotFound(String),
    #[error("InvalidParameterException: {0}")]
    InvalidParameter(String),
    #[error("ResourceInUseException: {0}")]
    ResourceInUse(String),
    #[error("InvalidRequestException: {0}")]
    InvalidRequest(String),
    #[error("ThrottlingException: {0}")]
    Throttling(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{code}: {message}")]
    Service { code: String, message: String },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::ResourceNotFound(_))
    }

    /// Failures that are expected to clear on their own.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Throttling(_) | ApiError::Transport(_))
    }

    /// The control plane rejects a create while a previous instance with the same
    /// name is still being cleaned up, or while the role it depends on has not
    /// propagated yet.
    pub fn is_prior_instance_cleanup(&self) -> bool {
        match self {
            ApiError::InvalidParameter(message) => {
                message.contains("CREATE_FAILED") || message.contains("does not exist")
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAddonRequest {
    pub cluster_name: String,
    pub addon_name: String,
    pub addon_version: Option<String>,
    pub configuration_values: Option<String>,
    pub service_account_role_arn: Option<String>,
    pub resolve_conflicts: Option<ResolveConflicts>,
    pub tags: BTreeMap<String, String>,
    /// Idempotency token, unique per create call.
    pub client_request_token: String,
}

/// Update request. `None` fields are omitted; an empty role ARN clears the role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAddonRequest {
    pub cluster_name: String,
    pub addon_name: String,
    pub addon_version: Option<String>,
    pub configuration_values: Option<String>,
    pub service_account_role_arn: Option<String>,
    pub resolve_conflicts: Option<ResolveConflicts>,
    pub client_request_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteAddonRequest {
    pub cluster_name: String,
    pub addon_name: String,
    /// Keep the in-cluster software running after removing the add-on record.
    pub preserve: bool,
}

/// Asynchronous control-plane operations the engine relies on.
#[async_trait]
pub trait AddonApi: Send + Sync {
    /// Start creating an add-on. Completion is observed by polling.
    async fn create_addon(&self, request: CreateAddonRequest) -> Result<Addon, ApiError>;

    async fn describe_addon(&self, cluster_name: &str, addon_name: &str)
        -> Result<Addon, ApiError>;

    /// Start an update and return the identifier of the update sub-operation.
    async fn update_addon(&self, request: UpdateAddonRequest) -> Result<AddonUpdate, ApiError>;

    async fn describe_addon_update(
        &self,
        cluster_name: &str,
        addon_name: &str,
        update_id: &str,
    ) -> Result<AddonUpdate, ApiError>;

    async fn delete_addon(&self, request: DeleteAddonRequest) -> Result<(), ApiError>;

    /// Add or overwrite tags on the add-on ARN; other keys are left alone.
    async fn tag_resource(&self, arn: &str, tags: BTreeMap<String, String>)
        -> Result<(), ApiError>;

    /// Remove the given tag keys from the add-on ARN.
    async fn untag_resource(&self, arn: &str, keys: Vec<String>) -> Result<(), ApiError>;
}
