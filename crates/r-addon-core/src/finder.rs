//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on convergence engine and its building blocks."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
//! Read-only queries against the control plane.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::api::{AddonApi, ApiError};
use crate::error::{AddonError, Operation};
use crate::identifier::AddonId;
use crate::model::{Addon, AddonUpdate};

/// Race a remote call against the cancellation token.
///
/// Remote failures keep the operation and the upstream error; callers test
/// for a missing resource with [`AddonError::is_not_found`].
pub(crate) async fn cancellable<T, F>(
    cancel: &CancellationToken,
    operation: Operation,
    id: &AddonId,
    call: F,
) -> Result<T, AddonError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AddonError::cancelled(operation, id)),
        result = call => result.map_err(|source| AddonError::remote(operation, id, source)),
    }
}

/// Fetch the remote add-on; a missing add-on reports
/// [`ErrorKind::NotFound`](crate::error::ErrorKind::NotFound).
pub async fn find_addon(
    api: &dyn AddonApi,
    id: &AddonId,
    cancel: &CancellationToken,
) -> Result<Addon, AddonError> {
    cancellable(
        cancel,
        Operation::Read,
        id,
        api.describe_addon(id.cluster_name(), id.addon_name()),
    )
    .await
}

/// Fetch one update sub-operation of the add-on.
pub async fn find_addon_update(
    api: &dyn AddonApi,
    id: &AddonId,
    update_id: &str,
    cancel: &CancellationToken,
) -> Result<AddonUpdate, AddonError> {
    cancellable(
        cancel,
        Operation::Read,
        id,
        api.describe_addon_update(id.cluster_name(), id.addon_name(), update_id),
    )
    .await
}
