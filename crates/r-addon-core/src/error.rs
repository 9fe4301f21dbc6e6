//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on convergence engine and its building blocks."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use std::fmt;
use std::time::Duration;

use crate::api::ApiError;
use crate::model::ResolveConflicts;

/// Lifecycle operation an error or log event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Import => "import",
        }
    }

    fn gerund(&self) -> &'static str {
        match self {
            Operation::Create => "creating",
            Operation::Read => "reading",
            Operation::Update => "updating",
            Operation::Delete => "deleting",
            Operation::Import => "importing",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification callers use to pick a recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedIdentifier,
    InvalidInput,
    TransientRemoteFailure,
    Remote,
    TerminalFailure,
    Timeout,
    Conflict,
    NotFound,
    Cancelled,
}

/// Errors surfaced by the convergence engine.
#[derive(Debug, thiserror::Error)]
pub enum AddonError {
    #[error("unexpected format for ID ({id}), expected cluster-name:addon-name ({reason})")]
    MalformedIdentifier { id: String, reason: &'static str },

    #[error("invalid add-on input: {0}")]
    InvalidInput(String),

    #[error("{} add-on ({id}): {source}", .operation.gerund())]
    Remote {
        operation: Operation,
        id: String,
        source: ApiError,
    },

    /// Raised by the engine itself; remote not-found responses stay [`AddonError::Remote`].
    #[error("add-on ({id}) not found")]
    NotFound { id: String },

    #[error("waiting for add-on ({id}) {operation}: unexpected state '{status}': {reason}")]
    TerminalFailure {
        operation: Operation,
        id: String,
        status: String,
        reason: String,
    },

    #[error(
        "waiting for add-on ({id}) {operation}: timeout after {timeout:?} (last state: '{}')",
        .last_status.as_deref().unwrap_or("unknown")
    )]
    Timeout {
        operation: Operation,
        id: String,
        last_status: Option<String>,
        timeout: Duration,
    },

    #[error("waiting for add-on ({id}) {operation}: configuration conflict: {detail}")]
    Conflict {
        operation: Operation,
        id: String,
        detail: String,
    },

    #[error("{operation} add-on ({id}): cancelled")]
    Cancelled { operation: Operation, id: String },

    #[error("{source}. Consider setting attribute \"{attribute}\" to \"{value}\"")]
    Remediation {
        source: Box<AddonError>,
        attribute: &'static str,
        value: ResolveConflicts,
    },
}

impl AddonError {
    pub(crate) fn remote(operation: Operation, id: impl fmt::Display, source: ApiError) -> Self {
        AddonError::Remote {
            operation,
            id: id.to_string(),
            source,
        }
    }

    pub(crate) fn cancelled(operation: Operation, id: impl fmt::Display) -> Self {
        AddonError::Cancelled {
            operation,
            id: id.to_string(),
        }
    }

    /// Classify the error; remediation wrappers report the kind of the wrapped failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AddonError::MalformedIdentifier { .. } => ErrorKind::MalformedIdentifier,
            AddonError::InvalidInput(_) => ErrorKind::InvalidInput,
            AddonError::Remote { source, .. } => {
                if source.is_not_found() {
                    ErrorKind::NotFound
                } else if source.is_transient() || source.is_prior_instance_cleanup() {
                    ErrorKind::TransientRemoteFailure
                } else {
                    ErrorKind::Remote
                }
            }
            AddonError::NotFound { .. } => ErrorKind::NotFound,
            AddonError::TerminalFailure { .. } => ErrorKind::TerminalFailure,
            AddonError::Timeout { .. } => ErrorKind::Timeout,
            AddonError::Conflict { .. } => ErrorKind::Conflict,
            AddonError::Cancelled { .. } => ErrorKind::Cancelled,
            AddonError::Remediation { source, .. } => source.kind(),
        }
    }

    /// Last remote status observed before a wait gave up, if any.
    pub fn last_status(&self) -> Option<&str> {
        match self {
            AddonError::Timeout { last_status, .. } => last_status.as_deref(),
            AddonError::TerminalFailure { status, .. } => Some(status),
            AddonError::Remediation { source, .. } => source.last_status(),
            _ => None,
        }
    }

    /// The attribute/value pair suggested to the operator, when one applies.
    pub fn remediation(&self) -> Option<(&'static str, ResolveConflicts)> {
        match self {
            AddonError::Remediation {
                attribute, value, ..
            } => Some((attribute, *value)),
            _ => None,
        }
    }

    /// Attach conflict-policy guidance to a wait failure.
    pub fn with_remediation(self, attribute: &'static str, value: ResolveConflicts) -> Self {
        AddonError::Remediation {
            source: Box::new(self),
            attribute,
            value,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind(), ErrorKind::Cancelled)
    }
}
