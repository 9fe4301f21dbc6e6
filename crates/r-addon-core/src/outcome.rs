//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on convergence engine and its building blocks."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use crate::diagnostics::Diagnostics;
use crate::error::AddonError;
use crate::identifier::AddonId;
use crate::state::AddonState;

/// How a missing remote add-on is reported by [`crate::AddonReconciler::read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// The caller just created or imported the add-on; not-found is an error.
    NewResource,
    /// Periodic refresh; not-found means the add-on was removed out of band.
    Refresh,
}

#[derive(Debug)]
pub enum ReadOutcome {
    Found(AddonState),
    /// Drop the add-on from tracked state.
    Gone,
}

impl ReadOutcome {
    pub fn state(&self) -> Option<&AddonState> {
        match self {
            ReadOutcome::Found(state) => Some(state),
            ReadOutcome::Gone => None,
        }
    }

    pub fn into_state(self) -> Option<AddonState> {
        match self {
            ReadOutcome::Found(state) => Some(state),
            ReadOutcome::Gone => None,
        }
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let mut diags = Diagnostics::new();
        if let ReadOutcome::Gone = self {
            diags.warning("add-on not found, removing from state", None);
        }
        diags
    }
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created(AddonState),
    /// The create request was accepted but the add-on never became healthy.
    /// The identifier stays tracked so the next apply replaces it.
    Tainted {
        id: AddonId,
        error: AddonError,
        warning: String,
    },
}

impl CreateOutcome {
    /// Identifier to persist, present in both outcomes.
    pub fn id(&self) -> &AddonId {
        match self {
            CreateOutcome::Created(state) => &state.id,
            CreateOutcome::Tainted { id, .. } => id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let mut diags = Diagnostics::new();
        if let CreateOutcome::Tainted { error, warning, .. } = self {
            diags.push_error(error);
            diags.warning(warning.clone(), None);
        }
        diags
    }
}

#[derive(Debug)]
pub enum DeleteOutcome {
    Deleted,
    /// Delete was accepted but the wait did not confirm removal. Tracking is
    /// dropped regardless.
    Pending { error: AddonError },
}

impl DeleteOutcome {
    pub fn diagnostics(&self) -> Diagnostics {
        match self {
            DeleteOutcome::Deleted => Diagnostics::new(),
            DeleteOutcome::Pending { error } => Diagnostics::from_error(error),
        }
    }
}
