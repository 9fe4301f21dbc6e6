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

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::identifier::AddonId;
use crate::model::{Addon, AddonStatus};
use crate::tags::TagPolicy;

/// Tracked state mirrored from the remote add-on after every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonState {
    pub id: AddonId,
    pub addon_version: Option<String>,
    pub arn: String,
    pub status: AddonStatus,
    pub configuration_values: Option<String>,
    pub service_account_role_arn: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub tags: BTreeMap<String, String>,
    pub tags_all: BTreeMap<String, String>,
}

impl AddonState {
    pub fn from_remote(id: AddonId, addon: Addon, tags: &TagPolicy) -> Self {
        let tag_set = tags.tags_out(&addon.tags);
        Self {
            id,
            addon_version: addon.addon_version,
            arn: addon.arn,
            status: addon.status,
            configuration_values: addon.configuration_values,
            service_account_role_arn: addon.service_account_role_arn,
            created_at: addon.created_at,
            modified_at: addon.modified_at,
            tags: tag_set.tags,
            tags_all: tag_set.tags_all,
        }
    }

    pub fn cluster_name(&self) -> &str {
        self.id.cluster_name()
    }

    pub fn addon_name(&self) -> &str {
        self.id.addon_name()
    }

    /// Creation timestamp in RFC 3339 form.
    pub fn created_at_rfc3339(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn modified_at_rfc3339(&self) -> String {
        self.modified_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}
