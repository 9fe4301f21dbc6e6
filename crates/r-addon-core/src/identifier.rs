//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on convergence engine and its building blocks."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
//! Composite identifier codec.
//!
//! An add-on is identified locally by `<cluster>:<addon>`. The string is the only
//! state persisted besides mirrored field values, so the format must stay stable
//! across releases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AddonError;

/// Reserved separator between the cluster and add-on names.
pub const ID_SEPARATOR: char = ':';

/// Composite key of an add-on: the owning cluster plus the add-on name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AddonId {
    cluster_name: String,
    addon_name: String,
}

impl AddonId {
    /// Build an identifier, rejecting empty parts and parts containing the separator.
    pub fn new(
        cluster_name: impl Into<String>,
        addon_name: impl Into<String>,
    ) -> Result<Self, AddonError> {
        let cluster_name = cluster_name.into();
        let addon_name = addon_name.into();
        for (field, value) in [("cluster_name", &cluster_name), ("addon_name", &addon_name)] {
            if value.is_empty() {
                return Err(AddonError::InvalidInput(format!("{field} must not be empty")));
            }
            if value.contains(ID_SEPARATOR) {
                return Err(AddonError::InvalidInput(format!(
                    "{field} ({value}) must not contain '{ID_SEPARATOR}'"
                )));
            }
        }
        Ok(Self {
            cluster_name,
            addon_name,
        })
    }

    /// Decode a composite identifier produced by [`AddonId::encode`].
    pub fn parse(id: &str) -> Result<Self, AddonError> {
        let malformed = |reason| AddonError::MalformedIdentifier {
            id: id.to_owned(),
            reason,
        };
        let mut parts = id.split(ID_SEPARATOR);
        let (Some(cluster_name), Some(addon_name), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed("exactly one separator required"));
        };
        if cluster_name.is_empty() || addon_name.is_empty() {
            return Err(malformed("empty component"));
        }
        Ok(Self {
            cluster_name: cluster_name.to_owned(),
            addon_name: addon_name.to_owned(),
        })
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn addon_name(&self) -> &str {
        &self.addon_name
    }

    pub fn encode(&self) -> String {
        format!("{}{}{}", self.cluster_name, ID_SEPARATOR, self.addon_name)
    }
}

/// Encode `(cluster, addon)` into its composite string form.
pub fn encode(cluster_name: &str, addon_name: &str) -> Result<String, AddonError> {
    AddonId::new(cluster_name, addon_name).map(|id| id.encode())
}

/// Decode a composite identifier into `(cluster, addon)`.
pub fn decode(id: &str) -> Result<(String, String), AddonError> {
    AddonId::parse(id).map(|id| (id.cluster_name, id.addon_name))
}

impl fmt::Display for AddonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.cluster_name, ID_SEPARATOR, self.addon_name)
    }
}

impl FromStr for AddonId {
    type Err = AddonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AddonId {
    type Error = AddonError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AddonId> for String {
    fn from(value: AddonId) -> Self {
        value.encode()
    }
}
