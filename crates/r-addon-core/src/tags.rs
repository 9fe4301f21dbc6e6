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

use r_addon_common::TagConfig;
use serde::Serialize;

/// User-managed tags plus the computed superset including provider defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagSet {
    pub tags: BTreeMap<String, String>,
    pub tags_all: BTreeMap<String, String>,
}

/// Provider-level tag rules applied on the way in and out of the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPolicy {
    default_tags: BTreeMap<String, String>,
    ignore_key_prefixes: Vec<String>,
    ignore_keys: Vec<String>,
}

impl Default for TagPolicy {
    fn default() -> Self {
        Self::from_config(&TagConfig::default())
    }
}

impl TagPolicy {
    pub fn from_config(config: &TagConfig) -> Self {
        Self {
            default_tags: config
                .default_tags
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            ignore_key_prefixes: config.ignore_key_prefixes.clone(),
            ignore_keys: config.ignore_keys.clone(),
        }
    }

    pub fn with_default_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_tags.insert(key.into(), value.into());
        self
    }

    pub fn is_ignored(&self, key: &str) -> bool {
        self.ignore_keys.iter().any(|k| k == key)
            || self
                .ignore_key_prefixes
                .iter()
                .any(|prefix| key.starts_with(prefix.as_str()))
    }

    /// Tags sent on create: provider defaults overlaid by resource tags.
    pub fn tags_in(&self, resource_tags: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        self.default_tags
            .iter()
            .chain(resource_tags.iter())
            .filter(|(key, _)| !self.is_ignored(key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Split remote tags into the user-managed set and the full computed set.
    ///
    /// A key stays in `tags` unless it matches a default tag with the same value.
    pub fn tags_out(&self, remote: &BTreeMap<String, String>) -> TagSet {
        let tags_all: BTreeMap<String, String> = remote
            .iter()
            .filter(|(key, _)| !self.is_ignored(key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let tags = tags_all
            .iter()
            .filter(|(key, value)| self.default_tags.get(key.as_str()) != Some(*value))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        TagSet { tags, tags_all }
    }

    /// Keys to upsert and keys to remove to move remote tags from `current` to `desired`.
    pub fn diff(
        &self,
        current: &BTreeMap<String, String>,
        desired: &BTreeMap<String, String>,
    ) -> (BTreeMap<String, String>, Vec<String>) {
        let upserts = desired
            .iter()
            .filter(|(key, value)| current.get(key.as_str()) != Some(*value))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let removals = current
            .keys()
            .filter(|key| !desired.contains_key(key.as_str()) && !self.is_ignored(key))
            .cloned()
            .collect();
        (upserts, removals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn resource_tags_override_defaults_on_the_way_in() {
        let policy = TagPolicy::default()
            .with_default_tag("team", "platform")
            .with_default_tag("env", "prod");
        let tags = policy.tags_in(&map(&[("env", "staging"), ("aws:cloudformation", "x")]));
        assert_eq!(tags, map(&[("env", "staging"), ("team", "platform")]));
    }

    #[test]
    fn default_tags_are_hidden_from_user_set() {
        let policy = TagPolicy::default().with_default_tag("team", "platform");
        let set = policy.tags_out(&map(&[
            ("team", "platform"),
            ("owner", "alice"),
            ("aws:eks:cluster-name", "cluster-a"),
        ]));
        assert_eq!(set.tags, map(&[("owner", "alice")]));
        assert_eq!(set.tags_all, map(&[("owner", "alice"), ("team", "platform")]));
    }

    #[test]
    fn overridden_default_stays_user_managed() {
        let policy = TagPolicy::default().with_default_tag("team", "platform");
        let set = policy.tags_out(&map(&[("team", "data")]));
        assert_eq!(set.tags, map(&[("team", "data")]));
    }

    #[test]
    fn diff_skips_ignored_keys() {
        let policy = TagPolicy::default();
        let (upserts, removals) = policy.diff(
            &map(&[("a", "1"), ("b", "2"), ("aws:managed", "yes")]),
            &map(&[("a", "1"), ("c", "3")]),
        );
        assert_eq!(upserts, map(&[("c", "3")]));
        assert_eq!(removals, vec!["b".to_owned()]);
    }
}
