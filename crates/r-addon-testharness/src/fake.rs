//! ---
//! addon_section: "11-simulation"
//! addon_subsection: "01-bootstrap"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "In-memory control plane used by scenarios and integration tests."
//! addon_version: "v0.1.0"
//! addon_owner: "tbd"
//! ---
//! Scripted, in-memory implementation of [`AddonApi`].
//!
//! Every asynchronous transition is driven by describe calls: each poll of an
//! add-on (or of an update) consumes one scripted step, and the last status
//! sticks once the script runs out. This keeps tests deterministic without
//! relying on wall-clock progress.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use r_addon_core::api::{AddonApi, ApiError, CreateAddonRequest, DeleteAddonRequest, UpdateAddonRequest};
use r_addon_core::model::{
    Addon, AddonStatus, AddonUpdate, HealthIssue, UpdateErrorDetail, UpdateStatus,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Version reported when a create request leaves the version unset.
pub const DEFAULT_ADDON_VERSION: &str = "v1.0.0-eksbuild.1";

const ACCOUNT: &str = "123456789012";
const REGION: &str = "eu-west-1";

/// One scripted observation of an add-on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FakeStep {
    Status(AddonStatus),
    /// The add-on disappears; later describes report not-found.
    Removed,
}

impl From<AddonStatus> for FakeStep {
    fn from(status: AddonStatus) -> Self {
        FakeStep::Status(status)
    }
}

/// Request observed by the fake, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedRequest {
    Create(CreateAddonRequest),
    Update(UpdateAddonRequest),
    Delete(DeleteAddonRequest),
    Tag {
        arn: String,
        tags: BTreeMap<String, String>,
    },
    Untag {
        arn: String,
        keys: Vec<String>,
    },
}

#[derive(Debug, Clone)]
struct UpdateScript {
    statuses: VecDeque<UpdateStatus>,
    errors: Vec<UpdateErrorDetail>,
}

impl Default for UpdateScript {
    fn default() -> Self {
        Self {
            statuses: VecDeque::from([UpdateStatus::InProgress, UpdateStatus::Successful]),
            errors: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct TrackedUpdate {
    key: (String, String),
    request: UpdateAddonRequest,
    current: AddonUpdate,
    script: UpdateScript,
    applied: bool,
}

#[derive(Debug)]
struct TrackedAddon {
    addon: Addon,
    pending: VecDeque<FakeStep>,
    /// Set by a delete request; keeps the in-cluster objects once the add-on is gone.
    preserve: bool,
}

#[derive(Debug, Default)]
struct Inner {
    addons: BTreeMap<(String, String), TrackedAddon>,
    create_scripts: HashMap<(String, String), VecDeque<FakeStep>>,
    delete_scripts: HashMap<(String, String), VecDeque<FakeStep>>,
    update_scripts: HashMap<(String, String), UpdateScript>,
    create_health: HashMap<(String, String), Vec<HealthIssue>>,
    create_failures: VecDeque<ApiError>,
    update_failures: VecDeque<ApiError>,
    delete_failures: VecDeque<ApiError>,
    describe_failures: VecDeque<ApiError>,
    tag_failures: VecDeque<ApiError>,
    /// Add-ons whose workloads are running in the cluster.
    in_cluster: BTreeSet<(String, String)>,
    updates: HashMap<String, TrackedUpdate>,
    requests: Vec<RecordedRequest>,
    describe_calls: usize,
    next_update: u64,
}

/// In-memory control plane with scripted status progressions.
#[derive(Debug, Default)]
pub struct FakeControlPlane {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
}

fn key(cluster_name: &str, addon_name: &str) -> (String, String) {
    (cluster_name.to_owned(), addon_name.to_owned())
}

fn not_found(cluster_name: &str, addon_name: &str) -> ApiError {
    ApiError::ResourceNotFound(format!(
        "No addon: {addon_name} found in cluster: {cluster_name}"
    ))
}

fn default_create_script() -> VecDeque<FakeStep> {
    VecDeque::from([
        FakeStep::Status(AddonStatus::Creating),
        FakeStep::Status(AddonStatus::Active),
    ])
}

fn default_delete_script() -> VecDeque<FakeStep> {
    VecDeque::from([FakeStep::Status(AddonStatus::Deleting), FakeStep::Removed])
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` (tokio time, so paused clocks still advance).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Steps observed by describe calls after the next create of this add-on.
    pub fn script_create<I, S>(&self, cluster_name: &str, addon_name: &str, steps: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<FakeStep>,
    {
        self.inner.lock().create_scripts.insert(
            key(cluster_name, addon_name),
            steps.into_iter().map(Into::into).collect(),
        );
    }

    /// Steps observed by describe calls after the next delete of this add-on.
    pub fn script_delete<I, S>(&self, cluster_name: &str, addon_name: &str, steps: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<FakeStep>,
    {
        self.inner.lock().delete_scripts.insert(
            key(cluster_name, addon_name),
            steps.into_iter().map(Into::into).collect(),
        );
    }

    /// Statuses and errors reported by the next update of this add-on.
    pub fn script_update<I>(
        &self,
        cluster_name: &str,
        addon_name: &str,
        statuses: I,
        errors: Vec<UpdateErrorDetail>,
    ) where
        I: IntoIterator<Item = UpdateStatus>,
    {
        self.inner.lock().update_scripts.insert(
            key(cluster_name, addon_name),
            UpdateScript {
                statuses: statuses.into_iter().collect(),
                errors,
            },
        );
    }

    pub fn fail_next_create(&self, error: ApiError) {
        self.inner.lock().create_failures.push_back(error);
    }

    pub fn fail_next_update(&self, error: ApiError) {
        self.inner.lock().update_failures.push_back(error);
    }

    pub fn fail_next_delete(&self, error: ApiError) {
        self.inner.lock().delete_failures.push_back(error);
    }

    pub fn fail_next_describe(&self, error: ApiError) {
        self.inner.lock().describe_failures.push_back(error);
    }

    /// Fail the next tag or untag call.
    pub fn fail_next_tag(&self, error: ApiError) {
        self.inner.lock().tag_failures.push_back(error);
    }

    /// Seed an add-on that already exists remotely.
    pub fn insert_addon(&self, addon: Addon) {
        let key = key(&addon.cluster_name, &addon.addon_name);
        let mut inner = self.inner.lock();
        inner.in_cluster.insert(key.clone());
        inner.addons.insert(
            key,
            TrackedAddon {
                addon,
                pending: VecDeque::new(),
                preserve: false,
            },
        );
    }

    /// Remove an add-on behind the engine's back.
    pub fn remove_out_of_band(&self, cluster_name: &str, addon_name: &str) -> bool {
        let key = key(cluster_name, addon_name);
        let mut inner = self.inner.lock();
        inner.in_cluster.remove(&key);
        inner.addons.remove(&key).is_some()
    }

    /// Whether the add-on's workloads are still running in the cluster. They
    /// survive a delete issued with `preserve`.
    pub fn has_in_cluster_objects(&self, cluster_name: &str, addon_name: &str) -> bool {
        self.inner
            .lock()
            .in_cluster
            .contains(&key(cluster_name, addon_name))
    }

    /// Attach health issues to the add-on, or to the next one created under this key.
    pub fn set_health(&self, cluster_name: &str, addon_name: &str, health: Vec<HealthIssue>) {
        let mut inner = self.inner.lock();
        let key = key(cluster_name, addon_name);
        match inner.addons.get_mut(&key) {
            Some(tracked) => tracked.addon.health = health,
            None => {
                inner.create_health.insert(key, health);
            }
        }
    }

    pub fn addon(&self, cluster_name: &str, addon_name: &str) -> Option<Addon> {
        self.inner
            .lock()
            .addons
            .get(&key(cluster_name, addon_name))
            .map(|tracked| tracked.addon.clone())
    }

    pub fn addon_count(&self) -> usize {
        self.inner.lock().addons.len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.lock().requests.clone()
    }

    pub fn create_requests(&self) -> Vec<CreateAddonRequest> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                RecordedRequest::Create(create) => Some(create),
                _ => None,
            })
            .collect()
    }

    pub fn update_requests(&self) -> Vec<UpdateAddonRequest> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                RecordedRequest::Update(update) => Some(update),
                _ => None,
            })
            .collect()
    }

    pub fn delete_requests(&self) -> Vec<DeleteAddonRequest> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                RecordedRequest::Delete(delete) => Some(delete),
                _ => None,
            })
            .collect()
    }

    pub fn describe_calls(&self) -> usize {
        self.inner.lock().describe_calls
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn arn_for(cluster_name: &str, addon_name: &str) -> String {
    format!(
        "arn:aws:eks:{REGION}:{ACCOUNT}:addon/{cluster_name}/{addon_name}/{}",
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

#[async_trait]
impl AddonApi for FakeControlPlane {
    async fn create_addon(&self, request: CreateAddonRequest) -> Result<Addon, ApiError> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock();
        inner.requests.push(RecordedRequest::Create(request.clone()));
        if let Some(error) = inner.create_failures.pop_front() {
            debug!(addon = %request.addon_name, error = %error, "injected create failure");
            return Err(error);
        }
        let key = key(&request.cluster_name, &request.addon_name);
        if inner.addons.contains_key(&key) {
            return Err(ApiError::ResourceInUse("Addon already exists.".into()));
        }
        let now = Utc::now();
        let mut tags = request.tags.clone();
        tags.insert("aws:eks:cluster-name".into(), request.cluster_name.clone());
        let addon = Addon {
            cluster_name: request.cluster_name.clone(),
            addon_name: request.addon_name.clone(),
            addon_version: Some(
                request
                    .addon_version
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ADDON_VERSION.to_owned()),
            ),
            arn: arn_for(&request.cluster_name, &request.addon_name),
            status: AddonStatus::Creating,
            configuration_values: request.configuration_values.clone(),
            service_account_role_arn: request.service_account_role_arn.clone(),
            created_at: now,
            modified_at: now,
            tags,
            health: inner.create_health.remove(&key).unwrap_or_default(),
        };
        let pending = inner
            .create_scripts
            .remove(&key)
            .unwrap_or_else(default_create_script);
        inner.in_cluster.insert(key.clone());
        inner.addons.insert(
            key,
            TrackedAddon {
                addon: addon.clone(),
                pending,
                preserve: false,
            },
        );
        Ok(addon)
    }

    async fn describe_addon(&self, cluster_name: &str, addon_name: &str) -> Result<Addon, ApiError> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock();
        inner.describe_calls += 1;
        if let Some(error) = inner.describe_failures.pop_front() {
            return Err(error);
        }
        let key = key(cluster_name, addon_name);
        let Some(tracked) = inner.addons.get_mut(&key) else {
            return Err(not_found(cluster_name, addon_name));
        };
        match tracked.pending.pop_front() {
            Some(FakeStep::Status(status)) => {
                tracked.addon.status = status;
                tracked.addon.modified_at = Utc::now();
            }
            Some(FakeStep::Removed) => {
                let preserve = tracked.preserve;
                inner.addons.remove(&key);
                if !preserve {
                    inner.in_cluster.remove(&key);
                }
                return Err(not_found(cluster_name, addon_name));
            }
            None => {}
        }
        Ok(tracked.addon.clone())
    }

    async fn update_addon(&self, request: UpdateAddonRequest) -> Result<AddonUpdate, ApiError> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock();
        inner.requests.push(RecordedRequest::Update(request.clone()));
        if let Some(error) = inner.update_failures.pop_front() {
            return Err(error);
        }
        let key = key(&request.cluster_name, &request.addon_name);
        let Some(tracked) = inner.addons.get_mut(&key) else {
            return Err(not_found(&request.cluster_name, &request.addon_name));
        };
        tracked.addon.status = AddonStatus::Updating;
        inner.next_update += 1;
        let update_id = format!("update-{:04}", inner.next_update);
        let script = inner.update_scripts.remove(&key).unwrap_or_default();
        let current = AddonUpdate {
            id: update_id.clone(),
            status: UpdateStatus::InProgress,
            errors: Vec::new(),
            created_at: Utc::now(),
        };
        inner.updates.insert(
            update_id,
            TrackedUpdate {
                key,
                request,
                current: current.clone(),
                script,
                applied: false,
            },
        );
        Ok(current)
    }

    async fn describe_addon_update(
        &self,
        cluster_name: &str,
        addon_name: &str,
        update_id: &str,
    ) -> Result<AddonUpdate, ApiError> {
        self.simulate_latency().await;
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.describe_calls += 1;
        let Some(update) = inner.updates.get_mut(update_id) else {
            return Err(ApiError::ResourceNotFound(format!("No update: {update_id}")));
        };
        if update.key != key(cluster_name, addon_name) {
            return Err(ApiError::InvalidParameter(format!(
                "update {update_id} does not belong to {cluster_name}/{addon_name}"
            )));
        }
        if let Some(status) = update.script.statuses.pop_front() {
            update.current.status = status;
        }
        let terminal = !matches!(update.current.status, UpdateStatus::InProgress);
        if terminal && !update.applied {
            update.applied = true;
            if let Some(tracked) = inner.addons.get_mut(&update.key) {
                match update.current.status {
                    UpdateStatus::Successful => {
                        let request = &update.request;
                        if let Some(version) = &request.addon_version {
                            tracked.addon.addon_version = Some(version.clone());
                        }
                        if let Some(values) = &request.configuration_values {
                            tracked.addon.configuration_values = Some(values.clone());
                        }
                        if let Some(role) = &request.service_account_role_arn {
                            tracked.addon.service_account_role_arn =
                                (!role.is_empty()).then(|| role.clone());
                        }
                        tracked.addon.status = AddonStatus::Active;
                    }
                    _ => {
                        update.current.errors = update.script.errors.clone();
                        tracked.addon.status = AddonStatus::UpdateFailed;
                    }
                }
                tracked.addon.modified_at = Utc::now();
            }
        }
        Ok(update.current.clone())
    }

    async fn delete_addon(&self, request: DeleteAddonRequest) -> Result<(), ApiError> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock();
        inner.requests.push(RecordedRequest::Delete(request.clone()));
        if let Some(error) = inner.delete_failures.pop_front() {
            return Err(error);
        }
        let key = key(&request.cluster_name, &request.addon_name);
        let script = inner
            .delete_scripts
            .remove(&key)
            .unwrap_or_else(default_delete_script);
        let Some(tracked) = inner.addons.get_mut(&key) else {
            return Err(not_found(&request.cluster_name, &request.addon_name));
        };
        tracked.addon.status = AddonStatus::Deleting;
        tracked.pending = script;
        tracked.preserve = request.preserve;
        Ok(())
    }

    async fn tag_resource(
        &self,
        arn: &str,
        tags: BTreeMap<String, String>,
    ) -> Result<(), ApiError> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock();
        inner.requests.push(RecordedRequest::Tag {
            arn: arn.to_owned(),
            tags: tags.clone(),
        });
        if let Some(error) = inner.tag_failures.pop_front() {
            return Err(error);
        }
        let tracked = inner
            .addons
            .values_mut()
            .find(|tracked| tracked.addon.arn == arn)
            .ok_or_else(|| ApiError::ResourceNotFound(format!("No resource: {arn}")))?;
        tracked.addon.tags.extend(tags);
        Ok(())
    }

    async fn untag_resource(&self, arn: &str, keys: Vec<String>) -> Result<(), ApiError> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock();
        inner.requests.push(RecordedRequest::Untag {
            arn: arn.to_owned(),
            keys: keys.clone(),
        });
        if let Some(error) = inner.tag_failures.pop_front() {
            return Err(error);
        }
        let tracked = inner
            .addons
            .values_mut()
            .find(|tracked| tracked.addon.arn == arn)
            .ok_or_else(|| ApiError::ResourceNotFound(format!("No resource: {arn}")))?;
        for key in keys {
            tracked.addon.tags.remove(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request(cluster: &str, addon: &str) -> CreateAddonRequest {
        CreateAddonRequest {
            cluster_name: cluster.into(),
            addon_name: addon.into(),
            addon_version: None,
            configuration_values: None,
            service_account_role_arn: None,
            resolve_conflicts: None,
            tags: BTreeMap::new(),
            client_request_token: "token".into(),
        }
    }

    #[tokio::test]
    async fn describe_walks_create_script_then_sticks() {
        let fake = FakeControlPlane::new();
        fake.script_create(
            "c",
            "a",
            [AddonStatus::Creating, AddonStatus::Creating, AddonStatus::Active],
        );
        fake.create_addon(create_request("c", "a")).await.unwrap();
        let statuses: Vec<_> = poll_statuses(&fake, 4).await;
        assert_eq!(statuses, vec!["CREATING", "CREATING", "ACTIVE", "ACTIVE"]);
        assert_eq!(
            fake.addon("c", "a").unwrap().addon_version.as_deref(),
            Some(DEFAULT_ADDON_VERSION)
        );
    }

    async fn poll_statuses(fake: &FakeControlPlane, n: usize) -> Vec<String> {
        let mut out = Vec::new();
        for _ in 0..n {
            out.push(fake.describe_addon("c", "a").await.unwrap().status.to_string());
        }
        out
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let fake = FakeControlPlane::new();
        fake.create_addon(create_request("c", "a")).await.unwrap();
        let err = fake.create_addon(create_request("c", "a")).await.unwrap_err();
        assert!(matches!(err, ApiError::ResourceInUse(_)));
        assert_eq!(fake.addon_count(), 1);
    }

    #[tokio::test]
    async fn delete_removes_after_script() {
        let fake = FakeControlPlane::new();
        fake.create_addon(create_request("c", "a")).await.unwrap();
        fake.delete_addon(DeleteAddonRequest {
            cluster_name: "c".into(),
            addon_name: "a".into(),
            preserve: true,
        })
        .await
        .unwrap();
        assert_eq!(
            fake.describe_addon("c", "a").await.unwrap().status,
            AddonStatus::Deleting
        );
        assert!(fake.describe_addon("c", "a").await.unwrap_err().is_not_found());
        assert!(fake.delete_requests()[0].preserve);
        assert!(fake.has_in_cluster_objects("c", "a"));
    }

    #[tokio::test]
    async fn delete_without_preserve_tears_down_workloads() {
        let fake = FakeControlPlane::new();
        fake.create_addon(create_request("c", "a")).await.unwrap();
        assert!(fake.has_in_cluster_objects("c", "a"));
        fake.delete_addon(DeleteAddonRequest {
            cluster_name: "c".into(),
            addon_name: "a".into(),
            preserve: false,
        })
        .await
        .unwrap();
        // Workloads stay up while the add-on is still deleting.
        fake.describe_addon("c", "a").await.unwrap();
        assert!(fake.has_in_cluster_objects("c", "a"));
        assert!(fake.describe_addon("c", "a").await.is_err());
        assert!(!fake.has_in_cluster_objects("c", "a"));
    }

    #[tokio::test]
    async fn injected_tag_failure_is_returned_once() {
        let fake = FakeControlPlane::new();
        let arn = fake.create_addon(create_request("c", "a")).await.unwrap().arn;
        fake.fail_next_tag(ApiError::Service {
            code: "AccessDeniedException".into(),
            message: "not authorized to tag".into(),
        });
        let tags = BTreeMap::from([("team".to_owned(), "platform".to_owned())]);
        assert!(fake.tag_resource(&arn, tags.clone()).await.is_err());
        fake.tag_resource(&arn, tags).await.unwrap();
        assert_eq!(
            fake.addon("c", "a").unwrap().tags.get("team").map(String::as_str),
            Some("platform")
        );
    }
}
