//! ---
//! addon_section: "15-testing-qa-runbook"
//! addon_subsection: "integration-tests"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Lifecycle engine tests against the in-memory control plane."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use r_addon_core::identifier;
use r_addon_core::{
    Addon, AddonError, AddonReconciler, AddonState, AddonStatus, ApiError, CancellationToken,
    CreateOutcome, DeleteOutcome, DesiredAddon, EngineSettings, ErrorKind, HealthIssue,
    LifecycleMetrics, ReadMode, ReadOutcome, ResolveConflicts, TagPolicy, UpdateErrorDetail,
    UpdateStatus,
};
use r_addon_testharness::{FakeControlPlane, FakeStep, RecordedRequest};
use tokio::time::{sleep, Instant};

const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/vpc-cni-irsa";

fn settings() -> EngineSettings {
    EngineSettings::default().with_waits(Duration::from_secs(60), Duration::from_secs(1))
}

fn harness() -> (Arc<FakeControlPlane>, AddonReconciler) {
    let fake = Arc::new(FakeControlPlane::new());
    let reconciler = AddonReconciler::new(fake.clone(), settings()).with_backoff_seed(7);
    (fake, reconciler)
}

fn vpc_cni() -> DesiredAddon {
    DesiredAddon::new("cluster-a", "vpc-cni").with_version("v1.2.0-eksbuild.1")
}

async fn create_active(reconciler: &AddonReconciler, desired: &DesiredAddon) -> AddonState {
    match reconciler
        .create(desired, &CancellationToken::new())
        .await
        .expect("create accepted")
    {
        CreateOutcome::Created(state) => state,
        CreateOutcome::Tainted { error, .. } => panic!("unexpected taint: {error}"),
    }
}

fn tainted(outcome: CreateOutcome) -> (String, AddonError, String) {
    match outcome {
        CreateOutcome::Tainted { id, error, warning } => (id.to_string(), error, warning),
        CreateOutcome::Created(state) => panic!("expected taint, add-on is {}", state.status),
    }
}

fn conflict_issue() -> HealthIssue {
    HealthIssue {
        code: "ConfigurationConflict".into(),
        message: "Conflicts found when trying to apply. Will not continue due to resolve conflicts mode."
            .into(),
        resource_ids: Vec::new(),
    }
}

#[test]
fn identifier_round_trips_and_rejects_malformed_input() {
    let id = identifier::encode("cluster-a", "vpc-cni").unwrap();
    assert_eq!(id, "cluster-a:vpc-cni");
    assert_eq!(
        identifier::decode(&id).unwrap(),
        ("cluster-a".to_owned(), "vpc-cni".to_owned())
    );

    for malformed in ["vpc-cni", "a:b:c", ":vpc-cni", "cluster-a:", ""] {
        let err = identifier::decode(malformed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedIdentifier, "{malformed}");
        assert!(err.to_string().starts_with("unexpected format for ID"));
    }
    assert!(identifier::encode("cluster:a", "vpc-cni").is_err());
}

#[tokio::test(start_paused = true)]
async fn create_waits_for_active_and_returns_state() {
    let (fake, reconciler) = harness();
    let state = create_active(&reconciler, &vpc_cni()).await;

    assert_eq!(state.id.to_string(), "cluster-a:vpc-cni");
    assert_eq!(state.status, AddonStatus::Active);
    assert_eq!(state.addon_version.as_deref(), Some("v1.2.0-eksbuild.1"));
    assert!(state.arn.starts_with("arn:aws:eks:"));
    assert!(state.tags_all.keys().all(|key| !key.starts_with("aws:")));
    assert_eq!(fake.addon_count(), 1);
    assert_eq!(fake.create_requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn second_create_of_existing_addon_is_rejected() {
    let (fake, reconciler) = harness();
    create_active(&reconciler, &vpc_cni()).await;

    let err = reconciler
        .create(&vpc_cni(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Remote);
    assert!(err.to_string().contains("ResourceInUseException"));
    assert_eq!(fake.addon_count(), 1);
    assert_eq!(fake.create_requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn create_retries_while_previous_instance_is_cleaned_up() {
    let (fake, reconciler) = harness();
    let metrics = LifecycleMetrics::standalone().unwrap();
    let reconciler = reconciler.with_metrics(metrics.clone());
    for _ in 0..2 {
        fake.fail_next_create(ApiError::InvalidParameter(
            "Addon vpc-cni is in CREATE_FAILED state and is being deleted".into(),
        ));
    }

    let state = create_active(&reconciler, &vpc_cni()).await;
    assert_eq!(state.status, AddonStatus::Active);

    let requests = fake.create_requests();
    assert_eq!(requests.len(), 3);
    assert_ne!(requests[0].client_request_token, requests[1].client_request_token);
    assert_ne!(requests[1].client_request_token, requests[2].client_request_token);

    let rendered = metrics.render().unwrap();
    assert!(rendered.contains("r_addon_create_retries_total{addon=\"vpc-cni\"} 2"));
}

#[tokio::test(start_paused = true)]
async fn create_does_not_retry_other_invalid_parameters() {
    let (fake, reconciler) = harness();
    fake.fail_next_create(ApiError::InvalidParameter(
        "configuration values are not valid JSON".into(),
    ));

    let err = reconciler
        .create(&vpc_cni(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Remote);
    assert_eq!(fake.create_requests().len(), 1);
    assert_eq!(fake.addon_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn create_retry_gives_up_after_propagation_budget() {
    let (fake, reconciler) = harness();
    for _ in 0..100 {
        fake.fail_next_create(ApiError::InvalidParameter(
            "Addon vpc-cni does not exist yet".into(),
        ));
    }

    let started = Instant::now();
    let err = reconciler
        .create(&vpc_cni(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransientRemoteFailure);
    assert!(started.elapsed() <= reconciler.settings().propagation_timeout);
    let attempts = fake.create_requests().len();
    assert!(attempts > 1 && attempts < 100, "attempts: {attempts}");
}

#[tokio::test(start_paused = true)]
async fn stalled_create_call_times_out_within_propagation_budget() {
    let fake = Arc::new(FakeControlPlane::new().with_latency(Duration::from_secs(600)));
    let reconciler = AddonReconciler::new(fake.clone(), settings());

    let started = Instant::now();
    let err = reconciler
        .create(&vpc_cni(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(started.elapsed(), reconciler.settings().propagation_timeout);
    assert_eq!(fake.addon_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn create_timeout_taints_the_addon() {
    let (fake, reconciler) = harness();
    fake.script_create("cluster-a", "vpc-cni", [AddonStatus::Creating]);

    let outcome = reconciler
        .create(&vpc_cni(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.id().to_string(), "cluster-a:vpc-cni");
    let diagnostics = outcome.diagnostics();
    assert!(diagnostics.has_errors());
    assert_eq!(diagnostics.len(), 2);

    let (id, error, warning) = tainted(outcome);
    assert_eq!(id, "cluster-a:vpc-cni");
    assert_eq!(error.kind(), ErrorKind::Timeout);
    assert_eq!(error.last_status(), Some("CREATING"));
    assert!(error.remediation().is_none());
    assert!(warning.contains("did not reach ACTIVE"));
    assert_eq!(fake.addon_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn degraded_conflict_on_create_suggests_overwrite() {
    let (fake, reconciler) = harness();
    fake.script_create(
        "cluster-a",
        "vpc-cni",
        [AddonStatus::Creating, AddonStatus::Degraded],
    );
    fake.set_health("cluster-a", "vpc-cni", vec![conflict_issue()]);

    let outcome = reconciler
        .create(&vpc_cni(), &CancellationToken::new())
        .await
        .unwrap();
    let (_, error, _) = tainted(outcome);
    assert_eq!(error.kind(), ErrorKind::Conflict);
    assert_eq!(
        error.remediation(),
        Some(("resolve_conflicts_on_create", ResolveConflicts::Overwrite))
    );
    assert!(error
        .to_string()
        .ends_with("Consider setting attribute \"resolve_conflicts_on_create\" to \"OVERWRITE\""));
}

#[tokio::test(start_paused = true)]
async fn create_failed_without_conflict_keeps_plain_error() {
    let (fake, reconciler) = harness();
    fake.script_create("cluster-a", "vpc-cni", [AddonStatus::CreateFailed]);
    fake.set_health(
        "cluster-a",
        "vpc-cni",
        vec![HealthIssue {
            code: "InsufficientNumberOfReplicas".into(),
            message: "The add-on is unhealthy because it doesn't have the desired number of replicas."
                .into(),
            resource_ids: Vec::new(),
        }],
    );

    let (_, error, _) = tainted(
        reconciler
            .create(&vpc_cni(), &CancellationToken::new())
            .await
            .unwrap(),
    );
    assert_eq!(error.kind(), ErrorKind::TerminalFailure);
    assert_eq!(error.last_status(), Some("CREATE_FAILED"));
    assert!(error.to_string().contains("InsufficientNumberOfReplicas"));
    assert!(error.remediation().is_none());
}

#[tokio::test(start_paused = true)]
async fn legacy_conflict_policy_takes_precedence() {
    let (fake, reconciler) = harness();
    let mut desired = vpc_cni();
    desired.resolve_conflicts = Some(ResolveConflicts::None);
    desired.resolve_conflicts_on_create = Some(ResolveConflicts::Overwrite);

    create_active(&reconciler, &desired).await;
    assert_eq!(
        fake.create_requests()[0].resolve_conflicts,
        Some(ResolveConflicts::None)
    );
}

#[tokio::test(start_paused = true)]
async fn invalid_desired_state_never_reaches_the_control_plane() {
    let (fake, reconciler) = harness();
    let mut desired = vpc_cni();
    desired.resolve_conflicts_on_create = Some(ResolveConflicts::Preserve);

    let err = reconciler
        .create(&desired, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(fake.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn update_sends_changed_fields_and_role() {
    let (fake, reconciler) = harness();
    let prior = create_active(&reconciler, &vpc_cni()).await;

    let desired = DesiredAddon::new("cluster-a", "vpc-cni")
        .with_version("v1.3.0-eksbuild.1")
        .with_service_account_role_arn(ROLE_ARN);
    let refreshed = reconciler
        .update(&prior, &desired, &CancellationToken::new())
        .await
        .unwrap()
        .into_state()
        .expect("add-on still present");
    assert_eq!(refreshed.addon_version.as_deref(), Some("v1.3.0-eksbuild.1"));
    assert_eq!(refreshed.service_account_role_arn.as_deref(), Some(ROLE_ARN));

    let request = &fake.update_requests()[0];
    assert_eq!(request.addon_version.as_deref(), Some("v1.3.0-eksbuild.1"));
    assert_eq!(request.configuration_values, None);
    assert_eq!(request.service_account_role_arn.as_deref(), Some(ROLE_ARN));

    // Dropping the role from the desired state clears it remotely.
    let cleared = reconciler
        .update(
            &refreshed,
            &DesiredAddon::new("cluster-a", "vpc-cni"),
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .into_state()
        .unwrap();
    assert_eq!(cleared.service_account_role_arn, None);
    assert_eq!(cleared.addon_version.as_deref(), Some("v1.3.0-eksbuild.1"));
    let request = &fake.update_requests()[1];
    assert_eq!(request.service_account_role_arn.as_deref(), Some(""));
    assert_eq!(request.addon_version, None);
}

#[tokio::test(start_paused = true)]
async fn version_change_resends_unchanged_role() {
    let (fake, reconciler) = harness();
    let prior = create_active(&reconciler, &vpc_cni().with_service_account_role_arn(ROLE_ARN)).await;
    assert_eq!(prior.service_account_role_arn.as_deref(), Some(ROLE_ARN));

    let desired = DesiredAddon::new("cluster-a", "vpc-cni")
        .with_version("v1.3.0-eksbuild.1")
        .with_service_account_role_arn(ROLE_ARN);
    let refreshed = reconciler
        .update(&prior, &desired, &CancellationToken::new())
        .await
        .unwrap()
        .into_state()
        .unwrap();
    assert_eq!(refreshed.addon_version.as_deref(), Some("v1.3.0-eksbuild.1"));
    assert_eq!(refreshed.service_account_role_arn.as_deref(), Some(ROLE_ARN));

    let requests = fake.update_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].addon_version.as_deref(), Some("v1.3.0-eksbuild.1"));
    assert_eq!(requests[0].service_account_role_arn.as_deref(), Some(ROLE_ARN));
}

#[tokio::test(start_paused = true)]
async fn role_only_update_sends_just_the_role() {
    let (fake, reconciler) = harness();
    let prior = create_active(&reconciler, &vpc_cni()).await;
    assert_eq!(prior.service_account_role_arn, None);

    let refreshed = reconciler
        .update(
            &prior,
            &vpc_cni().with_service_account_role_arn(ROLE_ARN),
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .into_state()
        .unwrap();
    assert_eq!(refreshed.service_account_role_arn.as_deref(), Some(ROLE_ARN));

    let requests = fake.update_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].service_account_role_arn.as_deref(), Some(ROLE_ARN));
    assert_eq!(requests[0].addon_version, None);
    assert_eq!(requests[0].configuration_values, None);
}

#[tokio::test(start_paused = true)]
async fn update_of_vanished_addon_names_the_update() {
    let (fake, reconciler) = harness();
    let prior = create_active(&reconciler, &vpc_cni()).await;
    assert!(fake.remove_out_of_band("cluster-a", "vpc-cni"));

    let err = reconciler
        .update(
            &prior,
            &vpc_cni().with_version("v1.3.0-eksbuild.1"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let message = err.to_string();
    assert!(message.starts_with("updating add-on (cluster-a:vpc-cni): "), "{message}");
    assert!(message.contains("ResourceNotFoundException"), "{message}");
}

#[tokio::test(start_paused = true)]
async fn update_without_changes_skips_the_remote_update() {
    let (fake, reconciler) = harness();
    let prior = create_active(&reconciler, &vpc_cni()).await;

    let outcome = reconciler
        .update(&prior, &vpc_cni(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(outcome, ReadOutcome::Found(_)));
    assert!(fake.update_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn update_refuses_to_change_identity() {
    let (fake, reconciler) = harness();
    let prior = create_active(&reconciler, &vpc_cni()).await;

    let err = reconciler
        .update(
            &prior,
            &DesiredAddon::new("cluster-b", "vpc-cni"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(fake.update_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_update_suggests_overwrite_on_update() {
    let (fake, reconciler) = harness();
    let prior = create_active(&reconciler, &vpc_cni()).await;
    fake.script_update(
        "cluster-a",
        "vpc-cni",
        [UpdateStatus::InProgress, UpdateStatus::Failed],
        vec![UpdateErrorDetail {
            error_code: "ConfigurationConflict".into(),
            error_message: "Apply failed with 1 conflict".into(),
            resource_ids: Vec::new(),
        }],
    );

    let desired = vpc_cni().with_configuration_values(r#"{"env":{"WARM_IP_TARGET":"5"}}"#);
    let err = reconciler
        .update(&prior, &desired, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(
        err.remediation(),
        Some(("resolve_conflicts_on_update", ResolveConflicts::Overwrite))
    );
    assert!(err.to_string().contains("Apply failed with 1 conflict"));
}

#[tokio::test(start_paused = true)]
async fn failed_update_under_overwrite_has_no_hint() {
    let (fake, reconciler) = harness();
    let prior = create_active(&reconciler, &vpc_cni()).await;
    fake.script_update(
        "cluster-a",
        "vpc-cni",
        [UpdateStatus::Failed],
        vec![UpdateErrorDetail {
            error_code: "AccessDenied".into(),
            error_message: "role cannot be assumed".into(),
            resource_ids: Vec::new(),
        }],
    );

    let mut desired = vpc_cni().with_service_account_role_arn(ROLE_ARN);
    desired.resolve_conflicts_on_update = Some(ResolveConflicts::Overwrite);
    let err = reconciler
        .update(&prior, &desired, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TerminalFailure);
    assert!(err.remediation().is_none());
    assert_eq!(
        fake.update_requests()[0].resolve_conflicts,
        Some(ResolveConflicts::Overwrite)
    );
}

#[tokio::test(start_paused = true)]
async fn update_converges_tags_with_provider_defaults() {
    let fake = Arc::new(FakeControlPlane::new());
    let settings = settings().with_tags(TagPolicy::default().with_default_tag("managed-by", "r-addon"));
    let reconciler = AddonReconciler::new(fake.clone(), settings);

    let prior = create_active(&reconciler, &vpc_cni().with_tag("team", "platform")).await;
    assert_eq!(fake.create_requests()[0].tags.len(), 2);
    assert_eq!(prior.tags.get("team").map(String::as_str), Some("platform"));
    assert!(!prior.tags.contains_key("managed-by"));
    assert_eq!(
        prior.tags_all.get("managed-by").map(String::as_str),
        Some("r-addon")
    );

    let refreshed = reconciler
        .update(&prior, &vpc_cni().with_tag("env", "prod"), &CancellationToken::new())
        .await
        .unwrap()
        .into_state()
        .unwrap();
    assert!(fake.update_requests().is_empty());
    assert!(fake.requests().iter().any(|request| matches!(
        request,
        RecordedRequest::Untag { keys, .. } if keys == &vec!["team".to_owned()]
    )));
    assert!(fake.requests().iter().any(|request| matches!(
        request,
        RecordedRequest::Tag { tags, .. } if tags.get("env").map(String::as_str) == Some("prod")
    )));
    assert_eq!(refreshed.tags.len(), 1);
    assert_eq!(refreshed.tags.get("env").map(String::as_str), Some("prod"));
}

#[tokio::test(start_paused = true)]
async fn tag_failure_fails_the_update() {
    let (fake, reconciler) = harness();
    let prior = create_active(&reconciler, &vpc_cni()).await;
    fake.fail_next_tag(ApiError::Service {
        code: "AccessDeniedException".into(),
        message: "not authorized to perform eks:TagResource".into(),
    });

    let err = reconciler
        .update(&prior, &vpc_cni().with_tag("env", "prod"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Remote);
    assert!(err.to_string().contains("eks:TagResource"));
    let tags = fake.addon("cluster-a", "vpc-cni").unwrap().tags;
    assert!(!tags.contains_key("env"));
}

#[tokio::test(start_paused = true)]
async fn read_of_removed_addon_depends_on_mode() {
    let (fake, reconciler) = harness();
    create_active(&reconciler, &vpc_cni()).await;
    assert!(fake.remove_out_of_band("cluster-a", "vpc-cni"));

    let cancel = CancellationToken::new();
    let outcome = reconciler
        .read("cluster-a:vpc-cni", ReadMode::Refresh, &cancel)
        .await
        .unwrap();
    assert!(matches!(outcome, ReadOutcome::Gone));
    assert!(!outcome.diagnostics().has_errors());

    let err = reconciler
        .read("cluster-a:vpc-cni", ReadMode::NewResource, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = reconciler
        .read("cluster-a/vpc-cni", ReadMode::Refresh, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedIdentifier);
}

#[tokio::test(start_paused = true)]
async fn read_surfaces_remote_failures() {
    let (fake, reconciler) = harness();
    fake.fail_next_describe(ApiError::Throttling("Rate exceeded".into()));

    let err = reconciler
        .read("cluster-a:vpc-cni", ReadMode::Refresh, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransientRemoteFailure);
    assert!(err.to_string().contains("Rate exceeded"));
}

#[tokio::test(start_paused = true)]
async fn import_adopts_existing_addon() {
    let (fake, reconciler) = harness();
    let now = Utc::now();
    fake.insert_addon(Addon {
        cluster_name: "cluster-a".into(),
        addon_name: "coredns".into(),
        addon_version: Some("v1.10.1-eksbuild.2".into()),
        arn: "arn:aws:eks:eu-west-1:123456789012:addon/cluster-a/coredns/1".into(),
        status: AddonStatus::Active,
        configuration_values: Some(r#"{"replicaCount":3}"#.into()),
        service_account_role_arn: None,
        created_at: now,
        modified_at: now,
        tags: Default::default(),
        health: Vec::new(),
    });

    let cancel = CancellationToken::new();
    let state = reconciler.import("cluster-a:coredns", &cancel).await.unwrap();
    assert_eq!(state.cluster_name(), "cluster-a");
    assert_eq!(state.addon_name(), "coredns");
    assert_eq!(state.configuration_values.as_deref(), Some(r#"{"replicaCount":3}"#));

    let err = reconciler.import("cluster-a:missing", &cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test(start_paused = true)]
async fn delete_forwards_preserve_flag() {
    for preserve in [true, false] {
        let (fake, reconciler) = harness();
        create_active(&reconciler, &vpc_cni()).await;

        let outcome = reconciler
            .delete("cluster-a:vpc-cni", preserve, &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, DeleteOutcome::Deleted));
        assert_eq!(fake.delete_requests()[0].preserve, preserve);
        assert_eq!(fake.addon_count(), 0);
        assert_eq!(fake.has_in_cluster_objects("cluster-a", "vpc-cni"), preserve);
    }
}

#[tokio::test(start_paused = true)]
async fn delete_of_missing_addon_succeeds() {
    let (fake, reconciler) = harness();
    let outcome = reconciler
        .delete("cluster-a:vpc-cni", false, &CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(outcome, DeleteOutcome::Deleted));
    assert_eq!(fake.delete_requests().len(), 1);
    assert_eq!(fake.describe_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn delete_wait_timeout_is_reported_but_not_fatal() {
    let (fake, reconciler) = harness();
    create_active(&reconciler, &vpc_cni()).await;
    fake.script_delete("cluster-a", "vpc-cni", [FakeStep::Status(AddonStatus::Deleting)]);

    let outcome = reconciler
        .delete("cluster-a:vpc-cni", false, &CancellationToken::new())
        .await
        .unwrap();
    let DeleteOutcome::Pending { error } = &outcome else {
        panic!("expected pending delete, got {outcome:?}");
    };
    assert_eq!(error.kind(), ErrorKind::Timeout);
    assert_eq!(error.last_status(), Some("DELETING"));
    assert!(outcome.diagnostics().has_errors());
}

#[tokio::test(start_paused = true)]
async fn delete_rejection_is_an_error() {
    let (fake, reconciler) = harness();
    create_active(&reconciler, &vpc_cni()).await;
    fake.fail_next_delete(ApiError::ResourceInUse("update in progress".into()));

    let err = reconciler
        .delete("cluster-a:vpc-cni", false, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Remote);
    assert_eq!(fake.addon_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_slow_remote_calls() {
    let fake = Arc::new(FakeControlPlane::new().with_latency(Duration::from_secs(30)));
    let reconciler = AddonReconciler::new(fake.clone(), settings());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_secs(2)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = reconciler.create(&vpc_cni(), &cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn cancellation_after_acceptance_taints() {
    let (fake, reconciler) = harness();
    fake.script_create("cluster-a", "vpc-cni", [AddonStatus::Creating]);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let outcome = reconciler.create(&vpc_cni(), &cancel).await.unwrap();
    let (_, error, _) = tainted(outcome);
    assert!(error.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn lifecycle_outcomes_are_counted() {
    let (_fake, reconciler) = harness();
    let metrics = LifecycleMetrics::standalone().unwrap();
    let reconciler = reconciler.with_metrics(metrics.clone());

    create_active(&reconciler, &vpc_cni()).await;
    reconciler
        .delete("cluster-a:vpc-cni", false, &CancellationToken::new())
        .await
        .unwrap();

    let rendered = metrics.render().unwrap();
    assert!(rendered
        .contains("r_addon_lifecycle_operations_total{operation=\"create\",outcome=\"success\"} 1"));
    assert!(rendered
        .contains("r_addon_lifecycle_operations_total{operation=\"delete\",outcome=\"success\"} 1"));
    assert!(rendered.contains("r_addon_wait_duration_seconds_count{operation=\"create\",outcome=\"success\"} 1"));
}
