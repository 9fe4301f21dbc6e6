//! ---
//! addon_section: "15-testing-qa-runbook"
//! addon_subsection: "integration-tests"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Replays the bundled lifecycle scenarios."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use std::path::Path;

use r_addon_core::Severity;
use r_addon_testharness::{Scenario, ScenarioRunner, StepOutcome};

fn load(name: &str) -> Scenario {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("scenarios")
        .join(name);
    Scenario::from_file(&path)
        .unwrap_or_else(|err| panic!("failed to load {}: {err:#}", path.display()))
}

#[tokio::test(start_paused = true)]
async fn bundled_scenarios_meet_their_expectations() {
    for name in [
        "create-update-delete.yaml",
        "create-timeout.yaml",
        "update-conflict.yaml",
    ] {
        let scenario = load(name);
        let report = ScenarioRunner::new(&scenario)
            .run(&scenario)
            .await
            .unwrap_or_else(|err| panic!("{name}: {err:#}"));
        for step in &report.steps {
            assert!(
                step.met_expectation(),
                "{name}: step {} produced {:?}, expected {:?}",
                step.action,
                step.outcome,
                step.expected
            );
        }
        assert!(report.passed(), "{name}");
    }
}

#[tokio::test(start_paused = true)]
async fn update_conflict_reports_remediation() {
    let scenario = load("update-conflict.yaml");
    let report = ScenarioRunner::new(&scenario).run(&scenario).await.unwrap();

    let update = &report.steps[1];
    assert_eq!(update.outcome, StepOutcome::Failed);
    let error = update
        .diagnostics
        .iter()
        .find(|diag| diag.severity == Severity::Error)
        .expect("error diagnostic");
    assert!(error
        .summary
        .contains("Consider setting attribute \"resolve_conflicts_on_update\" to \"OVERWRITE\""));
}

#[tokio::test(start_paused = true)]
async fn create_retry_scenario_from_inline_yaml() {
    let scenario: Scenario = r#"
name: create-retry
addon:
  cluster_name: cluster-b
  addon_name: coredns
script:
  create_errors:
    - kind: invalid_parameter
      message: "Addon coredns is in CREATE_FAILED state and is being deleted"
    - kind: invalid_parameter
      message: "Addon coredns does not exist"
steps:
  - action: create
    expect: ok
  - action: import
    expect: ok
"#
    .parse()
    .unwrap();

    let runner = ScenarioRunner::new(&scenario);
    let report = runner.run(&scenario).await.unwrap();
    assert!(report.passed());
    assert_eq!(runner.control_plane().create_requests().len(), 3);
    assert_eq!(
        report.steps[1].state.as_ref().unwrap().addon_version.as_deref(),
        Some(r_addon_testharness::DEFAULT_ADDON_VERSION)
    );
}
