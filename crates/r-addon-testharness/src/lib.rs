//! ---
//! addon_section: "11-simulation"
//! addon_subsection: "01-bootstrap"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Test harness orchestrator scaffolding and shared exports."
//! addon_version: "v0.1.0"
//! addon_owner: "tbd"
//! ---
//! Simulation harness for the add-on engine: a scripted in-memory control
//! plane and a YAML scenario runner built on top of it.

pub mod fake;
pub mod scenario;

pub use fake::{FakeControlPlane, FakeStep, RecordedRequest, DEFAULT_ADDON_VERSION};
pub use scenario::{
    Scenario, ScenarioReport, ScenarioRunner, ScenarioStep, StepAction, StepOutcome, StepReport,
};
