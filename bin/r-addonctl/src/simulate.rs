//! ---
//! addon_section: "05-networking-external-interfaces"
//! addon_subsection: "binary"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Control CLI for operators working with R-Addon."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use r_addon_testharness::{Scenario, ScenarioRunner};
use tokio::runtime::Runtime;

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Scenario file (YAML).
    #[arg(value_name = "FILE")]
    scenario: PathBuf,
    /// Emit compact JSON instead of pretty-printed JSON.
    #[arg(long)]
    compact: bool,
}

pub fn run(args: SimulateArgs) -> Result<()> {
    let scenario = Scenario::from_file(&args.scenario)?;
    let runner = ScenarioRunner::new(&scenario);
    let runtime = Runtime::new()?;
    let report = runtime.block_on(runner.run(&scenario))?;

    let rendered = if args.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{rendered}");

    if !report.passed() {
        bail!("scenario '{}' did not meet its expectations", report.name);
    }
    Ok(())
}
