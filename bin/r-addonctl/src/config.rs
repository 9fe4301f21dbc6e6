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

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use r_addon_common::AppConfig;
use r_addon_core::EngineSettings;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Load and validate the effective configuration.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Configuration file to validate (otherwise R_ADDON_CONFIG or configs/addon.toml).
    #[arg(long, value_name = "FILE")]
    path: Option<PathBuf>,
    /// Print the effective configuration as TOML.
    #[arg(long)]
    print: bool,
}

pub fn run(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Check(args) => check(args),
    }
}

fn check(args: CheckArgs) -> Result<()> {
    let (config, source) = match &args.path {
        Some(path) => (AppConfig::from_path(path)?, Some(path.clone())),
        None => {
            let loaded = AppConfig::load_with_source(&[PathBuf::from("configs/addon.toml")])?;
            (loaded.config, loaded.source)
        }
    };
    let settings = EngineSettings::from_config(&config);
    match &source {
        Some(path) => println!("Configuration OK ({})", path.display()),
        None => println!("Configuration OK (built-in defaults)"),
    }
    println!(
        "create timeout: {:?}\nupdate timeout: {:?}\ndelete timeout: {:?}\npoll interval: {:?}\npropagation timeout: {:?}",
        settings.create_wait.timeout,
        settings.update_wait.timeout,
        settings.delete_wait.timeout,
        settings.create_wait.poll_interval,
        settings.propagation_timeout,
    );
    if args.print {
        let rendered =
            toml::to_string_pretty(&config).context("failed to render configuration as TOML")?;
        println!("{rendered}");
    }
    Ok(())
}
