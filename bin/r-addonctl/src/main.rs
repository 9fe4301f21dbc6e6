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

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use r_addon_common::{init_tracing, LogFormat, LoggingConfig, VersionInfo};
use r_addon_logging as logging;

mod config;
mod id;
mod simulate;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "R-Addon operator utility",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,
    /// Also write JSON logs to a daily rolling file in this directory.
    #[arg(long = "log-dir", value_name = "DIR", global = true)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(subcommand, about = "Encode and decode composite add-on identifiers")]
    Id(id::IdCommand),
    #[command(subcommand, about = "Configuration inspection")]
    Config(config::ConfigCommand),
    #[command(about = "Replay a YAML lifecycle scenario against the in-memory control plane")]
    Simulate(simulate::SimulateArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.log_dir {
        Some(directory) => init_tracing(
            "r-addonctl",
            &LoggingConfig {
                directory: directory.clone(),
                format: LogFormat::Pretty,
                file_prefix: None,
            },
        )?,
        None => logging::init(),
    }
    if cli.version {
        println!("{}", VersionInfo::current().extended());
        return Ok(());
    }
    match cli.command {
        Some(Commands::Id(cmd)) => id::run(cmd)?,
        Some(Commands::Config(cmd)) => config::run(cmd)?,
        Some(Commands::Simulate(args)) => simulate::run(args)?,
        None => {
            println!("{}", VersionInfo::current().banner());
            println!("Run with --help to list available commands");
        }
    }
    Ok(())
}
