//! ---
//! addon_section: "05-networking-external-interfaces"
//! addon_subsection: "binary"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Control CLI for operators working with R-Addon."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use anyhow::Result;
use clap::{Args, Subcommand};
use r_addon_core::identifier;

#[derive(Debug, Subcommand)]
pub enum IdCommand {
    /// Join a cluster and add-on name into a composite identifier.
    Encode(EncodeArgs),
    /// Split a composite identifier into its cluster and add-on names.
    Decode(DecodeArgs),
}

#[derive(Debug, Args)]
pub struct EncodeArgs {
    #[arg(long, value_name = "NAME")]
    cluster: String,
    #[arg(long, value_name = "NAME")]
    addon: String,
}

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Identifier in `cluster:addon` form.
    id: String,
    /// Print the parts as JSON instead of plain text.
    #[arg(long)]
    json: bool,
}

pub fn run(command: IdCommand) -> Result<()> {
    match command {
        IdCommand::Encode(args) => {
            println!("{}", identifier::encode(&args.cluster, &args.addon)?);
        }
        IdCommand::Decode(args) => {
            let (cluster, addon) = identifier::decode(&args.id)?;
            if args.json {
                println!(
                    "{}",
                    serde_json::json!({ "cluster_name": cluster, "addon_name": addon })
                );
            } else {
                println!("cluster: {cluster}\naddon: {addon}");
            }
        }
    }
    Ok(())
}
