//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Build metadata capture for version reporting."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Builds from source tarballs have no git metadata; vergen falls back to
    // placeholder values instead of failing the build.
    EmitBuilder::builder().all_cargo().all_git().emit()?;

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=R_ADDON_GIT_OVERRIDE");
    Ok(())
}
