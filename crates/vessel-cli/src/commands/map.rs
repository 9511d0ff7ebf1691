//! `vessel map`: Write identity maps for a waiting container.
//!
//! A launched container blocks until its `uid_map` and `gid_map` are
//! populated. This command writes them from the same launch configuration
//! and must run with enough privilege over the target process.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Args;
use vessel_common::config::ContainerConfig;
use vessel_core::namespace::user::{proc_dir, write_id_maps};

/// Arguments for the `map` command.
#[derive(Args, Debug)]
pub struct MapArgs {
    /// Path to the JSON launch configuration.
    #[arg(short, long)]
    pub config: PathBuf,

    /// Host pid of the container process.
    pub pid: u32,
}

/// Executes the `map` command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the maps
/// cannot be written.
pub fn execute(args: &MapArgs) -> anyhow::Result<ExitCode> {
    let config = ContainerConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    write_maps(&config, &proc_dir(args.pid))
        .with_context(|| format!("writing identity maps for pid {}", args.pid))?;
    eprintln!("identity maps written for pid {}", args.pid);
    Ok(ExitCode::SUCCESS)
}

fn write_maps(config: &ContainerConfig, proc_dir: &Path) -> anyhow::Result<()> {
    write_id_maps(
        proc_dir,
        &config.linux.uid_mappings,
        &config.linux.gid_mappings,
    )?;
    tracing::info!(
        proc_dir = %proc_dir.display(),
        uid_entries = config.linux.uid_mappings.len(),
        gid_entries = config.linux.gid_mappings.len(),
        "identity maps written"
    );
    Ok(())
}
