//! `vessel run`: Launch a container and wait for it.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use vessel_common::config::{ContainerConfig, RuntimeOptions};
use vessel_common::constants::{DEFAULT_MAP_POLL_MS, DEFAULT_MAP_TIMEOUT_SECS};
use vessel_core::cgroup::hierarchy::CgroupHierarchy;
use vessel_core::cgroup::mounts::SystemMounts;
use vessel_core::cgroup::writer::FsWriter;
use vessel_runtime::launch::Launcher;

use crate::output::{BOLD, DIM, GREEN, RESET, YELLOW, describe_limits};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the JSON launch configuration.
    #[arg(short, long)]
    pub config: PathBuf,

    /// Leave the container's cgroups in place after it exits.
    #[arg(long)]
    pub keep_cgroups: bool,

    /// Seconds the container waits for its identity maps.
    #[arg(long, env = "VESSEL_MAP_TIMEOUT", default_value_t = DEFAULT_MAP_TIMEOUT_SECS)]
    pub map_timeout: u64,

    /// Milliseconds between identity-map checks.
    #[arg(long, env = "VESSEL_MAP_POLL_MS", default_value_t = DEFAULT_MAP_POLL_MS)]
    pub map_poll_ms: u64,
}

impl RunArgs {
    /// Launcher tunables selected by these arguments.
    #[must_use]
    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            map_timeout: Duration::from_secs(self.map_timeout),
            map_poll_interval: Duration::from_millis(self.map_poll_ms),
            ..RuntimeOptions::default()
        }
    }
}

/// Executes the `run` command.
///
/// The cgroup hierarchy is built before anything is forked, and torn down
/// once the container has exited or the launch failed.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the cgroup
/// hierarchy cannot be built, or the launch fails in the parent.
pub fn execute(args: &RunArgs) -> anyhow::Result<ExitCode> {
    let config = ContainerConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let options = args.runtime_options();

    eprintln!("  {BOLD}vessel{RESET} {DIM}v{}{RESET}", env!("CARGO_PKG_VERSION"));
    for limit in describe_limits(&config.linux.resources) {
        eprintln!("    {DIM}{limit}{RESET}");
    }

    let mut cgroups = CgroupHierarchy::create(
        &config.id.cgroup_name(),
        &config.linux.resources,
        &config.cgroup_base(),
        Arc::new(SystemMounts::new(&options.mountinfo)),
        Arc::new(FsWriter),
    )
    .context("building cgroup hierarchy")?;

    let launcher = Launcher::new(config, options).with_config_path(&args.config);
    let result = launcher.launch(&cgroups);

    if args.keep_cgroups {
        tracing::info!(name = cgroups.name(), "keeping cgroups");
    } else {
        cgroups.teardown();
    }

    let outcome = result.context("launching container")?;
    let colour = if outcome.exit_status == 0 { GREEN } else { YELLOW };
    eprintln!(
        "  {colour}container {} exited with status {}{RESET}",
        outcome.pid, outcome.exit_status
    );
    Ok(ExitCode::from(u8::try_from(outcome.exit_status).unwrap_or(1)))
}
