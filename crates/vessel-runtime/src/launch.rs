//! Container launch: parent and child sides of the fork.

use std::path::{Path, PathBuf};

use nix::sys::signal::{Signal, kill};
use nix::unistd::{ForkResult, Pid, fork};
use vessel_common::config::{ContainerConfig, RuntimeOptions};
use vessel_common::constants::{BIN_NAME, PROC_SELF};
use vessel_common::error::{Result, VesselError};
use vessel_core::cgroup::hierarchy::CgroupHierarchy;
use vessel_core::filesystem::{mount, pivot_root};
use vessel_core::namespace::unshare::{KernelUnshare, NamespaceSyscall};
use vessel_core::namespace::user::{
    WaitPolicy, cancel_on_signal, cancellation_flag, wait_for_identity_map,
};
use vessel_core::namespace::{PrivilegeMode, uts};

use crate::plan::{ChildStep, PARENT_NAMESPACES, StepFailure, child_plan};
use crate::process::{ExecSpec, exit_child, wait_for_child};
use crate::rootfs;

/// How a launch ended, from the parent's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOutcome {
    /// Host pid of the container init.
    pub pid: u32,
    /// Exit status of the container init, `128 + n` if killed by signal `n`.
    pub exit_status: i32,
    /// Mode the container was launched in.
    pub mode: PrivilegeMode,
}

/// Launches one container from its configuration.
pub struct Launcher {
    config: ContainerConfig,
    options: RuntimeOptions,
    syscall: Box<dyn NamespaceSyscall>,
    config_path: Option<PathBuf>,
    proc_self: PathBuf,
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("id", &self.config.id)
            .field("options", &self.options)
            .field("config_path", &self.config_path)
            .finish_non_exhaustive()
    }
}

impl Launcher {
    /// Creates a launcher using the kernel's `unshare(2)`.
    #[must_use]
    pub fn new(config: ContainerConfig, options: RuntimeOptions) -> Self {
        Self {
            config,
            options,
            syscall: Box::new(KernelUnshare),
            config_path: None,
            proc_self: PathBuf::from(PROC_SELF),
        }
    }

    /// Replaces how namespaces are unshared.
    #[must_use]
    pub fn with_syscall(mut self, syscall: Box<dyn NamespaceSyscall>) -> Self {
        self.syscall = syscall;
        self
    }

    /// Records where the configuration was loaded from, for the helper
    /// command printed to the operator.
    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Replaces the directory holding the child's own `uid_map`/`gid_map`.
    #[must_use]
    pub fn with_proc_self(mut self, path: impl Into<PathBuf>) -> Self {
        self.proc_self = path.into();
        self
    }

    /// Privilege mode, decided from the uid mapping table.
    #[must_use]
    pub fn mode(&self) -> PrivilegeMode {
        PrivilegeMode::detect(&self.config.linux.uid_mappings)
    }

    /// The launch configuration.
    #[must_use]
    pub const fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Command an operator runs to write the identity maps for `pid`.
    #[must_use]
    pub fn helper_command(&self, pid: u32) -> String {
        let config = self
            .config_path
            .as_deref()
            .map_or_else(|| "<config>".to_string(), |p| p.display().to_string());
        format!("{BIN_NAME} map --config {config} {pid}")
    }

    /// Runs the container and waits for it to exit.
    ///
    /// Environment and root are prepared before anything is unshared. The
    /// parent unshares the PID namespace, forks, adds the child to
    /// `cgroups`, and waits. The child runs [`child_plan`] and never
    /// returns: on failure it prints which step failed and exits with
    /// status 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be prepared, the PID namespace
    /// cannot be acquired, the fork fails, or the child cannot be added to
    /// its cgroups. In the last case the child is killed and reaped first.
    pub fn launch(&self, cgroups: &CgroupHierarchy) -> Result<LaunchOutcome> {
        let mode = self.mode();
        tracing::info!(id = %self.config.id, mode = %mode, "launching container");

        let exec = ExecSpec::prepare(&self.config.process)?;
        let extracted = rootfs::materialize(&self.config.root, &self.options.pivot_dir)?;
        tracing::debug!(root = %self.config.root.path.display(), extracted, "root ready");

        for namespace in PARENT_NAMESPACES {
            self.syscall.unshare(namespace)?;
        }

        // SAFETY: the launcher is single-threaded at this point; the child
        // only runs its plan and then execs or exits.
        let forked = unsafe { fork() }.map_err(|e| VesselError::Config {
            message: format!("fork failed: {e}"),
        })?;
        match forked {
            ForkResult::Child => self.child(mode, &exec),
            ForkResult::Parent { child } => self.parent(mode, child, cgroups),
        }
    }

    fn parent(
        &self,
        mode: PrivilegeMode,
        child: Pid,
        cgroups: &CgroupHierarchy,
    ) -> Result<LaunchOutcome> {
        let pid = child.as_raw().unsigned_abs();
        eprintln!("container pid: {pid}");
        tracing::info!(pid, "container process forked");

        if let Err(e) = cgroups.apply(&[pid]) {
            tracing::error!(pid, error = %e, "cgroup registration failed, killing container");
            let _ = kill(child, Signal::SIGKILL);
            let _ = wait_for_child(child);
            return Err(e);
        }
        eprintln!("cgroups applied: {} ({pid})", cgroups.name());
        eprintln!("map identities with: {}", self.helper_command(pid));

        let exit_status = wait_for_child(child)?;
        tracing::info!(pid, exit_status, "container exited");
        Ok(LaunchOutcome {
            pid,
            exit_status,
            mode,
        })
    }

    fn child(&self, mode: PrivilegeMode, exec: &ExecSpec) -> ! {
        if let Err(e) = cancel_on_signal() {
            tracing::warn!(error = %e, "identity wait cannot be cancelled by signal");
        }
        let failure = match self.run_steps(&child_plan(mode), exec) {
            Ok(()) => StepFailure {
                step: ChildStep::Exec,
                source: VesselError::Config {
                    message: "plan ended without exec".into(),
                },
            },
            Err(failure) => failure,
        };
        eprintln!("{BIN_NAME}: {failure}");
        exit_child(1)
    }

    /// Runs `steps` in order, stopping at the first failure.
    ///
    /// Returns `Ok` only for a sequence without a successful
    /// [`ChildStep::Exec`].
    ///
    /// # Errors
    ///
    /// Returns the first step that failed together with its cause.
    pub fn run_steps(
        &self,
        steps: &[ChildStep],
        exec: &ExecSpec,
    ) -> std::result::Result<(), StepFailure> {
        for &step in steps {
            tracing::debug!(step = %step, "child step");
            self.perform(step, exec)
                .map_err(|source| StepFailure { step, source })?;
        }
        Ok(())
    }

    fn perform(&self, step: ChildStep, exec: &ExecSpec) -> Result<()> {
        let root = &self.config.root.path;
        match step {
            ChildStep::AwaitIdentityMap => wait_for_identity_map(
                &self.proc_self,
                &WaitPolicy::from(&self.options),
                cancellation_flag(),
            ),
            ChildStep::Unshare(namespace) => self.syscall.unshare(namespace),
            ChildStep::MakeMountsPrivate => mount::make_rprivate(),
            ChildStep::BindRoot => mount::bind_mount_self(root),
            ChildStep::EnterRoot => change_dir(root),
            ChildStep::PivotRoot => pivot_root::pivot_to_cwd(&self.options.pivot_dir),
            ChildStep::SetHostname => uts::set_hostname(&self.config.hostname),
            ChildStep::MountProc => mount::mount_proc(),
            ChildStep::MountSys => mount::mount_sysfs(),
            ChildStep::EnterWorkdir => change_dir(exec.cwd()),
            ChildStep::Exec => exec.exec().map(|never| match never {}),
        }
    }
}

fn change_dir(path: &Path) -> Result<()> {
    std::env::set_current_dir(path).map_err(|e| VesselError::io(path, e))
}
