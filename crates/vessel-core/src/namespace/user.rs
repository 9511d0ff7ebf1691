//! User namespace identity maps.
//!
//! The helper side writes `uid_map`/`gid_map` for a process; the container
//! side waits until both are populated before relying on its identity.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use vessel_common::config::RuntimeOptions;
use vessel_common::error::{Result, VesselError};
use vessel_common::types::IdMapping;

const UID_MAP: &str = "uid_map";
const GID_MAP: &str = "gid_map";
const SETGROUPS: &str = "setgroups";

/// Longest stretch the wait sleeps without looking at the cancel flag.
const CANCEL_CHECK: Duration = Duration::from_millis(50);

static CANCELLED: AtomicBool = AtomicBool::new(false);

/// `/proc/<pid>`.
#[must_use]
pub fn proc_dir(pid: u32) -> PathBuf {
    Path::new("/proc").join(pid.to_string())
}

/// Renders a mapping table in the kernel's `uid_map` format.
#[must_use]
pub fn render_map(mappings: &[IdMapping]) -> String {
    mappings.iter().map(|m| format!("{m}\n")).collect()
}

/// Writes the uid and gid maps of the process whose proc directory is
/// `proc_dir`.
///
/// `setgroups` is set to `deny` first when the file exists; the kernel
/// refuses a gid map from an unprivileged writer otherwise. Each table is
/// written in a single write, as the kernel accepts only one. Empty tables
/// are left alone.
///
/// # Errors
///
/// Returns an error if any of the files cannot be written.
pub fn write_id_maps(
    proc_dir: &Path,
    uid_mappings: &[IdMapping],
    gid_mappings: &[IdMapping],
) -> Result<()> {
    let setgroups = proc_dir.join(SETGROUPS);
    if setgroups.exists() {
        std::fs::write(&setgroups, "deny").map_err(|e| VesselError::io(&setgroups, e))?;
    }
    for (file, mappings) in [(UID_MAP, uid_mappings), (GID_MAP, gid_mappings)] {
        if mappings.is_empty() {
            tracing::warn!(file, "mapping table empty, not written");
            continue;
        }
        let path = proc_dir.join(file);
        std::fs::write(&path, render_map(mappings)).map_err(|e| VesselError::io(&path, e))?;
        tracing::debug!(path = %path.display(), entries = mappings.len(), "identity map written");
    }
    Ok(())
}

/// Deadline and polling cadence of [`wait_for_identity_map`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Give up after this long.
    pub timeout: Duration,
    /// Time between checks of the map files.
    pub poll_interval: Duration,
}

impl From<&RuntimeOptions> for WaitPolicy {
    fn from(options: &RuntimeOptions) -> Self {
        Self {
            timeout: options.map_timeout,
            poll_interval: options.map_poll_interval,
        }
    }
}

/// Blocks until both `uid_map` and `gid_map` under `proc_dir` are non-empty.
///
/// # Errors
///
/// Returns [`VesselError::Cancelled`] once `cancel` is raised, or
/// [`VesselError::IdentityMappingTimeout`] when the deadline passes first.
pub fn wait_for_identity_map(
    proc_dir: &Path,
    policy: &WaitPolicy,
    cancel: &AtomicBool,
) -> Result<()> {
    let start = Instant::now();
    let deadline = start + policy.timeout;
    tracing::info!(
        proc_dir = %proc_dir.display(),
        timeout = ?policy.timeout,
        "waiting for identity maps"
    );
    loop {
        if cancel.load(Ordering::SeqCst) {
            return Err(VesselError::Cancelled {
                message: "waiting for identity maps".into(),
            });
        }
        if is_populated(&proc_dir.join(UID_MAP)) && is_populated(&proc_dir.join(GID_MAP)) {
            tracing::info!(waited = ?start.elapsed(), "identity maps established");
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(VesselError::IdentityMappingTimeout {
                waited: now - start,
            });
        }
        sleep_until((now + policy.poll_interval).min(deadline), cancel);
    }
}

fn is_populated(path: &Path) -> bool {
    match std::fs::read_to_string(path) {
        Ok(content) => !content.trim().is_empty(),
        Err(e) => {
            tracing::trace!(path = %path.display(), error = %e, "map file unreadable");
            false
        }
    }
}

fn sleep_until(wake: Instant, cancel: &AtomicBool) {
    loop {
        let now = Instant::now();
        if now >= wake || cancel.load(Ordering::SeqCst) {
            return;
        }
        std::thread::sleep((wake - now).min(CANCEL_CHECK));
    }
}

/// Process-wide flag raised by the handlers [`cancel_on_signal`] installs.
#[must_use]
pub fn cancellation_flag() -> &'static AtomicBool {
    &CANCELLED
}

#[cfg(target_os = "linux")]
extern "C" fn raise_cancel(_signal: nix::libc::c_int) {
    CANCELLED.store(true, Ordering::SeqCst);
}

/// Makes SIGINT and SIGTERM raise [`cancellation_flag`] instead of
/// terminating the process.
///
/// # Errors
///
/// Returns an error if a handler cannot be installed.
#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
pub fn cancel_on_signal() -> Result<()> {
    use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

    let action = SigAction::new(
        SigHandler::Handler(raise_cancel),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in [Signal::SIGINT, Signal::SIGTERM] {
        // SAFETY: the handler only stores to an atomic, which is
        // async-signal-safe.
        let _ = unsafe { sigaction(signal, &action) }.map_err(|e| VesselError::Config {
            message: format!("installing {signal} handler failed: {e}"),
        })?;
    }
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error.
#[cfg(not(target_os = "linux"))]
pub fn cancel_on_signal() -> Result<()> {
    Err(VesselError::Config {
        message: "Linux required for native container operations".into(),
    })
}
