//! UTS namespace isolation.
//!
//! Allows the container to have its own hostname.

use vessel_common::error::{Result, VesselError};

/// Sets the hostname inside the current UTS namespace.
///
/// # Errors
///
/// Returns an error if `sethostname(2)` fails.
#[cfg(target_os = "linux")]
pub fn set_hostname(hostname: &str) -> Result<()> {
    nix::unistd::sethostname(hostname).map_err(|e| VesselError::Config {
        message: format!("setting hostname {hostname:?} failed: {e}"),
    })?;
    tracing::debug!(hostname, "container hostname set");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: UTS namespaces require Linux.
#[cfg(not(target_os = "linux"))]
pub fn set_hostname(_hostname: &str) -> Result<()> {
    Err(VesselError::Config {
        message: "Linux required for native container operations".into(),
    })
}
