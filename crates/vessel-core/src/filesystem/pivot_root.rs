//! Root filesystem switching via `pivot_root(2)`.
//!
//! Unlike `chroot`, this changes the root mount of the mount namespace
//! rather than just the process's view of `/`.

use std::path::Path;

use vessel_common::error::{Result, VesselError};

/// Makes the current directory the new root, moving the old root to
/// `put_old` (relative to the new root), then changes to `/`.
///
/// The caller must already be inside the new root, which must be a mount
/// point in a private mount namespace. The old root stays mounted at
/// `/<put_old>`.
///
/// # Errors
///
/// Returns an error if `pivot_root(2)` or the final `chdir` fails.
#[cfg(target_os = "linux")]
pub fn pivot_to_cwd(put_old: &str) -> Result<()> {
    nix::unistd::pivot_root(".", put_old).map_err(|e| VesselError::Mount {
        target: Path::new(".").to_path_buf(),
        message: format!("pivot_root failed: {e}"),
    })?;
    let root = Path::new("/");
    nix::unistd::chdir(root).map_err(|e| VesselError::io(root, e.into()))?;
    tracing::info!(put_old, "root filesystem pivoted");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: `pivot_root` requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn pivot_to_cwd(_put_old: &str) -> Result<()> {
    Err(VesselError::Config {
        message: "Linux required for native container operations".into(),
    })
}
