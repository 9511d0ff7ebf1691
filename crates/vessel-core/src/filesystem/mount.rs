//! Mount utilities for controller hierarchies and container filesystem setup.

use std::path::Path;

use vessel_common::error::{Result, VesselError};

/// Wraps a `mount(2)` failure on `target`.
#[cfg(target_os = "linux")]
fn mount_error(target: &Path, what: &str, e: nix::errno::Errno) -> VesselError {
    VesselError::Mount {
        target: target.to_path_buf(),
        message: format!("{what}: {e}"),
    }
}

/// Mounts a legacy cgroup hierarchy carrying `controller` at `target`.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn mount_cgroup(controller: &str, target: &Path) -> Result<()> {
    use nix::mount::{MsFlags, mount};

    mount(
        Some(controller),
        target,
        Some("cgroup"),
        MsFlags::empty(),
        Some(controller),
    )
    .map_err(|e| mount_error(target, "cgroup mount failed", e))?;
    tracing::info!(controller, target = %target.display(), "controller hierarchy mounted");
    Ok(())
}

/// Unmounts the filesystem at `target`.
///
/// # Errors
///
/// Returns an error if the `umount(2)` syscall fails, e.g. while busy.
#[cfg(target_os = "linux")]
pub fn unmount(target: &Path) -> Result<()> {
    nix::mount::umount(target).map_err(|e| mount_error(target, "unmount failed", e))?;
    tracing::info!(target = %target.display(), "unmounted");
    Ok(())
}

/// Marks every mount below `/` private so nothing done in this mount
/// namespace propagates back to the host.
///
/// # Errors
///
/// Returns an error if the remount fails.
#[cfg(target_os = "linux")]
pub fn make_rprivate() -> Result<()> {
    use nix::mount::{MsFlags, mount};

    let root = Path::new("/");
    mount(
        None::<&str>,
        root,
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )
    .map_err(|e| mount_error(root, "making mounts private failed", e))?;
    tracing::debug!("mount tree is private");
    Ok(())
}

/// Bind-mounts `path` onto itself so it becomes a mount point, which
/// `pivot_root(2)` requires of the new root.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn bind_mount_self(path: &Path) -> Result<()> {
    use nix::mount::{MsFlags, mount};

    mount(
        Some(path),
        path,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| mount_error(path, "bind mount failed", e))?;
    tracing::debug!(path = %path.display(), "bind-mounted onto itself");
    Ok(())
}

/// Mounts a fresh `proc` at `/proc`.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn mount_proc() -> Result<()> {
    mount_pseudo("proc", Path::new("/proc"))
}

/// Mounts a fresh `sysfs` at `/sys`.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn mount_sysfs() -> Result<()> {
    mount_pseudo("sysfs", Path::new("/sys"))
}

#[cfg(target_os = "linux")]
fn mount_pseudo(fs_type: &str, target: &Path) -> Result<()> {
    use nix::mount::{MsFlags, mount};

    mount(
        Some(fs_type),
        target,
        Some(fs_type),
        MsFlags::empty(),
        None::<&str>,
    )
    .map_err(|e| mount_error(target, "pseudo-filesystem mount failed", e))?;
    tracing::debug!(fs_type, target = %target.display(), "mounted");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn unsupported() -> VesselError {
    VesselError::Config {
        message: "Linux required for native container operations".into(),
    }
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: cgroup hierarchies require Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_cgroup(_controller: &str, _target: &Path) -> Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error.
#[cfg(not(target_os = "linux"))]
pub fn unmount(_target: &Path) -> Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error.
#[cfg(not(target_os = "linux"))]
pub fn make_rprivate() -> Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error.
#[cfg(not(target_os = "linux"))]
pub fn bind_mount_self(_path: &Path) -> Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error.
#[cfg(not(target_os = "linux"))]
pub fn mount_proc() -> Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error.
#[cfg(not(target_os = "linux"))]
pub fn mount_sysfs() -> Result<()> {
    Err(unsupported())
}
