//! Per-controller exclusive lock around discovery, mount creation and
//! unmounting.
//!
//! Two launches that both find a controller unmounted would otherwise both
//! try to mount it, and a teardown could unmount a hierarchy another launch
//! just adopted. The lock is an `flock(2)` on a file in the cgroup base
//! directory, so it serializes threads and separate processes alike.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};
use vessel_common::error::{Result, VesselError};

use super::Controller;

/// Held for as long as the caller may mount or unmount `controller`; released on drop.
#[derive(Debug)]
pub struct ControllerLock {
    _flock: Flock<File>,
    path: PathBuf,
}

impl ControllerLock {
    /// Blocks until the lock for `controller` under `base_dir` is acquired.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be opened or locked.
    pub fn acquire(base_dir: &Path, controller: Controller) -> Result<Self> {
        let path = base_dir.join(format!(".{}.lock", controller.name()));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| VesselError::io(&path, e))?;
        let flock = Flock::lock(file, FlockArg::LockExclusive)
            .map_err(|(_, errno)| VesselError::io(&path, errno.into()))?;
        tracing::trace!(controller = %controller, path = %path.display(), "controller lock acquired");
        Ok(Self {
            _flock: flock,
            path,
        })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
