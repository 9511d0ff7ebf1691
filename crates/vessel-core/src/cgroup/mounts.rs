//! Kernel-facing side of controller discovery and mounting.

use std::path::{Path, PathBuf};

use vessel_common::error::Result;

use super::Controller;
use super::locator::{ControllerLocation, SubsystemLocator};
use crate::filesystem::mount;

/// Locates, mounts, and unmounts controller hierarchies.
pub trait MountBackend: Send + Sync {
    /// Reports where `controller` is currently mounted.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount table cannot be read.
    fn locate(&self, controller: Controller) -> Result<Option<ControllerLocation>>;

    /// Mounts a legacy hierarchy carrying only `controller` at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount fails.
    fn mount(&self, controller: Controller, target: &Path) -> Result<()>;

    /// Unmounts the hierarchy at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the unmount fails.
    fn unmount(&self, target: &Path) -> Result<()>;
}

/// [`MountBackend`] backed by the live mount table and `mount(2)`.
#[derive(Debug, Clone)]
pub struct SystemMounts {
    locator: SubsystemLocator,
}

impl SystemMounts {
    /// Creates a backend that reads the given mountinfo file.
    #[must_use]
    pub fn new(mountinfo: impl Into<PathBuf>) -> Self {
        Self {
            locator: SubsystemLocator::new(mountinfo),
        }
    }
}

impl MountBackend for SystemMounts {
    fn locate(&self, controller: Controller) -> Result<Option<ControllerLocation>> {
        self.locator.locate(controller)
    }

    fn mount(&self, controller: Controller, target: &Path) -> Result<()> {
        mount::mount_cgroup(controller.name(), target)
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        mount::unmount(target)
    }
}
