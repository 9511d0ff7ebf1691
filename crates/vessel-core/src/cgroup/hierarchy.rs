//! Per-container cgroup hierarchy spanning every required controller.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use vessel_common::constants::CGROUP_PROCS;
use vessel_common::error::{Result, VesselError};
use vessel_common::resources::ResourceSpec;
use vessel_common::types::HierarchyVersion;

use super::lock::ControllerLock;
use super::mounts::MountBackend;
use super::writer::{ResourceWriter, WriteOutcome};
use super::{Controller, configure, required_controllers};

/// What the hierarchy knows about one controller it manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerInfo {
    /// The controller.
    pub controller: Controller,
    /// Mount point of its hierarchy, once resolved.
    pub mount_point: Option<PathBuf>,
    /// Whether this hierarchy mounted it, and so must unmount it.
    pub mounted_by_us: bool,
    /// Hierarchy model of the mount, once resolved.
    pub version: Option<HierarchyVersion>,
}

impl ControllerInfo {
    const fn unresolved(controller: Controller) -> Self {
        Self {
            controller,
            mount_point: None,
            mounted_by_us: false,
            version: None,
        }
    }
}

/// Handle to the cgroups of one container across all its controllers.
///
/// Construction either fully succeeds or leaves nothing behind. Dropping
/// the handle does not tear anything down: call [`CgroupHierarchy::teardown`].
pub struct CgroupHierarchy {
    name: String,
    base_dir: PathBuf,
    controllers: Vec<ControllerInfo>,
    backend: Arc<dyn MountBackend>,
    writer: Arc<dyn ResourceWriter>,
}

impl std::fmt::Debug for CgroupHierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CgroupHierarchy")
            .field("name", &self.name)
            .field("base_dir", &self.base_dir)
            .field("controllers", &self.controllers)
            .finish_non_exhaustive()
    }
}

impl CgroupHierarchy {
    /// Provisions and configures every controller `spec` requires.
    ///
    /// For each controller: find its mount, or mount it under
    /// `base_dir/<controller>`; create `<mount>/<name>`; write the settings.
    /// On any failure everything done so far is torn down before the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::ConfigurationConflict`] if a controller lives
    /// on the unified hierarchy, or the first mount, I/O, or configuration
    /// error encountered.
    pub fn create(
        name: &str,
        spec: &ResourceSpec,
        base_dir: &Path,
        backend: Arc<dyn MountBackend>,
        writer: Arc<dyn ResourceWriter>,
    ) -> Result<Self> {
        let mut hierarchy = Self {
            name: name.to_string(),
            base_dir: base_dir.to_path_buf(),
            controllers: Vec::new(),
            backend,
            writer,
        };
        if let Err(e) = hierarchy.provision(spec) {
            tracing::error!(name, error = %e, "cgroup hierarchy setup failed, cleaning up");
            hierarchy.teardown();
            return Err(e);
        }
        tracing::info!(
            name,
            controllers = hierarchy.controllers.len(),
            "cgroup hierarchy created"
        );
        Ok(hierarchy)
    }

    fn provision(&mut self, spec: &ResourceSpec) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir).map_err(|e| VesselError::io(&self.base_dir, e))?;
        for controller in required_controllers(spec) {
            let dir = self.attach(controller)?;
            configure(controller, self.writer.as_ref(), &dir, spec)?;
        }
        Ok(())
    }

    /// Records `controller`, resolves its mount point (mounting it if
    /// needed) and creates this container's directory under it. Runs under
    /// the controller's lock so a concurrent teardown cannot unmount in
    /// between. Returns the container's directory.
    fn attach(&mut self, controller: Controller) -> Result<PathBuf> {
        let _lock = ControllerLock::acquire(&self.base_dir, controller)?;
        self.controllers.push(ControllerInfo::unresolved(controller));

        let (mount_point, mounted_by_us) = match self.backend.locate(controller)? {
            Some(location) if location.version == HierarchyVersion::Unified => {
                return Err(VesselError::ConfigurationConflict {
                    controller: controller.name().to_string(),
                    mount_point: location.mount_point,
                });
            }
            Some(location) => (location.mount_point, false),
            None => (self.mount_new(controller)?, true),
        };

        if let Some(info) = self.controllers.last_mut() {
            info.mount_point = Some(mount_point.clone());
            info.mounted_by_us = mounted_by_us;
            info.version = Some(HierarchyVersion::Legacy);
        }

        let dir = mount_point.join(&self.name);
        if !dir.exists() {
            std::fs::create_dir(&dir).map_err(|e| VesselError::io(&dir, e))?;
            tracing::debug!(dir = %dir.display(), "cgroup directory created");
        }
        Ok(dir)
    }

    fn mount_new(&self, controller: Controller) -> Result<PathBuf> {
        let target = self.base_dir.join(controller.name());
        let created = !target.exists();
        std::fs::create_dir_all(&target).map_err(|e| VesselError::io(&target, e))?;
        if let Err(e) = self.backend.mount(controller, &target) {
            if created {
                if let Err(rm) = std::fs::remove_dir(&target) {
                    tracing::warn!(path = %target.display(), error = %rm, "removing mount point failed");
                }
            }
            return Err(e);
        }
        Ok(target)
    }

    /// Adds every process in `pids` to this container's cgroup on every
    /// managed controller.
    ///
    /// A failure on one controller does not stop the others.
    ///
    /// # Errors
    ///
    /// Returns the first failure after all controllers were attempted.
    pub fn apply(&self, pids: &[u32]) -> Result<()> {
        let mut first_error = None;
        for info in &self.controllers {
            let Some(mount_point) = &info.mount_point else {
                continue;
            };
            let dir = mount_point.join(&self.name);
            for &pid in pids {
                if let Err(e) = self.add_member(&dir, pid) {
                    tracing::warn!(controller = %info.controller, pid, error = %e, "adding process failed");
                    let _ = first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn add_member(&self, dir: &Path, pid: u32) -> Result<()> {
        match self.writer.write(dir, CGROUP_PROCS, &pid.to_string())? {
            WriteOutcome::Written => {
                tracing::debug!(pid, dir = %dir.display(), "process added to cgroup");
                Ok(())
            }
            WriteOutcome::Skipped => Err(VesselError::NotFound {
                kind: "cgroup membership file",
                id: dir.join(CGROUP_PROCS).display().to_string(),
            }),
        }
    }

    /// Removes everything this hierarchy set up, best effort.
    ///
    /// For each controller: members of the container cgroup move back to
    /// the root cgroup, the container directory is removed, and a mount made
    /// by this hierarchy is unmounted and its directory removed. A mount that
    /// still holds other cgroups stays mounted. Failures are logged and
    /// cleanup continues. A second call does nothing.
    pub fn teardown(&mut self) {
        let records = std::mem::take(&mut self.controllers);
        if records.is_empty() {
            return;
        }
        tracing::info!(name = %self.name, "tearing down cgroup hierarchy");
        for info in records.iter().rev() {
            if let Some(mount_point) = &info.mount_point {
                self.release(info.controller, mount_point, info.mounted_by_us);
            }
        }
        tracing::info!(name = %self.name, "cgroup hierarchy torn down");
    }

    fn release(&self, controller: Controller, mount_point: &Path, mounted_by_us: bool) {
        let lock = ControllerLock::acquire(&self.base_dir, controller)
            .inspect_err(|e| tracing::warn!(controller = %controller, error = %e, "controller lock unavailable"))
            .ok();
        let dir = mount_point.join(&self.name);
        if dir.exists() {
            self.migrate_members(controller, &dir, mount_point);
            match std::fs::remove_dir(&dir) {
                Ok(()) => tracing::debug!(dir = %dir.display(), "cgroup directory removed"),
                Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "removing cgroup directory failed"),
            }
        }
        if !mounted_by_us || !mount_point.exists() {
            return;
        }
        // Without the lock another hierarchy may be attaching right now.
        if lock.is_none() || has_child_cgroups(mount_point) {
            tracing::warn!(
                controller = %controller,
                path = %mount_point.display(),
                "controller mount still in use, leaving it mounted"
            );
            return;
        }
        if let Err(e) = self.backend.unmount(mount_point) {
            tracing::warn!(controller = %controller, error = %e, "unmounting controller failed");
        }
        if let Err(e) = std::fs::remove_dir(mount_point) {
            tracing::warn!(path = %mount_point.display(), error = %e, "removing mount point failed");
        }
    }

    // One write per process: cgroup.procs accepts a single pid per write.
    fn migrate_members(&self, controller: Controller, dir: &Path, root: &Path) {
        let members = match self.writer.read(dir, CGROUP_PROCS) {
            Ok(members) => members,
            Err(e) => {
                tracing::warn!(controller = %controller, error = %e, "reading cgroup members failed");
                return;
            }
        };
        for pid in members.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Err(e) = self.writer.write(root, CGROUP_PROCS, pid) {
                tracing::warn!(controller = %controller, pid, error = %e, "migrating process failed");
            }
        }
    }

    /// Name of the per-container directory under each controller.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records of the controllers currently managed.
    #[must_use]
    pub fn controllers(&self) -> &[ControllerInfo] {
        &self.controllers
    }

    /// Directory of this container's cgroup for `controller`, if managed.
    #[must_use]
    pub fn cgroup_dir(&self, controller: Controller) -> Option<PathBuf> {
        self.controllers
            .iter()
            .find(|info| info.controller == controller)
            .and_then(|info| info.mount_point.as_ref())
            .map(|mount_point| mount_point.join(&self.name))
    }
}

/// Whether any cgroup directory other than the root remains under `mount_point`.
fn has_child_cgroups(mount_point: &Path) -> bool {
    match std::fs::read_dir(mount_point) {
        Ok(entries) => entries
            .filter_map(std::result::Result::ok)
            .any(|entry| entry.file_type().is_ok_and(|t| t.is_dir())),
        Err(e) => {
            tracing::warn!(path = %mount_point.display(), error = %e, "listing controller mount failed");
            true
        }
    }
}
