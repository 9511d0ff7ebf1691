//! In-memory stand-ins for the kernel used by unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use vessel_common::error::{Result, VesselError};
use vessel_common::types::HierarchyVersion;

use super::Controller;
use super::locator::ControllerLocation;
use super::mounts::MountBackend;
use super::writer::{ResourceWriter, WriteOutcome};

/// One recorded write: directory, file name, value.
pub type Write = (PathBuf, String, String);

/// Records every write in order and serves canned reads.
#[derive(Debug, Default)]
pub struct RecordingWriter {
    writes: Mutex<Vec<Write>>,
    reads: Mutex<HashMap<PathBuf, String>>,
    missing: Mutex<Vec<String>>,
}

impl RecordingWriter {
    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn writes_to(&self, file: &str) -> Vec<Write> {
        self.writes()
            .into_iter()
            .filter(|(_, f, _)| f == file)
            .collect()
    }

    pub fn value_of(&self, file: &str) -> Option<String> {
        self.writes_to(file).last().map(|(_, _, v)| v.clone())
    }

    pub fn set_read(&self, path: PathBuf, content: &str) {
        let _ = self.reads.lock().unwrap().insert(path, content.to_string());
    }

    /// Makes writes to `file` report [`WriteOutcome::Skipped`].
    pub fn mark_missing(&self, file: &str) {
        self.missing.lock().unwrap().push(file.to_string());
    }
}

impl ResourceWriter for RecordingWriter {
    fn write(&self, dir: &Path, file: &str, value: &str) -> Result<WriteOutcome> {
        if self.missing.lock().unwrap().iter().any(|m| m == file) {
            return Ok(WriteOutcome::Skipped);
        }
        self.writes
            .lock()
            .unwrap()
            .push((dir.to_path_buf(), file.to_string(), value.to_string()));
        Ok(WriteOutcome::Written)
    }

    fn read(&self, dir: &Path, file: &str) -> Result<String> {
        let path = dir.join(file);
        self.reads
            .lock()
            .unwrap()
            .get(&path)
            .cloned()
            .ok_or_else(|| VesselError::io(&path, std::io::ErrorKind::NotFound.into()))
    }
}

/// Mount table kept in memory; `mount` registers the target, nothing is
/// mounted for real.
#[derive(Debug, Default)]
pub struct FakeMounts {
    table: Mutex<HashMap<Controller, ControllerLocation>>,
    mounted: Mutex<Vec<PathBuf>>,
    unmounted: Mutex<Vec<PathBuf>>,
    fail_on: Option<Controller>,
    delay: Duration,
}

impl FakeMounts {
    pub fn failing_on(controller: Controller) -> Self {
        Self {
            fail_on: Some(controller),
            ..Self::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn preexisting(&self, controller: Controller, mount_point: &Path, version: HierarchyVersion) {
        let _ = self.table.lock().unwrap().insert(
            controller,
            ControllerLocation {
                mount_point: mount_point.to_path_buf(),
                version,
            },
        );
    }

    pub fn mounted(&self) -> Vec<PathBuf> {
        self.mounted.lock().unwrap().clone()
    }

    pub fn unmounted(&self) -> Vec<PathBuf> {
        self.unmounted.lock().unwrap().clone()
    }
}

impl MountBackend for FakeMounts {
    fn locate(&self, controller: Controller) -> Result<Option<ControllerLocation>> {
        Ok(self.table.lock().unwrap().get(&controller).cloned())
    }

    fn mount(&self, controller: Controller, target: &Path) -> Result<()> {
        std::thread::sleep(self.delay);
        if self.fail_on == Some(controller) {
            return Err(VesselError::Mount {
                target: target.to_path_buf(),
                message: "injected failure".into(),
            });
        }
        self.mounted.lock().unwrap().push(target.to_path_buf());
        self.preexisting(controller, target, HierarchyVersion::Legacy);
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        self.table
            .lock()
            .unwrap()
            .retain(|_, location| location.mount_point != target);
        self.unmounted.lock().unwrap().push(target.to_path_buf());
        Ok(())
    }
}
