//! Finds where a controller is mounted by reading the live mount table.

use std::path::{Path, PathBuf};

use vessel_common::constants::CGROUP_SUBTREE_CONTROL;
use vessel_common::error::{Result, VesselError};
use vessel_common::types::HierarchyVersion;

use super::Controller;

/// Where a controller is mounted and on which hierarchy model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerLocation {
    /// Mount point of the hierarchy.
    pub mount_point: PathBuf,
    /// Hierarchy model of that mount.
    pub version: HierarchyVersion,
}

/// One line of `/proc/<pid>/mountinfo`, reduced to what the locator needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Mount point, with octal escapes decoded.
    pub mount_point: PathBuf,
    /// Filesystem type, e.g. `cgroup` or `cgroup2`.
    pub fs_type: String,
    /// Per-superblock options; for legacy cgroup mounts these name the
    /// attached controllers.
    pub super_options: Vec<String>,
}

/// Parses mountinfo content. Malformed lines are ignored.
#[must_use]
pub fn parse_mountinfo(content: &str) -> Vec<MountEntry> {
    content.lines().filter_map(parse_line).collect()
}

// Format: id parent major:minor root mount_point options [optional...] - fstype source super_options
fn parse_line(line: &str) -> Option<MountEntry> {
    let (head, tail) = line.split_once(" - ")?;
    let mount_point = head.split_whitespace().nth(4)?;
    let mut tail = tail.split_whitespace();
    let fs_type = tail.next()?;
    let _source = tail.next()?;
    let super_options = tail
        .next()
        .map(|opts| opts.split(',').map(str::to_string).collect())
        .unwrap_or_default();
    Some(MountEntry {
        mount_point: PathBuf::from(unescape(mount_point)),
        fs_type: fs_type.to_string(),
        super_options,
    })
}

/// Decodes the `\ooo` octal escapes the kernel uses for spaces, tabs,
/// newlines, and backslashes.
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = (bytes[i] == b'\\')
            .then(|| field.get(i + 1..i + 4))
            .flatten()
            .and_then(|oct| u8::from_str_radix(oct, 8).ok());
        if let Some(byte) = escaped {
            out.push(byte);
            i += 4;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Resolves controller mount points from a mountinfo file.
#[derive(Debug, Clone)]
pub struct SubsystemLocator {
    mountinfo: PathBuf,
}

impl SubsystemLocator {
    /// Creates a locator reading the given mountinfo file.
    #[must_use]
    pub fn new(mountinfo: impl Into<PathBuf>) -> Self {
        Self {
            mountinfo: mountinfo.into(),
        }
    }

    /// Reports where `controller` is mounted.
    ///
    /// Legacy mounts whose options name the controller win over unified
    /// mounts that list it in `cgroup.subtree_control`. Returns `None` when
    /// the controller is not mounted anywhere.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount table cannot be read.
    pub fn locate(&self, controller: Controller) -> Result<Option<ControllerLocation>> {
        let content = std::fs::read_to_string(&self.mountinfo)
            .map_err(|e| VesselError::io(&self.mountinfo, e))?;
        let entries = parse_mountinfo(&content);
        let location = locate_in(&entries, controller);
        tracing::debug!(
            controller = %controller,
            location = ?location,
            "controller lookup"
        );
        Ok(location)
    }
}

/// Searches parsed mount entries for `controller`.
#[must_use]
pub fn locate_in(entries: &[MountEntry], controller: Controller) -> Option<ControllerLocation> {
    let name = controller.name();
    let legacy = entries
        .iter()
        .find(|e| e.fs_type == "cgroup" && e.super_options.iter().any(|o| o == name));
    if let Some(entry) = legacy {
        return Some(ControllerLocation {
            mount_point: entry.mount_point.clone(),
            version: HierarchyVersion::Legacy,
        });
    }
    entries
        .iter()
        .filter(|e| e.fs_type == "cgroup2")
        .find(|e| subtree_lists(&e.mount_point, name))
        .map(|entry| ControllerLocation {
            mount_point: entry.mount_point.clone(),
            version: HierarchyVersion::Unified,
        })
}

fn subtree_lists(mount_point: &Path, name: &str) -> bool {
    let path = mount_point.join(CGROUP_SUBTREE_CONTROL);
    match std::fs::read_to_string(&path) {
        Ok(content) => content.split_whitespace().any(|c| c == name),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "unified control file unreadable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: u32, mount_point: &Path, fs_type: &str, opts: &str) -> String {
        format!(
            "{id} 1 0:{id} / {} rw,nosuid shared:{id} - {fs_type} cgroup {opts}\n",
            mount_point.display()
        )
    }

    #[test]
    fn parses_optional_fields_and_super_options() {
        let entries = parse_mountinfo(
            "30 25 0:26 / /sys/fs/cgroup/cpu,cpuacct rw,nosuid shared:11 master:2 - cgroup cgroup rw,cpu,cpuacct\n\
             garbage line\n",
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mount_point, PathBuf::from("/sys/fs/cgroup/cpu,cpuacct"));
        assert_eq!(entries[0].fs_type, "cgroup");
        assert_eq!(entries[0].super_options, vec!["rw", "cpu", "cpuacct"]);
    }

    #[test]
    fn decodes_escaped_mount_points() {
        let entries =
            parse_mountinfo("40 1 0:40 / /mnt/with\\040space rw - tmpfs tmpfs rw\n");
        assert_eq!(entries[0].mount_point, PathBuf::from("/mnt/with space"));
    }

    #[test]
    fn option_substring_does_not_match() {
        let entries = parse_mountinfo(
            "30 25 0:26 / /cg/cpuacct rw - cgroup cgroup rw,cpuacct\n",
        );
        assert_eq!(locate_in(&entries, Controller::Cpu), None);
    }

    #[test]
    fn legacy_mount_wins_over_unified() {
        let dir = tempfile::tempdir().unwrap();
        let unified = dir.path().join("unified");
        let legacy = dir.path().join("memory");
        std::fs::create_dir_all(&unified).unwrap();
        std::fs::write(unified.join(CGROUP_SUBTREE_CONTROL), "cpu memory pids\n").unwrap();
        let content = line(1, &unified, "cgroup2", "rw") + &line(2, &legacy, "cgroup", "rw,memory");

        let location = locate_in(&parse_mountinfo(&content), Controller::Memory).unwrap();

        assert_eq!(location.mount_point, legacy);
        assert_eq!(location.version, HierarchyVersion::Legacy);
    }

    #[test]
    fn falls_back_to_unified_subtree_control() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CGROUP_SUBTREE_CONTROL), "cpu io pids").unwrap();
        let content = line(1, dir.path(), "cgroup2", "rw");
        let entries = parse_mountinfo(&content);

        let pids = locate_in(&entries, Controller::Pids).unwrap();
        assert_eq!(pids.version, HierarchyVersion::Unified);
        assert_eq!(locate_in(&entries, Controller::Memory), None);
    }

    #[test]
    fn locate_reads_mountinfo_file() {
        let dir = tempfile::tempdir().unwrap();
        let mountinfo = dir.path().join("mountinfo");
        std::fs::write(&mountinfo, line(7, Path::new("/cg/pids"), "cgroup", "rw,pids")).unwrap();

        let locator = SubsystemLocator::new(&mountinfo);

        let pids = locator.locate(Controller::Pids).unwrap().unwrap();
        assert_eq!(pids.mount_point, PathBuf::from("/cg/pids"));
        assert!(locator.locate(Controller::Devices).unwrap().is_none());
    }

    #[test]
    fn unreadable_mount_table_is_an_error() {
        let locator = SubsystemLocator::new("/nonexistent/mountinfo");
        assert!(locator.locate(Controller::Pids).is_err());
    }
}
