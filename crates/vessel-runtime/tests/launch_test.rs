//! Launch orchestration tests that run without privileges.
//!
//! Namespace acquisition goes through a recording fake, so these tests stop
//! at (or never reach) the fork and never touch the host's namespaces.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vessel_common::config::{ContainerConfig, RuntimeOptions};
use vessel_common::error::{Result, VesselError};
use vessel_common::resources::ResourceSpec;
use vessel_core::cgroup::hierarchy::CgroupHierarchy;
use vessel_core::cgroup::mounts::SystemMounts;
use vessel_core::cgroup::writer::FsWriter;
use vessel_core::namespace::unshare::NamespaceSyscall;
use vessel_core::namespace::{Namespace, PrivilegeMode};
use vessel_runtime::launch::Launcher;
use vessel_runtime::plan::ChildStep;
use vessel_runtime::process::ExecSpec;

#[derive(Clone, Default)]
struct RecordingSyscall {
    calls: Arc<Mutex<Vec<Namespace>>>,
    refuse: Option<Namespace>,
}

impl RecordingSyscall {
    fn refusing(namespace: Namespace) -> Self {
        Self {
            refuse: Some(namespace),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Namespace> {
        self.calls.lock().unwrap().clone()
    }
}

impl NamespaceSyscall for RecordingSyscall {
    fn unshare(&self, namespace: Namespace) -> Result<()> {
        self.calls.lock().unwrap().push(namespace);
        if self.refuse == Some(namespace) {
            return Err(VesselError::NamespaceAcquisition {
                namespace: namespace.name(),
                code: 1,
            });
        }
        Ok(())
    }
}

fn config(root: &Path, bundle: Option<&Path>, uid_host: u32, env: &[&str]) -> ContainerConfig {
    serde_json::from_value(serde_json::json!({
        "id": "test",
        "hostname": "box",
        "root": { "path": root, "bundle": bundle },
        "process": { "cwd": "/", "env": env, "args": ["/bin/sh"] },
        "linux": {
            "uidMappings": [{ "containerID": 0, "hostID": uid_host }],
            "gidMappings": [{ "containerID": 0, "hostID": uid_host }]
        }
    }))
    .unwrap()
}

fn empty_hierarchy(base: &Path) -> CgroupHierarchy {
    CgroupHierarchy::create(
        "container_test",
        &ResourceSpec::default(),
        base,
        Arc::new(SystemMounts::new("/nonexistent/mountinfo")),
        Arc::new(FsWriter),
    )
    .unwrap()
}

fn bundle_with_sh(dir: &Path) -> PathBuf {
    let path = dir.join("rootfs.tar");
    let mut builder = tar::Builder::new(std::fs::File::create(&path).unwrap());
    let data = b"#!shell";
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder.append_data(&mut header, "bin/sh", &data[..]).unwrap();
    builder.finish().unwrap();
    path
}

#[test]
fn refused_pid_namespace_stops_before_fork() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    let bundle = bundle_with_sh(dir.path());
    let syscall = RecordingSyscall::refusing(Namespace::Pid);
    let launcher = Launcher::new(config(&root, Some(&bundle), 0, &[]), RuntimeOptions::default())
        .with_syscall(Box::new(syscall.clone()));

    let err = launcher.launch(&empty_hierarchy(&dir.path().join("cg"))).unwrap_err();

    assert!(matches!(
        err,
        VesselError::NamespaceAcquisition { namespace: "pid", .. }
    ));
    assert_eq!(syscall.calls(), vec![Namespace::Pid]);
    assert!(root.join("bin/sh").is_file(), "root prepared before unshare");
    assert!(root.join("put_old").is_dir());
}

#[test]
fn populated_root_never_reads_the_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    std::fs::create_dir_all(root.join("bin")).unwrap();
    let missing_bundle = dir.path().join("does-not-exist.tar");
    let launcher = Launcher::new(
        config(&root, Some(&missing_bundle), 0, &[]),
        RuntimeOptions::default(),
    )
    .with_syscall(Box::new(RecordingSyscall::refusing(Namespace::Pid)));

    let err = launcher.launch(&empty_hierarchy(&dir.path().join("cg"))).unwrap_err();

    assert!(matches!(err, VesselError::NamespaceAcquisition { .. }));
    assert!(!root.join("bin/sh").exists());
}

#[test]
fn malformed_environment_fails_before_anything_is_touched() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    let syscall = RecordingSyscall::default();
    let launcher = Launcher::new(config(&root, None, 0, &["JUSTAKEY"]), RuntimeOptions::default())
        .with_syscall(Box::new(syscall.clone()));

    let err = launcher.launch(&empty_hierarchy(&dir.path().join("cg"))).unwrap_err();

    assert!(matches!(err, VesselError::Config { .. }));
    assert!(syscall.calls().is_empty());
    assert!(!root.exists());
}

#[test]
fn mode_follows_uid_table() {
    let dir = tempfile::tempdir().unwrap();
    let full = Launcher::new(config(dir.path(), None, 0, &[]), RuntimeOptions::default());
    let restricted = Launcher::new(config(dir.path(), None, 1000, &[]), RuntimeOptions::default());

    assert_eq!(full.mode(), PrivilegeMode::Full);
    assert_eq!(restricted.mode(), PrivilegeMode::Restricted);
}

#[test]
fn helper_command_names_config_and_pid() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = Launcher::new(config(dir.path(), None, 0, &[]), RuntimeOptions::default())
        .with_config_path("/etc/vessel/web.json");

    assert_eq!(
        launcher.helper_command(4242),
        "vessel map --config /etc/vessel/web.json 4242"
    );
}

#[test]
fn failed_unshare_step_names_its_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), None, 0, &[]);
    let exec = ExecSpec::prepare(&cfg.process).unwrap();
    let syscall = RecordingSyscall::refusing(Namespace::Ipc);
    let launcher =
        Launcher::new(cfg, RuntimeOptions::default()).with_syscall(Box::new(syscall.clone()));
    let steps = [
        ChildStep::Unshare(Namespace::Cgroup),
        ChildStep::Unshare(Namespace::Ipc),
        ChildStep::Unshare(Namespace::Network),
    ];

    let failure = launcher.run_steps(&steps, &exec).unwrap_err();

    assert_eq!(failure.step, ChildStep::Unshare(Namespace::Ipc));
    assert!(failure.to_string().contains("ipc"));
    assert_eq!(syscall.calls(), vec![Namespace::Cgroup, Namespace::Ipc]);
}

#[test]
fn identity_wait_step_uses_configured_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let proc_self = dir.path().join("proc");
    std::fs::create_dir(&proc_self).unwrap();
    std::fs::write(proc_self.join("uid_map"), "").unwrap();
    std::fs::write(proc_self.join("gid_map"), "").unwrap();
    let cfg = config(dir.path(), None, 1000, &[]);
    let exec = ExecSpec::prepare(&cfg.process).unwrap();
    let options = RuntimeOptions {
        map_timeout: Duration::from_millis(50),
        map_poll_interval: Duration::from_millis(10),
        ..RuntimeOptions::default()
    };
    let launcher = Launcher::new(cfg, options).with_proc_self(&proc_self);

    let failure = launcher
        .run_steps(&[ChildStep::AwaitIdentityMap], &exec)
        .unwrap_err();
    assert!(matches!(
        failure.source,
        VesselError::IdentityMappingTimeout { .. }
    ));

    std::fs::write(proc_self.join("uid_map"), "0 1000 1\n").unwrap();
    std::fs::write(proc_self.join("gid_map"), "0 1000 1\n").unwrap();
    launcher
        .run_steps(&[ChildStep::AwaitIdentityMap], &exec)
        .unwrap();
}
