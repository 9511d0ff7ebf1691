//! Linux namespace model for container isolation.
//!
//! A launch runs in one of two [`PrivilegeMode`]s, decided from the uid
//! mapping table. The mode fixes which namespaces are requested and when
//! the user namespace joins in.

pub mod unshare;
pub mod user;
pub mod uts;

use std::fmt;

use vessel_common::types::IdMapping;

/// A namespace kind the launcher can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Process ids.
    Pid,
    /// Mount table.
    Mount,
    /// Hostname and domain name.
    Uts,
    /// Cgroup root view.
    Cgroup,
    /// System V IPC and POSIX message queues.
    Ipc,
    /// Network devices, stacks, and ports.
    Network,
    /// User and group ids.
    User,
}

impl Namespace {
    /// Short kernel name, as in `/proc/<pid>/ns/<name>`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pid => "pid",
            Self::Mount => "mnt",
            Self::Uts => "uts",
            Self::Cgroup => "cgroup",
            Self::Ipc => "ipc",
            Self::Network => "net",
            Self::User => "user",
        }
    }

    /// `clone(2)` flag that creates this namespace.
    #[cfg(target_os = "linux")]
    #[must_use]
    pub const fn flag(self) -> nix::sched::CloneFlags {
        use nix::sched::CloneFlags;

        match self {
            Self::Pid => CloneFlags::CLONE_NEWPID,
            Self::Mount => CloneFlags::CLONE_NEWNS,
            Self::Uts => CloneFlags::CLONE_NEWUTS,
            Self::Cgroup => CloneFlags::CLONE_NEWCGROUP,
            Self::Ipc => CloneFlags::CLONE_NEWIPC,
            Self::Network => CloneFlags::CLONE_NEWNET,
            Self::User => CloneFlags::CLONE_NEWUSER,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How much the launching user may do on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeMode {
    /// Container root is host root. Identity maps are written by an
    /// external helper before the child builds its namespaces.
    Full,
    /// Container root is not host root. The user namespace is created last,
    /// after every namespace that needs host capabilities.
    Restricted,
}

impl PrivilegeMode {
    /// `Full` when some entry maps container id 0 to host id 0.
    #[must_use]
    pub fn detect(mappings: &[IdMapping]) -> Self {
        if mappings.iter().any(IdMapping::is_root_to_root) {
            Self::Full
        } else {
            Self::Restricted
        }
    }
}

impl fmt::Display for PrivilegeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Restricted => f.write_str("restricted"),
        }
    }
}

/// Namespaces a container gets, in the order they are unshared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceSet(Vec<Namespace>);

impl NamespaceSet {
    /// Namespaces requested in `mode`.
    #[must_use]
    pub fn for_mode(mode: PrivilegeMode) -> Self {
        let mut namespaces = vec![
            Namespace::Pid,
            Namespace::Mount,
            Namespace::Uts,
            Namespace::Cgroup,
            Namespace::Ipc,
            Namespace::Network,
        ];
        if mode == PrivilegeMode::Restricted {
            namespaces.push(Namespace::User);
        }
        Self(namespaces)
    }

    /// Whether `namespace` is requested.
    #[must_use]
    pub fn contains(&self, namespace: Namespace) -> bool {
        self.0.contains(&namespace)
    }

    /// Requested namespaces in unshare order.
    pub fn iter(&self) -> impl Iterator<Item = Namespace> + '_ {
        self.0.iter().copied()
    }
}
