//! The launch sequence as data.
//!
//! Both privilege modes run the same steps; they differ only in where the
//! user namespace and the identity-map wait sit. Keeping the sequence in a
//! list lets its ordering be inspected and tested without running it.

use std::fmt;

use vessel_common::error::VesselError;
use vessel_core::namespace::{Namespace, NamespaceSet, PrivilegeMode};

/// Namespaces the parent unshares before forking, so the child becomes the
/// init of a new PID namespace.
pub const PARENT_NAMESPACES: [Namespace; 1] = [Namespace::Pid];

/// One step the child performs between fork and exec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStep {
    /// Block until `uid_map` and `gid_map` are populated.
    AwaitIdentityMap,
    /// Move into a new namespace.
    Unshare(Namespace),
    /// Make every mount private so the pivot cannot propagate to the host.
    MakeMountsPrivate,
    /// Bind the root onto itself so it is a mount point.
    BindRoot,
    /// Change into the root.
    EnterRoot,
    /// Pivot into the root, keeping the old one under the pivot directory.
    PivotRoot,
    /// Set the configured hostname.
    SetHostname,
    /// Mount a fresh `/proc`.
    MountProc,
    /// Mount a fresh `/sys`.
    MountSys,
    /// Change to the configured working directory.
    EnterWorkdir,
    /// Replace the process image with the configured program.
    Exec,
}

impl fmt::Display for ChildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitIdentityMap => f.write_str("waiting for identity maps"),
            Self::Unshare(namespace) => write!(f, "unsharing {namespace} namespace"),
            Self::MakeMountsPrivate => f.write_str("making mounts private"),
            Self::BindRoot => f.write_str("bind-mounting root"),
            Self::EnterRoot => f.write_str("entering root"),
            Self::PivotRoot => f.write_str("pivoting root"),
            Self::SetHostname => f.write_str("setting hostname"),
            Self::MountProc => f.write_str("mounting /proc"),
            Self::MountSys => f.write_str("mounting /sys"),
            Self::EnterWorkdir => f.write_str("entering working directory"),
            Self::Exec => f.write_str("executing program"),
        }
    }
}

/// A step that failed, and why.
#[derive(Debug, thiserror::Error)]
#[error("{step} failed: {source}")]
pub struct StepFailure {
    /// The failed step.
    pub step: ChildStep,
    /// Underlying error.
    #[source]
    pub source: VesselError,
}

/// Child-side steps for `mode`, in execution order.
///
/// Every namespace in [`NamespaceSet::for_mode`] not already unshared by
/// the parent is unshared in set order, each followed by the steps that
/// depend on it. In [`PrivilegeMode::Full`] the child waits for its identity
/// maps first, since an external helper writes them for the registered pid.
/// In [`PrivilegeMode::Restricted`] the user namespace comes last in the set,
/// after every namespace that needs host capabilities, and the wait follows it.
#[must_use]
pub fn child_plan(mode: PrivilegeMode) -> Vec<ChildStep> {
    let mut plan = Vec::with_capacity(16);
    if mode == PrivilegeMode::Full {
        plan.push(ChildStep::AwaitIdentityMap);
    }
    for namespace in NamespaceSet::for_mode(mode)
        .iter()
        .filter(|namespace| !PARENT_NAMESPACES.contains(namespace))
    {
        plan.push(ChildStep::Unshare(namespace));
        plan.extend_from_slice(after_unshare(namespace));
    }
    plan.extend([ChildStep::EnterWorkdir, ChildStep::Exec]);
    plan
}

/// Steps that must run right after `namespace` is entered.
const fn after_unshare(namespace: Namespace) -> &'static [ChildStep] {
    match namespace {
        Namespace::Mount => &[
            ChildStep::MakeMountsPrivate,
            ChildStep::BindRoot,
            ChildStep::EnterRoot,
            ChildStep::PivotRoot,
        ],
        Namespace::Uts => &[ChildStep::SetHostname],
        // sysfs is only mountable once the network namespace is owned.
        Namespace::Network => &[ChildStep::MountProc, ChildStep::MountSys],
        Namespace::User => &[ChildStep::AwaitIdentityMap],
        Namespace::Pid | Namespace::Cgroup | Namespace::Ipc => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(plan: &[ChildStep], step: ChildStep) -> usize {
        plan.iter().position(|s| *s == step).unwrap()
    }

    #[test]
    fn full_mode_waits_before_anything_else() {
        let plan = child_plan(PrivilegeMode::Full);
        assert_eq!(plan[0], ChildStep::AwaitIdentityMap);
        assert!(!plan.contains(&ChildStep::Unshare(Namespace::User)));
        assert_eq!(plan.last(), Some(&ChildStep::Exec));
    }

    #[test]
    fn restricted_mode_defers_user_namespace_and_wait() {
        let plan = child_plan(PrivilegeMode::Restricted);
        let user = position(&plan, ChildStep::Unshare(Namespace::User));

        assert!(user > position(&plan, ChildStep::MountSys));
        assert_eq!(plan[user + 1], ChildStep::AwaitIdentityMap);
        assert!(user + 1 < position(&plan, ChildStep::Exec));
    }

    #[test]
    fn mount_namespace_and_pivot_precede_pseudo_filesystems() {
        for mode in [PrivilegeMode::Full, PrivilegeMode::Restricted] {
            let plan = child_plan(mode);
            let mount_ns = position(&plan, ChildStep::Unshare(Namespace::Mount));
            let private = position(&plan, ChildStep::MakeMountsPrivate);
            let pivot = position(&plan, ChildStep::PivotRoot);

            assert!(mount_ns < private && private < pivot);
            assert!(pivot < position(&plan, ChildStep::MountProc));
            assert!(pivot < position(&plan, ChildStep::MountSys));
            assert!(
                position(&plan, ChildStep::Unshare(Namespace::Uts))
                    < position(&plan, ChildStep::SetHostname)
            );
        }
    }

    #[test]
    fn plan_and_parent_cover_the_namespace_set() {
        for mode in [PrivilegeMode::Full, PrivilegeMode::Restricted] {
            let plan = child_plan(mode);
            for namespace in NamespaceSet::for_mode(mode).iter() {
                let in_child = plan.contains(&ChildStep::Unshare(namespace));
                let in_parent = PARENT_NAMESPACES.contains(&namespace);
                assert!(in_child ^ in_parent, "{namespace} unshared exactly once");
            }
        }
    }

    #[test]
    fn full_plan_has_the_expected_order() {
        use ChildStep::{
            AwaitIdentityMap, BindRoot, EnterRoot, EnterWorkdir, Exec, MakeMountsPrivate,
            MountProc, MountSys, PivotRoot, SetHostname, Unshare,
        };
        assert_eq!(
            child_plan(PrivilegeMode::Full),
            vec![
                AwaitIdentityMap,
                Unshare(Namespace::Mount),
                MakeMountsPrivate,
                BindRoot,
                EnterRoot,
                PivotRoot,
                Unshare(Namespace::Uts),
                SetHostname,
                Unshare(Namespace::Cgroup),
                Unshare(Namespace::Ipc),
                Unshare(Namespace::Network),
                MountProc,
                MountSys,
                EnterWorkdir,
                Exec,
            ]
        );
    }

    #[test]
    fn failure_names_the_namespace() {
        let failure = StepFailure {
            step: ChildStep::Unshare(Namespace::Ipc),
            source: VesselError::NamespaceAcquisition {
                namespace: "ipc",
                code: 1,
            },
        };
        assert!(failure.to_string().starts_with("unsharing ipc namespace failed"));
    }
}
