//! # vessel-core
//!
//! Low-level Linux isolation primitives for the vessel launcher.
//!
//! This crate provides safe abstractions over:
//! - **Cgroups (legacy hierarchy)**: locating or mounting per-controller
//!   hierarchies, writing controller files, membership, and teardown.
//! - **Namespaces**: `unshare(2)` per namespace, privilege-mode detection,
//!   and uid/gid map handling.
//! - **Filesystem**: propagation, bind mounts, pseudo-filesystems, and
//!   `pivot_root`.
//!
//! All unsafe system calls are encapsulated in safe wrappers with
//! proper error handling and `// SAFETY:` documentation.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cgroup;
pub mod filesystem;
pub mod namespace;
