//! Filesystem operations for container isolation.
//!
//! Provides mount-propagation control, bind mounts, pseudo-filesystem
//! mounts, cgroup hierarchy mounts, and `pivot_root`.

pub mod mount;
pub mod pivot_root;
