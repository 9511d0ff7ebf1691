//! Container launch orchestration for the vessel launcher.
//!
//! [`launch::Launcher`] prepares the root filesystem, unshares the PID
//! namespace, forks, registers the child with its cgroups, and waits. The
//! child walks the [`plan::child_plan`] for its privilege mode and ends by
//! executing the configured program.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod launch;
pub mod plan;
pub mod process;
pub mod rootfs;
