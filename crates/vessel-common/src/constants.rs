//! System-wide constants and default paths.

/// Application name used in CLI output.
pub const APP_NAME: &str = "vessel";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "vessel";

/// Base directory for controller mount points created by vessel when the
/// launch configuration does not name one.
pub const DEFAULT_CGROUP_BASE: &str = "/var/lib/vessel/cgroup";

/// Live mount table of the calling process.
pub const MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

/// Procfs directory of the calling process.
pub const PROC_SELF: &str = "/proc/self";

/// Membership file present in every cgroup directory.
pub const CGROUP_PROCS: &str = "cgroup.procs";

/// Control file listing the controllers enabled for children of a
/// unified-hierarchy cgroup.
pub const CGROUP_SUBTREE_CONTROL: &str = "cgroup.subtree_control";

/// Directory inside the new root that receives the old root on pivot.
pub const PIVOT_DIR: &str = "put_old";

/// Default upper bound on the identity-map readiness wait, in seconds.
pub const DEFAULT_MAP_TIMEOUT_SECS: u64 = 30;

/// Default identity-map poll interval, in milliseconds.
pub const DEFAULT_MAP_POLL_MS: u64 = 1000;

/// SHA-256 digest length in hex characters.
pub const SHA256_HEX_LENGTH: usize = 64;
