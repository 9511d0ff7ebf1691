//! Launch configuration model and runtime options.
//!
//! The launch configuration is a JSON document in an OCI-like layout:
//!
//! ```json
//! {
//!   "id": "web",
//!   "hostname": "web",
//!   "root": { "path": "/var/lib/vessel/web", "bundle": "rootfs.tar.gz" },
//!   "process": { "cwd": "/", "env": ["PATH=/bin"], "args": ["/bin/sh"] },
//!   "linux": {
//!     "cgroupsPath": "/tmp/cgroup",
//!     "resources": { "memory": { "limit": 104857600 } },
//!     "uidMappings": [{ "containerID": 0, "hostID": 1000, "size": 1 }],
//!     "gidMappings": [{ "containerID": 0, "hostID": 1000, "size": 1 }]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Result, VesselError};
use crate::resources::ResourceSpec;
use crate::types::{ContainerId, IdMapping};

/// Everything needed to launch one container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerConfig {
    /// Container identity. Generated when absent.
    #[serde(default = "ContainerId::generate")]
    pub id: ContainerId,
    /// Hostname set inside the UTS namespace.
    pub hostname: String,
    /// Root filesystem location and source archive.
    pub root: RootConfig,
    /// Entry program.
    pub process: ProcessSpec,
    /// Linux-specific settings.
    #[serde(default)]
    pub linux: LinuxConfig,
}

/// Root filesystem of the container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootConfig {
    /// Directory that becomes `/` after the pivot.
    pub path: PathBuf,
    /// Archive extracted into `path` when that directory is empty.
    pub bundle: Option<PathBuf>,
    /// Expected SHA-256 of `bundle`.
    pub bundle_digest: Option<String>,
}

/// The process executed as the container's init.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSpec {
    /// Working directory inside the new root.
    #[serde(default = "default_cwd")]
    pub cwd: PathBuf,
    /// Environment as `KEY=VALUE` strings.
    #[serde(default)]
    pub env: Vec<String>,
    /// Argument vector; `args[0]` is the program.
    pub args: Vec<String>,
}

fn default_cwd() -> PathBuf {
    PathBuf::from("/")
}

/// Namespaces, cgroups, and identity mappings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxConfig {
    /// Base directory for controller mount points created by vessel.
    pub cgroups_path: Option<PathBuf>,
    /// Resource limits.
    #[serde(default)]
    pub resources: ResourceSpec,
    /// User id map, in order.
    #[serde(default)]
    pub uid_mappings: Vec<IdMapping>,
    /// Group id map, in order.
    #[serde(default)]
    pub gid_mappings: Vec<IdMapping>,
}

impl ContainerConfig {
    /// Reads and validates a launch configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON for
    /// this model, or fails [`ContainerConfig::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| VesselError::io(path, e))?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), id = %config.id, "launch configuration loaded");
        Ok(config)
    }

    /// Checks the invariants the launcher relies on before forking.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        let id = self.id.as_str();
        if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\0']) {
            return Err(VesselError::Config {
                message: format!("id must be a single path component: {id:?}"),
            });
        }
        if self.process.args.is_empty() {
            return Err(VesselError::Config {
                message: "process.args must name the program to run".into(),
            });
        }
        if self.hostname.is_empty() {
            return Err(VesselError::Config {
                message: "hostname must not be empty".into(),
            });
        }
        if !self.root.path.is_absolute() {
            return Err(VesselError::Config {
                message: format!("root.path must be absolute: {}", self.root.path.display()),
            });
        }
        let _ = self.process.environment()?;
        Ok(())
    }

    /// Directory under which missing controllers are mounted.
    #[must_use]
    pub fn cgroup_base(&self) -> PathBuf {
        self.linux
            .cgroups_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_CGROUP_BASE))
    }
}

impl ProcessSpec {
    /// Splits the `KEY=VALUE` entries into a map. Values may contain `=`.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::Config`] for an entry without `=` or with an
    /// empty key.
    pub fn environment(&self) -> Result<BTreeMap<String, String>> {
        self.env
            .iter()
            .map(|entry| match entry.split_once('=') {
                Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
                _ => Err(VesselError::Config {
                    message: format!("environment entry is not KEY=VALUE: {entry}"),
                }),
            })
            .collect()
    }
}

/// Tunables of the launcher that are not part of the container itself.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Upper bound on the identity-map readiness wait.
    pub map_timeout: Duration,
    /// Interval between identity-map polls.
    pub map_poll_interval: Duration,
    /// Name of the directory inside the root that receives the old root.
    pub pivot_dir: String,
    /// Mount table consulted when locating controllers.
    pub mountinfo: PathBuf,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            map_timeout: Duration::from_secs(constants::DEFAULT_MAP_TIMEOUT_SECS),
            map_poll_interval: Duration::from_millis(constants::DEFAULT_MAP_POLL_MS),
            pivot_dir: constants::PIVOT_DIR.to_string(),
            mountinfo: PathBuf::from(constants::MOUNTINFO_PATH),
        }
    }
}
