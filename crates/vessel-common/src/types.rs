//! Domain primitive types used across the vessel workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a container instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a new container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random container ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the per-container directory created under every controller.
    #[must_use]
    pub fn cgroup_name(&self) -> String {
        format!("container_{}", self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// SHA-256 hash digest used for content verification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha256Hash(String);

impl Sha256Hash {
    /// Creates a hash from a hex-encoded string.
    ///
    /// Accepts an optional `sha256:` prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid 64-character hex string.
    pub fn from_hex(hex: impl Into<String>) -> crate::error::Result<Self> {
        let hex = hex.into();
        let digits = hex.strip_prefix("sha256:").unwrap_or(&hex);
        if digits.len() != crate::constants::SHA256_HEX_LENGTH
            || !digits.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(crate::error::VesselError::Config {
                message: format!("invalid SHA-256 hex string: {hex}"),
            });
        }
        Ok(Self(digits.to_ascii_lowercase()))
    }

    /// Returns the hex-encoded hash string.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.0)
    }
}

/// One line of a uid or gid map: `size` ids starting at `container_id`
/// inside the namespace map onto ids starting at `host_id` outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMapping {
    /// First id inside the container.
    #[serde(rename = "containerID")]
    pub container_id: u32,
    /// First id on the host.
    #[serde(rename = "hostID")]
    pub host_id: u32,
    /// Number of consecutive ids mapped.
    #[serde(default = "default_mapping_size")]
    pub size: u32,
}

const fn default_mapping_size() -> u32 {
    1
}

impl IdMapping {
    /// Whether this entry maps container root onto host root.
    #[must_use]
    pub const fn is_root_to_root(&self) -> bool {
        self.container_id == 0 && self.host_id == 0
    }
}

impl fmt::Display for IdMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.container_id, self.host_id, self.size)
    }
}

/// Which cgroup hierarchy model a controller mount belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HierarchyVersion {
    /// Legacy model: one mount per controller (or controller group).
    Legacy,
    /// Unified `cgroup2` hierarchy.
    Unified,
}

impl fmt::Display for HierarchyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "v1"),
            Self::Unified => write!(f, "v2"),
        }
    }
}
