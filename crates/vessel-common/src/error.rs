//! Unified error types for the vessel workspace.
//!
//! Every library crate returns [`VesselError`]; the CLI wraps it in
//! `anyhow` for reporting.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum VesselError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A controller required on the legacy hierarchy is mounted on the
    /// unified hierarchy instead.
    #[error("controller {controller} is attached to the unified hierarchy at {mount_point}")]
    ConfigurationConflict {
        /// Controller name, e.g. `cpu`.
        controller: String,
        /// Where the unified hierarchy holding it is mounted.
        mount_point: PathBuf,
    },

    /// Mounting or unmounting a filesystem failed.
    #[error("mount operation on {target} failed: {message}")]
    Mount {
        /// Mount target.
        target: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// An `unshare(2)` request for a namespace was refused.
    #[error("unshare {namespace} namespace failed (errno {code})")]
    NamespaceAcquisition {
        /// Name of the namespace, e.g. `pid`.
        namespace: &'static str,
        /// Raw OS error code.
        code: i32,
    },

    /// The uid/gid maps of the process were not populated in time.
    #[error("identity mapping not established after {waited:?}")]
    IdentityMappingTimeout {
        /// How long the wait lasted.
        waited: Duration,
    },

    /// A blocking operation was interrupted by a cancellation signal.
    #[error("cancelled: {message}")]
    Cancelled {
        /// What was being waited on.
        message: String,
    },

    /// A hash validation failed.
    #[error("hash mismatch for {resource}: expected {expected}, got {actual}")]
    HashMismatch {
        /// Resource that failed validation.
        resource: String,
        /// Expected hash value.
        expected: String,
        /// Actual computed hash value.
        actual: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl VesselError {
    /// Shorthand for a [`VesselError::Io`] at `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, VesselError>;
