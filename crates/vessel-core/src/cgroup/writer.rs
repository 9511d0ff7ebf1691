//! Single point of contact with controller files.
//!
//! Controllers and kernel features vary between hosts, so a missing control
//! file is a skip, never an error.

use std::fmt::Display;
use std::io::Write;
use std::path::Path;

use vessel_common::error::{Result, VesselError};

/// Result of a write to a controller file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file existed and its contents were replaced.
    Written,
    /// The file does not exist on this host; nothing was written.
    Skipped,
}

/// Reads and overwrites controller files.
pub trait ResourceWriter: Send + Sync {
    /// Replaces the contents of `dir/file` with `value` if the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be written.
    fn write(&self, dir: &Path, file: &str, value: &str) -> Result<WriteOutcome>;

    /// Reads the full contents of `dir/file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn read(&self, dir: &Path, file: &str) -> Result<String>;
}

/// Writes the string form of `value` through `writer`.
///
/// # Errors
///
/// Propagates the writer's error.
pub fn write_value(
    writer: &dyn ResourceWriter,
    dir: &Path,
    file: &str,
    value: impl Display,
) -> Result<WriteOutcome> {
    writer.write(dir, file, &value.to_string())
}

/// [`ResourceWriter`] backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWriter;

impl ResourceWriter for FsWriter {
    fn write(&self, dir: &Path, file: &str, value: &str) -> Result<WriteOutcome> {
        let path = dir.join(file);
        if !path.exists() {
            tracing::warn!(path = %path.display(), "control file absent, skipping");
            return Ok(WriteOutcome::Skipped);
        }
        // Open without O_CREAT: the kernel owns the set of control files.
        let mut handle = std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| VesselError::io(&path, e))?;
        handle
            .write_all(value.as_bytes())
            .map_err(|e| VesselError::io(&path, e))?;
        tracing::debug!(file, value, dir = %dir.display(), "wrote control file");
        Ok(WriteOutcome::Written)
    }

    fn read(&self, dir: &Path, file: &str) -> Result<String> {
        let path = dir.join(file);
        std::fs::read_to_string(&path).map_err(|e| VesselError::io(&path, e))
    }
}
