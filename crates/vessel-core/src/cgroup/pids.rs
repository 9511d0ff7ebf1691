//! Process count limit via the `pids` controller.

use std::path::Path;

use vessel_common::error::Result;
use vessel_common::resources::PidsSpec;

use super::writer::{ResourceWriter, write_value};

/// Writes `pids.max`.
///
/// # Errors
///
/// Returns an error if the control file exists but cannot be written.
pub fn configure(writer: &dyn ResourceWriter, dir: &Path, spec: &PidsSpec) -> Result<()> {
    let _ = write_value(writer, dir, "pids.max", spec.limit)?;
    Ok(())
}
