//! CPU resource control on the legacy hierarchy.
//!
//! Manages `cpu.cfs_quota_us`, `cpu.cfs_period_us`, and `cpu.shares` for
//! the `cpu` controller, and `cpuset.cpus` / `cpuset.mems` for `cpuset`.

use std::path::Path;

use vessel_common::error::Result;
use vessel_common::resources::CpuSpec;

use super::writer::{ResourceWriter, write_value};

/// Writes CFS bandwidth and share weight.
///
/// # Errors
///
/// Returns an error if an existing control file cannot be written.
pub fn configure_cpu(writer: &dyn ResourceWriter, dir: &Path, spec: &CpuSpec) -> Result<()> {
    if let Some(quota) = spec.quota {
        let _ = write_value(writer, dir, "cpu.cfs_quota_us", quota)?;
    }
    if let Some(period) = spec.period {
        let _ = write_value(writer, dir, "cpu.cfs_period_us", period)?;
    }
    if let Some(shares) = spec.shares {
        let _ = write_value(writer, dir, "cpu.shares", shares)?;
    }
    Ok(())
}

/// Writes the allowed CPU and memory-node lists.
///
/// A freshly created cpuset directory starts with empty lists, and the
/// kernel refuses member processes until both are set. A list absent from
/// the configuration is therefore copied from the parent directory.
///
/// # Errors
///
/// Returns an error if an existing control file cannot be written.
pub fn configure_cpuset(writer: &dyn ResourceWriter, dir: &Path, spec: &CpuSpec) -> Result<()> {
    for (file, value) in [("cpuset.cpus", &spec.cpus), ("cpuset.mems", &spec.mems)] {
        match value {
            Some(list) => {
                let _ = write_value(writer, dir, file, list)?;
            }
            None => inherit_from_parent(writer, dir, file)?,
        }
    }
    Ok(())
}

fn inherit_from_parent(writer: &dyn ResourceWriter, dir: &Path, file: &str) -> Result<()> {
    let Some(parent) = dir.parent() else {
        return Ok(());
    };
    match writer.read(parent, file) {
        Ok(inherited) if !inherited.trim().is_empty() => {
            tracing::debug!(file, value = inherited.trim(), "inheriting cpuset list from parent");
            let _ = write_value(writer, dir, file, inherited.trim())?;
        }
        Ok(_) => {}
        Err(e) => tracing::debug!(file, error = %e, "parent cpuset list unavailable"),
    }
    Ok(())
}
