//! Memory resource control on the legacy hierarchy.
//!
//! Manages `memory.limit_in_bytes`, `memory.memsw.limit_in_bytes`, the
//! kernel memory limits, swappiness, and `memory.oom_control`.

use std::path::Path;

use vessel_common::error::{Result, VesselError};
use vessel_common::resources::MemorySpec;

use super::writer::{ResourceWriter, write_value};

/// Writes every memory setting present in `spec`.
///
/// The combined memory+swap limit is `limit + swap`, with an absent swap
/// counted as zero. `memory.oom_control` receives `1` to disable the OOM
/// killer and `0` otherwise.
///
/// # Errors
///
/// Returns an error if `limit + swap` overflows or a control file cannot
/// be written.
pub fn configure(writer: &dyn ResourceWriter, dir: &Path, spec: &MemorySpec) -> Result<()> {
    if let Some(limit) = spec.limit {
        let _ = write_value(writer, dir, "memory.limit_in_bytes", limit)?;
    }
    if let Some(reservation) = spec.reservation {
        let _ = write_value(writer, dir, "memory.soft_limit_in_bytes", reservation)?;
    }
    if let Some(limit) = spec.limit {
        let memsw = memsw_limit(limit, spec.swap.unwrap_or(0))?;
        let _ = write_value(writer, dir, "memory.memsw.limit_in_bytes", memsw)?;
    }
    if let Some(kernel) = spec.kernel {
        let _ = write_value(writer, dir, "memory.kmem.limit_in_bytes", kernel)?;
    }
    if let Some(kernel_tcp) = spec.kernel_tcp {
        let _ = write_value(writer, dir, "memory.kmem.tcp.limit_in_bytes", kernel_tcp)?;
    }
    if let Some(swappiness) = spec.swappiness {
        let _ = write_value(writer, dir, "memory.swappiness", swappiness)?;
    }
    let oom_control = if spec.disable_oom_killer { "1" } else { "0" };
    let _ = write_value(writer, dir, "memory.oom_control", oom_control)?;
    Ok(())
}

/// Combined memory and swap limit.
///
/// # Errors
///
/// Returns [`VesselError::Config`] when the sum does not fit in an `i64`.
pub fn memsw_limit(limit: i64, swap: i64) -> Result<i64> {
    limit.checked_add(swap).ok_or_else(|| VesselError::Config {
        message: format!("memory limit {limit} plus swap {swap} overflows"),
    })
}
