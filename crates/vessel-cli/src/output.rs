//! Formatted output helpers for CLI commands.
//!
//! Provides terminal colours and human-readable summaries of the limits a
//! container runs under.

use vessel_common::resources::ResourceSpec;

pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const RESET: &str = "\x1b[0m";

/// Formats a byte count into a human-readable string (e.g., "128 MiB").
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// One line per configured limit worth showing at launch.
#[must_use]
pub fn describe_limits(spec: &ResourceSpec) -> Vec<String> {
    let mut lines = Vec::new();
    let memory = spec.memory.as_ref().and_then(|m| m.limit);
    if let Some(limit) = memory.and_then(|l| u64::try_from(l).ok()) {
        lines.push(format!("memory  {}", format_bytes(limit)));
    }
    if let Some(cpu) = &spec.cpu {
        if let (Some(quota), Some(period)) = (cpu.quota, cpu.period) {
            lines.push(format!("cpu     {quota}/{period} us"));
        }
        if let Some(cpus) = &cpu.cpus {
            lines.push(format!("cpuset  {cpus}"));
        }
    }
    if let Some(pids) = &spec.pids {
        lines.push(format!("pids    {}", pids.limit));
    }
    if let Some(devices) = spec.devices.as_ref().filter(|d| !d.is_empty()) {
        lines.push(format!("devices {} rule(s)", devices.len()));
    }
    lines
}

#[cfg(test)]
mod tests {
    use vessel_common::resources::{MemorySpec, PidsSpec};

    use super::*;

    #[test]
    fn format_bytes_displays_bytes() {
        assert_eq!(format_bytes(512), "512 B");
    }

    #[test]
    fn format_bytes_displays_mib() {
        assert_eq!(format_bytes(104_857_600), "100.0 MiB");
    }

    #[test]
    fn format_bytes_displays_gib() {
        assert_eq!(format_bytes(2_147_483_648), "2.0 GiB");
    }

    #[test]
    fn limits_summary_lists_configured_families() {
        let spec = ResourceSpec {
            memory: Some(MemorySpec {
                limit: Some(104_857_600),
                ..MemorySpec::default()
            }),
            pids: Some(PidsSpec { limit: 64 }),
            ..ResourceSpec::default()
        };
        assert_eq!(
            describe_limits(&spec),
            vec!["memory  100.0 MiB".to_string(), "pids    64".to_string()]
        );
    }

    #[test]
    fn empty_spec_has_no_summary() {
        assert!(describe_limits(&ResourceSpec::default()).is_empty());
    }
}
