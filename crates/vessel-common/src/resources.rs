//! Resource specification consumed by the cgroup hierarchy.
//!
//! Each field is one controller family. Families that are absent are not
//! provisioned at all; fields inside a family that are absent are not
//! written. Unknown family keys are rejected when parsing.

use serde::{Deserialize, Serialize};

/// Per-container resource limits, keyed by controller family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourceSpec {
    /// CPU bandwidth and placement (`cpu` and `cpuset` controllers).
    pub cpu: Option<CpuSpec>,
    /// Memory limits (`memory` controller).
    pub memory: Option<MemorySpec>,
    /// Network classification and priorities (`net_cls` and `net_prio`).
    pub network: Option<NetworkSpec>,
    /// Process count limit (`pids`).
    pub pids: Option<PidsSpec>,
    /// Per page-size hugepage limits (`hugetlb`).
    pub hugepage_limits: Option<Vec<HugepageLimit>>,
    /// Device whitelist rules (`devices`).
    pub devices: Option<Vec<DeviceRule>>,
    /// Block I/O throttling (`blkio`).
    #[serde(rename = "blockIO")]
    pub block_io: Option<BlockIoSpec>,
}

/// CPU settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuSpec {
    /// CFS quota in microseconds per period; `-1` for unlimited.
    pub quota: Option<i64>,
    /// CFS period in microseconds.
    pub period: Option<u64>,
    /// Relative share weight.
    pub shares: Option<u64>,
    /// Allowed CPU list, e.g. `0-3`.
    pub cpus: Option<String>,
    /// Allowed memory node list, e.g. `0`.
    pub mems: Option<String>,
}

/// Memory settings. All sizes are in bytes.
#[allow(clippy::struct_field_names)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySpec {
    /// Hard limit.
    pub limit: Option<i64>,
    /// Soft limit.
    pub reservation: Option<i64>,
    /// Swap allowed on top of `limit`.
    pub swap: Option<i64>,
    /// Kernel memory limit.
    pub kernel: Option<i64>,
    /// Kernel TCP buffer limit.
    #[serde(rename = "kernelTCP")]
    pub kernel_tcp: Option<i64>,
    /// Swappiness, 0-100.
    pub swappiness: Option<u64>,
    /// Disable the OOM killer for this cgroup.
    #[serde(rename = "disableOOMKiller", default)]
    pub disable_oom_killer: bool,
}

/// Network settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    /// Class id tagged on outgoing packets.
    #[serde(rename = "classID")]
    pub class_id: Option<u32>,
    /// Per-interface priorities.
    #[serde(default)]
    pub priorities: Vec<InterfacePriority>,
}

/// Priority of traffic leaving one interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfacePriority {
    /// Interface name.
    pub name: String,
    /// Priority value.
    pub priority: u32,
}

/// Process count limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidsSpec {
    /// Maximum number of processes.
    pub limit: i64,
}

/// Hugepage limit for one page size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HugepageLimit {
    /// Page size as the kernel names it, e.g. `2MB`.
    pub page_size: String,
    /// Limit in bytes.
    pub limit: u64,
}

/// One device whitelist rule.
///
/// Absent fields are wildcards: type `a`, major and minor `*`, access `rwm`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRule {
    /// Written to `devices.allow`.
    #[serde(default)]
    pub allow: bool,
    /// Written to `devices.deny`.
    #[serde(default)]
    pub deny: bool,
    /// Device type: `a`, `b` or `c`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Major number.
    pub major: Option<i64>,
    /// Minor number.
    pub minor: Option<i64>,
    /// Access letters drawn from `rwm`.
    pub access: Option<String>,
}

impl DeviceRule {
    /// Renders the rule in the `type major:minor access` form the devices
    /// controller expects.
    #[must_use]
    pub fn entry(&self) -> String {
        let kind = self.kind.as_deref().unwrap_or("a");
        let major = self.major.map_or_else(|| "*".to_string(), |m| m.to_string());
        let minor = self.minor.map_or_else(|| "*".to_string(), |m| m.to_string());
        let access = self.access.as_deref().unwrap_or("rwm");
        format!("{kind} {major}:{minor} {access}")
    }
}

/// Block I/O throttling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockIoSpec {
    /// Read bandwidth limits in bytes per second.
    #[serde(default)]
    pub throttle_read_bps_device: Vec<ThrottleDevice>,
    /// Write operation limits per second.
    #[serde(default, rename = "throttleWriteIOPSDevice")]
    pub throttle_write_iops_device: Vec<ThrottleDevice>,
}

/// Throttle rate for one block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleDevice {
    /// Major number.
    pub major: u64,
    /// Minor number.
    pub minor: u64,
    /// Rate limit.
    pub rate: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_rule_defaults_to_wildcards() {
        let rule = DeviceRule {
            deny: true,
            ..DeviceRule::default()
        };
        assert_eq!(rule.entry(), "a *:* rwm");
    }

    #[test]
    fn device_rule_keeps_zero_numbers() {
        let rule: DeviceRule = serde_json::from_str(
            r#"{"type": "c", "major": 0, "minor": 0, "access": "r", "allow": true}"#,
        )
        .unwrap();
        assert_eq!(rule.entry(), "c 0:0 r");
    }

    #[test]
    fn unknown_family_is_rejected() {
        let result: Result<ResourceSpec, _> = serde_json::from_str(r#"{"rdma": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn parses_camel_case_families() {
        let spec: ResourceSpec = serde_json::from_str(
            r#"{
                "memory": {"limit": 104857600, "swap": 0, "disableOOMKiller": true},
                "blockIO": {"throttleWriteIOPSDevice": [{"major": 8, "minor": 0, "rate": 100}]},
                "hugepageLimits": [{"pageSize": "2MB", "limit": 0}]
            }"#,
        )
        .unwrap();
        let memory = spec.memory.unwrap();
        assert_eq!(memory.limit, Some(104_857_600));
        assert!(memory.disable_oom_killer);
        assert_eq!(spec.block_io.unwrap().throttle_write_iops_device.len(), 1);
        assert_eq!(spec.hugepage_limits.unwrap()[0].page_size, "2MB");
    }
}
