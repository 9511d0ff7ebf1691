//! Legacy (per-controller) cgroup management.
//!
//! Each resource family in a [`ResourceSpec`] requires one or more
//! controllers. For every controller the [`hierarchy::CgroupHierarchy`]
//! finds or mounts its hierarchy, creates a per-container directory, and
//! hands that directory to the controller's configurator.

pub mod blkio;
pub mod cpu;
pub mod devices;
pub mod hierarchy;
pub mod hugetlb;
pub mod locator;
pub mod lock;
pub mod memory;
pub mod mounts;
pub mod network;
pub mod pids;
pub mod writer;

#[cfg(test)]
pub(crate) mod testutil;

use std::fmt;
use std::path::Path;

use vessel_common::error::Result;
use vessel_common::resources::ResourceSpec;

use crate::cgroup::writer::ResourceWriter;

/// A legacy-hierarchy controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Controller {
    /// CFS bandwidth and shares.
    Cpu,
    /// CPU and memory node placement.
    Cpuset,
    /// Memory limits.
    Memory,
    /// Network packet classification.
    NetCls,
    /// Per-interface network priority.
    NetPrio,
    /// Block I/O throttling.
    Blkio,
    /// Device access whitelist.
    Devices,
    /// Hugepage limits.
    Hugetlb,
    /// Process count limit.
    Pids,
}

impl Controller {
    /// Kernel name of the controller, as it appears in mount options.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cpuset => "cpuset",
            Self::Memory => "memory",
            Self::NetCls => "net_cls",
            Self::NetPrio => "net_prio",
            Self::Blkio => "blkio",
            Self::Devices => "devices",
            Self::Hugetlb => "hugetlb",
            Self::Pids => "pids",
        }
    }

    /// Resource family this controller is configured from.
    #[must_use]
    pub const fn family(self) -> ResourceFamily {
        match self {
            Self::Cpu | Self::Cpuset => ResourceFamily::Cpu,
            Self::Memory => ResourceFamily::Memory,
            Self::NetCls | Self::NetPrio => ResourceFamily::Network,
            Self::Blkio => ResourceFamily::BlockIo,
            Self::Devices => ResourceFamily::Devices,
            Self::Hugetlb => ResourceFamily::HugepageLimits,
            Self::Pids => ResourceFamily::Pids,
        }
    }
}

impl fmt::Display for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A key of the resource specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceFamily {
    /// `cpu`
    Cpu,
    /// `memory`
    Memory,
    /// `network`
    Network,
    /// `pids`
    Pids,
    /// `hugepageLimits`
    HugepageLimits,
    /// `devices`
    Devices,
    /// `blockIO`
    BlockIo,
}

impl ResourceFamily {
    /// Every family, in provisioning order.
    pub const ALL: [Self; 7] = [
        Self::Cpu,
        Self::Memory,
        Self::Network,
        Self::Pids,
        Self::HugepageLimits,
        Self::Devices,
        Self::BlockIo,
    ];

    /// Key of the family in the launch configuration.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Network => "network",
            Self::Pids => "pids",
            Self::HugepageLimits => "hugepageLimits",
            Self::Devices => "devices",
            Self::BlockIo => "blockIO",
        }
    }

    /// Controllers that must be provisioned for this family.
    #[must_use]
    pub const fn controllers(self) -> &'static [Controller] {
        match self {
            Self::Cpu => &[Controller::Cpu, Controller::Cpuset],
            Self::Memory => &[Controller::Memory],
            Self::Network => &[Controller::NetCls, Controller::NetPrio],
            Self::Pids => &[Controller::Pids],
            Self::HugepageLimits => &[Controller::Hugetlb],
            Self::Devices => &[Controller::Devices],
            Self::BlockIo => &[Controller::Blkio],
        }
    }

    /// Whether `spec` configures this family.
    #[must_use]
    pub const fn is_present(self, spec: &ResourceSpec) -> bool {
        match self {
            Self::Cpu => spec.cpu.is_some(),
            Self::Memory => spec.memory.is_some(),
            Self::Network => spec.network.is_some(),
            Self::Pids => spec.pids.is_some(),
            Self::HugepageLimits => spec.hugepage_limits.is_some(),
            Self::Devices => spec.devices.is_some(),
            Self::BlockIo => spec.block_io.is_some(),
        }
    }
}

/// Controllers required by `spec`, each listed once, in provisioning order.
#[must_use]
pub fn required_controllers(spec: &ResourceSpec) -> Vec<Controller> {
    let mut controllers = Vec::new();
    for family in ResourceFamily::ALL {
        if !family.is_present(spec) {
            continue;
        }
        for &controller in family.controllers() {
            if !controllers.contains(&controller) {
                controllers.push(controller);
            }
        }
    }
    controllers
}

/// Writes the settings of `spec` that belong to `controller` into `dir`.
///
/// # Errors
///
/// Returns an error if a controller file exists but cannot be written, or
/// if the settings are internally inconsistent.
pub fn configure(
    controller: Controller,
    writer: &dyn ResourceWriter,
    dir: &Path,
    spec: &ResourceSpec,
) -> Result<()> {
    tracing::debug!(controller = %controller, dir = %dir.display(), "configuring controller");
    match controller {
        Controller::Cpu => spec
            .cpu
            .as_ref()
            .map_or(Ok(()), |cpu| cpu::configure_cpu(writer, dir, cpu)),
        Controller::Cpuset => spec
            .cpu
            .as_ref()
            .map_or(Ok(()), |cpu| cpu::configure_cpuset(writer, dir, cpu)),
        Controller::Memory => spec
            .memory
            .as_ref()
            .map_or(Ok(()), |memory| memory::configure(writer, dir, memory)),
        Controller::NetCls => spec
            .network
            .as_ref()
            .map_or(Ok(()), |network| network::configure_classid(writer, dir, network)),
        Controller::NetPrio => spec
            .network
            .as_ref()
            .map_or(Ok(()), |network| network::configure_priorities(writer, dir, network)),
        Controller::Blkio => spec
            .block_io
            .as_ref()
            .map_or(Ok(()), |block_io| blkio::configure(writer, dir, block_io)),
        Controller::Devices => spec
            .devices
            .as_deref()
            .map_or(Ok(()), |rules| devices::configure(writer, dir, rules)),
        Controller::Hugetlb => spec
            .hugepage_limits
            .as_deref()
            .map_or(Ok(()), |limits| hugetlb::configure(writer, dir, limits)),
        Controller::Pids => spec
            .pids
            .as_ref()
            .map_or(Ok(()), |pids| pids::configure(writer, dir, pids)),
    }
}
