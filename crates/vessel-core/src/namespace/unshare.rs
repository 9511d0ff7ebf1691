//! `unshare(2)` behind a trait, so launch sequencing can be tested without
//! privileges.

use vessel_common::error::{Result, VesselError};

use super::Namespace;

/// Moves the calling process into a new namespace.
pub trait NamespaceSyscall: Send + Sync {
    /// Unshares `namespace` for the calling process.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::NamespaceAcquisition`] carrying the OS error
    /// code if the kernel refuses.
    fn unshare(&self, namespace: Namespace) -> Result<()>;
}

/// [`NamespaceSyscall`] that calls into the kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelUnshare;

impl NamespaceSyscall for KernelUnshare {
    #[cfg(target_os = "linux")]
    fn unshare(&self, namespace: Namespace) -> Result<()> {
        nix::sched::unshare(namespace.flag()).map_err(|e| VesselError::NamespaceAcquisition {
            namespace: namespace.name(),
            code: e as i32,
        })?;
        tracing::debug!(namespace = %namespace, "namespace unshared");
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn unshare(&self, namespace: Namespace) -> Result<()> {
        Err(VesselError::NamespaceAcquisition {
            namespace: namespace.name(),
            code: 38, // ENOSYS
        })
    }
}
