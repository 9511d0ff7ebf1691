//! Root filesystem preparation.

use std::path::Path;

use vessel_common::config::RootConfig;
use vessel_common::error::{Result, VesselError};
use vessel_common::types::Sha256Hash;

/// Makes sure `root` exists and is populated, and that it holds the
/// `pivot_dir` the old root is moved into.
///
/// `extract` runs at most once, and only when `root` is empty or missing.
/// Returns whether it ran.
///
/// # Errors
///
/// Returns an error if `root` cannot be inspected or created, or whatever
/// `extract` returns.
pub fn prepare_rootfs<F>(root: &Path, pivot_dir: &str, extract: F) -> Result<bool>
where
    F: FnOnce(&Path) -> Result<()>,
{
    std::fs::create_dir_all(root).map_err(|e| VesselError::io(root, e))?;
    let empty = std::fs::read_dir(root)
        .map_err(|e| VesselError::io(root, e))?
        .next()
        .is_none();
    if empty {
        extract(root)?;
    } else {
        tracing::debug!(root = %root.display(), "root populated, skipping extraction");
    }

    let put_old = root.join(pivot_dir);
    if !put_old.is_dir() {
        std::fs::create_dir(&put_old).map_err(|e| VesselError::io(&put_old, e))?;
    }
    Ok(empty)
}

/// Prepares the configured root, unpacking its bundle when the root is
/// empty. A configured digest is checked before unpacking.
///
/// # Errors
///
/// Returns [`VesselError::Config`] if the root is empty and no bundle is
/// configured, [`VesselError::HashMismatch`] if the bundle fails its
/// digest, or any extraction error.
pub fn materialize(root: &RootConfig, pivot_dir: &str) -> Result<bool> {
    prepare_rootfs(&root.path, pivot_dir, |target| {
        let bundle = root.bundle.as_deref().ok_or_else(|| VesselError::Config {
            message: format!(
                "root {} is empty and no bundle is configured",
                target.display()
            ),
        })?;
        if let Some(digest) = &root.bundle_digest {
            vessel_image::hash::validate_hash(bundle, &Sha256Hash::from_hex(digest.as_str())?)?;
        }
        let _ = vessel_image::bundle::extract_bundle(bundle, target)?;
        Ok(())
    })
}
