//! Hugepage limits via the `hugetlb` controller.

use std::path::Path;

use vessel_common::error::Result;
use vessel_common::resources::HugepageLimit;

use super::writer::{ResourceWriter, WriteOutcome, write_value};

/// Writes `hugetlb.<pageSize>.limit_in_bytes` for every configured page
/// size. Page sizes the host does not offer have no control file and are
/// skipped.
///
/// # Errors
///
/// Returns an error if a control file exists but cannot be written.
pub fn configure(writer: &dyn ResourceWriter, dir: &Path, limits: &[HugepageLimit]) -> Result<()> {
    for limit in limits {
        let file = format!("hugetlb.{}.limit_in_bytes", limit.page_size);
        if write_value(writer, dir, &file, limit.limit)? == WriteOutcome::Skipped {
            tracing::warn!(page_size = %limit.page_size, "hugepage size not supported, skipping");
        }
    }
    Ok(())
}
