//! Device whitelist control via the `devices` controller.

use std::path::Path;

use vessel_common::error::Result;
use vessel_common::resources::DeviceRule;

use super::writer::{ResourceWriter, write_value};

/// Applies the device rules in two passes: every deny rule goes to
/// `devices.deny` first, then every allow rule goes to `devices.allow`.
///
/// Input order does not matter. A broad deny written after a specific
/// allow would revoke it, so the passes must not be merged or reordered.
///
/// # Errors
///
/// Returns an error if a control file exists but cannot be written.
pub fn configure(writer: &dyn ResourceWriter, dir: &Path, rules: &[DeviceRule]) -> Result<()> {
    for rule in rules.iter().filter(|rule| rule.deny) {
        let _ = write_value(writer, dir, "devices.deny", rule.entry())?;
    }
    for rule in rules.iter().filter(|rule| rule.allow) {
        let _ = write_value(writer, dir, "devices.allow", rule.entry())?;
    }
    Ok(())
}
