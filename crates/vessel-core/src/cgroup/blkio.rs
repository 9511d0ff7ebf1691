//! Block I/O throttling via the `blkio` controller.
//!
//! Manages `blkio.throttle.read_bps_device` and
//! `blkio.throttle.write_iops_device`.

use std::fmt::Write as _;
use std::path::Path;

use vessel_common::error::Result;
use vessel_common::resources::{BlockIoSpec, ThrottleDevice};

use super::writer::{ResourceWriter, write_value};

/// Writes the read-bandwidth and write-IOPS throttle tables.
///
/// # Errors
///
/// Returns an error if a control file exists but cannot be written.
pub fn configure(writer: &dyn ResourceWriter, dir: &Path, spec: &BlockIoSpec) -> Result<()> {
    write_table(
        writer,
        dir,
        "blkio.throttle.read_bps_device",
        &spec.throttle_read_bps_device,
    )?;
    write_table(
        writer,
        dir,
        "blkio.throttle.write_iops_device",
        &spec.throttle_write_iops_device,
    )
}

fn write_table(
    writer: &dyn ResourceWriter,
    dir: &Path,
    file: &str,
    devices: &[ThrottleDevice],
) -> Result<()> {
    if devices.is_empty() {
        return Ok(());
    }
    let _ = write_value(writer, dir, file, throttle_table(devices))?;
    Ok(())
}

/// Renders one `"<major>:<minor> <rate>"` line per device.
#[must_use]
pub fn throttle_table(devices: &[ThrottleDevice]) -> String {
    devices.iter().fold(String::new(), |mut table, device| {
        let _ = writeln!(table, "{}:{} {}", device.major, device.minor, device.rate);
        table
    })
}
