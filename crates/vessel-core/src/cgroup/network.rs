//! Network classification (`net_cls`) and priority (`net_prio`) control.

use std::fmt::Write as _;
use std::path::Path;

use vessel_common::error::Result;
use vessel_common::resources::NetworkSpec;

use super::writer::{ResourceWriter, write_value};

/// Writes `net_cls.classid`.
///
/// # Errors
///
/// Returns an error if the control file exists but cannot be written.
pub fn configure_classid(writer: &dyn ResourceWriter, dir: &Path, spec: &NetworkSpec) -> Result<()> {
    if let Some(class_id) = spec.class_id {
        let _ = write_value(writer, dir, "net_cls.classid", class_id)?;
    }
    Ok(())
}

/// Writes the `net_prio.ifpriomap` table, one `"<iface> <priority>"` line
/// per configured interface.
///
/// # Errors
///
/// Returns an error if the control file exists but cannot be written.
pub fn configure_priorities(
    writer: &dyn ResourceWriter,
    dir: &Path,
    spec: &NetworkSpec,
) -> Result<()> {
    if spec.priorities.is_empty() {
        return Ok(());
    }
    let table = spec
        .priorities
        .iter()
        .fold(String::new(), |mut table, entry| {
            let _ = writeln!(table, "{} {}", entry.name, entry.priority);
            table
        });
    let _ = write_value(writer, dir, "net_prio.ifpriomap", table)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use vessel_common::resources::InterfacePriority;

    use super::*;
    use crate::cgroup::testutil::RecordingWriter;

    #[test]
    fn builds_priority_table() {
        let writer = RecordingWriter::default();
        let spec = NetworkSpec {
            class_id: Some(1_048_577),
            priorities: vec![
                InterfacePriority {
                    name: "eth0".into(),
                    priority: 500,
                },
                InterfacePriority {
                    name: "lo".into(),
                    priority: 0,
                },
            ],
        };

        configure_classid(&writer, Path::new("/cg/net_cls/c"), &spec).unwrap();
        configure_priorities(&writer, Path::new("/cg/net_prio/c"), &spec).unwrap();

        assert_eq!(writer.value_of("net_cls.classid").as_deref(), Some("1048577"));
        assert_eq!(
            writer.value_of("net_prio.ifpriomap").as_deref(),
            Some("eth0 500\nlo 0\n")
        );
    }

    #[test]
    fn empty_priorities_write_nothing() {
        let writer = RecordingWriter::default();
        configure_priorities(&writer, Path::new("/cg/net_prio/c"), &NetworkSpec::default())
            .unwrap();
        assert!(writer.writes().is_empty());
    }
}
