//! Root filesystem bundles.
//!
//! A bundle is a tar archive, optionally gzip-compressed, holding a
//! complete root filesystem. It is unpacked once into an empty container
//! root.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use vessel_common::error::{Result, VesselError};
use vessel_common::types::Sha256Hash;

/// What was unpacked.
#[derive(Debug, Clone)]
pub struct Bundle {
    /// SHA-256 of the archive as read from disk.
    pub digest: Sha256Hash,
    /// Size of the archive in bytes.
    pub size_bytes: u64,
}

/// Unpacks the bundle at `archive_path` into `target`, creating `target`
/// if needed.
///
/// Supports both plain `.tar` and gzip-compressed `.tar.gz` / `.tgz` archives.
///
/// # Errors
///
/// Returns an error if the archive cannot be read or unpacked.
pub fn extract_bundle(archive_path: &Path, target: &Path) -> Result<Bundle> {
    tracing::info!(
        archive = %archive_path.display(),
        target = %target.display(),
        "extracting bundle"
    );

    std::fs::create_dir_all(target).map_err(|e| VesselError::io(target, e))?;
    let file = File::open(archive_path).map_err(|e| VesselError::io(archive_path, e))?;
    let size_bytes = file
        .metadata()
        .map_err(|e| VesselError::io(archive_path, e))?
        .len();

    if is_gzip_archive(archive_path) {
        unpack(flate2::read::GzDecoder::new(file), target)?;
    } else {
        unpack(file, target)?;
    }

    let digest = crate::hash::hash_file(archive_path)?;
    tracing::info!(digest = %digest, size = size_bytes, "bundle extracted");
    Ok(Bundle { digest, size_bytes })
}

fn unpack(reader: impl Read, target: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.unpack(target).map_err(|e| VesselError::io(target, e))
}

/// Determines whether the archive is gzip-compressed based on extension.
fn is_gzip_archive(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz") || ext.eq_ignore_ascii_case("tgz"))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn append(builder: &mut tar::Builder<impl std::io::Write>, name: &str, data: &[u8]) {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, name, data).unwrap();
    }

    fn plain_bundle(dir: &Path) -> PathBuf {
        let path = dir.join("rootfs.tar");
        let mut builder = tar::Builder::new(File::create(&path).unwrap());
        append(&mut builder, "bin/sh", b"#!shell");
        append(&mut builder, "etc/hostname", b"bundle\n");
        builder.finish().unwrap();
        path
    }

    fn gzip_bundle(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let encoder =
            flate2::write::GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        append(&mut builder, "bin/sh", b"#!gzipped shell");
        let _ = builder.into_inner().unwrap().finish().unwrap();
        path
    }

    #[test]
    fn plain_tar_populates_root() {
        let dir = tempfile::tempdir().unwrap();
        let archive = plain_bundle(dir.path());
        let root = dir.path().join("root");

        let bundle = extract_bundle(&archive, &root).unwrap();

        assert!(bundle.size_bytes > 0);
        assert_eq!(
            std::fs::read_to_string(root.join("etc/hostname")).unwrap(),
            "bundle\n"
        );
        assert!(root.join("bin/sh").is_file());
    }

    #[test]
    fn gzip_variants_are_decompressed() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["rootfs.tar.gz", "rootfs.tgz"] {
            let archive = gzip_bundle(dir.path(), name);
            let root = dir.path().join(format!("root-{name}"));

            let _ = extract_bundle(&archive, &root).unwrap();

            let sh = std::fs::read_to_string(root.join("bin/sh")).unwrap();
            assert_eq!(sh, "#!gzipped shell");
        }
    }

    #[test]
    fn digest_matches_archive_hash() {
        let dir = tempfile::tempdir().unwrap();
        let archive = plain_bundle(dir.path());

        let bundle = extract_bundle(&archive, &dir.path().join("root")).unwrap();

        assert_eq!(bundle.digest, crate::hash::hash_file(&archive).unwrap());
    }

    #[test]
    fn missing_archive_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_bundle(&dir.path().join("missing.tar"), &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, VesselError::Io { .. }));
    }

    #[test]
    fn gzip_detection_uses_extension() {
        assert!(is_gzip_archive(Path::new("rootfs.tar.gz")));
        assert!(is_gzip_archive(Path::new("rootfs.TGZ")));
        assert!(!is_gzip_archive(Path::new("rootfs.tar")));
        assert!(!is_gzip_archive(Path::new("rootfs.zip")));
    }
}
