//! SHA-256 content verification.
//!
//! Validates bundle archives before they are unpacked into a root.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use sha2::{Digest, Sha256};
use vessel_common::error::{Result, VesselError};
use vessel_common::types::Sha256Hash;

/// Computes the SHA-256 hash of a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn hash_file(path: &Path) -> Result<Sha256Hash> {
    tracing::debug!(path = %path.display(), "computing SHA-256 hash");
    let file = File::open(path).map_err(|e| VesselError::io(path, e))?;
    let mut hasher = Sha256::new();
    let _ = std::io::copy(&mut BufReader::new(file), &mut hasher)
        .map_err(|e| VesselError::io(path, e))?;
    Sha256Hash::from_hex(format!("{:x}", hasher.finalize()))
}

/// Validates that a file matches the expected SHA-256 hash.
///
/// # Errors
///
/// Returns `VesselError::HashMismatch` if the hashes do not match.
pub fn validate_hash(path: &Path, expected: &Sha256Hash) -> Result<()> {
    tracing::debug!(path = %path.display(), "validating SHA-256 hash");
    let actual = hash_file(path)?;
    if &actual != expected {
        return Err(VesselError::HashMismatch {
            resource: path.display().to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn hash_file_matches_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello");
        std::fs::write(&path, "hello").unwrap();

        assert_eq!(hash_file(&path).unwrap().as_hex(), HELLO_SHA256);
    }

    #[test]
    fn validate_accepts_prefixed_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello");
        std::fs::write(&path, "hello").unwrap();
        let expected = Sha256Hash::from_hex(format!("sha256:{HELLO_SHA256}")).unwrap();

        validate_hash(&path, &expected).unwrap();
    }

    #[test]
    fn validate_reports_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tampered");
        std::fs::write(&path, "hello!").unwrap();
        let expected = Sha256Hash::from_hex(HELLO_SHA256).unwrap();

        let err = validate_hash(&path, &expected).unwrap_err();

        assert!(matches!(err, VesselError::HashMismatch { .. }));
    }

    #[test]
    fn hash_missing_file_is_io_error() {
        let err = hash_file(Path::new("/nonexistent/bundle.tar")).unwrap_err();
        assert!(matches!(err, VesselError::Io { .. }));
    }
}
