//! # vessel-image
//!
//! Root filesystem bundles for the vessel launcher.
//!
//! Handles:
//! - **Bundles**: unpacking `.tar`, `.tar.gz`, and `.tgz` archives into an
//!   empty container root.
//! - **Hashing**: SHA-256 digests of bundle archives and verification
//!   against an expected digest.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod bundle;
pub mod hash;
