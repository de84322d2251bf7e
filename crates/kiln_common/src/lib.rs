//! Shared foundational types used across the Kiln build core.
//!
//! This crate provides SHA-256 content checksums and the canonical encoder
//! used to fingerprint cache keys.

#![warn(missing_docs)]

pub mod checksum;

pub use checksum::{calculate_checksum, canonical_json, Checksum, ChecksumError};
