// Checksum and hash primitives for chunk matching.
//
// This module provides:
// - The rolling checksum used to find candidate matches in O(1) per byte
// - Strong hashes that confirm candidates and fingerprint whole files

pub mod rolling;
pub mod strong;

pub use rolling::RollingChecksumAlgorithm;
pub use strong::{HashAlgorithm, StrongHasher};
