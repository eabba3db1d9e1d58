// Basis-file signatures: an ordered list of fixed-length chunk fingerprints.
//
// - `builder`: SignatureBuilder: one pass for the whole-file hash, one pass
//   to fingerprint each chunk
//
// Chunk start offsets are derived state. They are never serialized and are
// always the running sum of the preceding chunk lengths, which `Signature`
// maintains itself as chunks are appended.

pub mod builder;

pub use builder::{SignatureBuilder, SignatureOptions};

use crate::hash::{HashAlgorithm, RollingChecksumAlgorithm};

/// Fingerprint of one basis-file chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSignature {
    /// Byte offset of the chunk in the basis file.
    pub start_offset: u64,
    /// Chunk length in bytes (1..=32767).
    pub length: usize,
    /// Rolling checksum over exactly `length` bytes.
    pub rolling_checksum: u32,
    /// Strong hash over the same bytes.
    pub hash: Vec<u8>,
}

impl ChunkSignature {
    /// Offset one past the last byte of the chunk.
    pub fn end_offset(&self) -> u64 {
        self.start_offset + self.length as u64
    }
}

/// Description of one basis file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    hash_algorithm: HashAlgorithm,
    rolling_algorithm: RollingChecksumAlgorithm,
    chunks: Vec<ChunkSignature>,
    basis_len: u64,
    basis_hash: Option<Vec<u8>>,
}

impl Signature {
    /// Empty signature for the given algorithms.
    pub fn new(hash_algorithm: HashAlgorithm, rolling_algorithm: RollingChecksumAlgorithm) -> Self {
        Self {
            hash_algorithm,
            rolling_algorithm,
            chunks: Vec::new(),
            basis_len: 0,
            basis_hash: None,
        }
    }

    /// Append the next chunk; its start offset is where the previous one ended.
    pub fn push_chunk(&mut self, length: usize, rolling_checksum: u32, hash: Vec<u8>) {
        self.chunks.push(ChunkSignature {
            start_offset: self.basis_len,
            length,
            rolling_checksum,
            hash,
        });
        self.basis_len += length as u64;
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    pub fn rolling_algorithm(&self) -> RollingChecksumAlgorithm {
        self.rolling_algorithm
    }

    /// Chunks in basis-file order.
    pub fn chunks(&self) -> &[ChunkSignature] {
        &self.chunks
    }

    /// Length of the described basis file (sum of chunk lengths).
    pub fn basis_len(&self) -> u64 {
        self.basis_len
    }

    /// Whole-file strong hash of the basis, when this signature was built
    /// locally. Not part of the signature file format, so decoded
    /// signatures carry `None`.
    pub fn basis_hash(&self) -> Option<&[u8]> {
        self.basis_hash.as_deref()
    }

    pub(crate) fn set_basis_hash(&mut self, hash: Vec<u8>) {
        self.basis_hash = Some(hash);
    }

    /// Nominal chunk length: the length of the first chunk.
    pub fn nominal_chunk_size(&self) -> Option<usize> {
        self.chunks.first().map(|c| c.length)
    }
}
