// Strong hashes used to confirm rolling-checksum hits and to fingerprint
// whole files.
//
// The algorithm set is closed: a name read from a signature or delta either
// maps onto one of these variants or decoding fails with a compatibility
// error. SHA-1 is the wire default.

use std::io::{self, Read, Write};

use digest::Digest;

use crate::{Error, Result};

/// Strong hash algorithms a signature or delta may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    #[cfg(feature = "sha256")]
    Sha256,
}

impl HashAlgorithm {
    /// Name recorded in signature and delta files.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            #[cfg(feature = "sha256")]
            Self::Sha256 => "SHA256",
        }
    }

    /// Look up an algorithm by the name stored in a file.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "SHA1" => Ok(Self::Sha1),
            #[cfg(feature = "sha256")]
            "SHA256" => Ok(Self::Sha256),
            other => Err(Error::incompatible(format!(
                "the hash algorithm '{other}' is not supported"
            ))),
        }
    }

    /// Digest length in bytes.
    pub const fn hash_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            #[cfg(feature = "sha256")]
            Self::Sha256 => 32,
        }
    }

    /// Fresh incremental hasher for this algorithm.
    pub fn hasher(self) -> StrongHasher {
        match self {
            Self::Sha1 => StrongHasher::Sha1(sha1::Sha1::new()),
            #[cfg(feature = "sha256")]
            Self::Sha256 => StrongHasher::Sha256(sha2::Sha256::new()),
        }
    }

    /// Digest of `data`.
    pub fn compute(self, data: &[u8]) -> Vec<u8> {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize()
    }

    /// Digest of everything `reader` yields until end of stream.
    ///
    /// Returns the digest and the number of bytes hashed.
    pub fn compute_reader<R: Read + ?Sized>(self, reader: &mut R) -> io::Result<(Vec<u8>, u64)> {
        let mut hasher = self.hasher();
        let hashed = io::copy(reader, &mut hasher)?;
        Ok((hasher.finalize(), hashed))
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Incremental strong hash state.
///
/// Implements `Write` so it can sit at the end of `io::copy`.
#[derive(Clone)]
pub enum StrongHasher {
    Sha1(sha1::Sha1),
    #[cfg(feature = "sha256")]
    Sha256(sha2::Sha256),
}

impl StrongHasher {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(data),
            #[cfg(feature = "sha256")]
            Self::Sha256(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha1(h) => h.finalize().to_vec(),
            #[cfg(feature = "sha256")]
            Self::Sha256(h) => h.finalize().to_vec(),
        }
    }
}

impl Write for StrongHasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::to_hex;

    #[test]
    fn sha1_known_vectors() {
        assert_eq!(
            to_hex(&HashAlgorithm::Sha1.compute(b"")),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
        assert_eq!(
            to_hex(&HashAlgorithm::Sha1.compute(b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[cfg(feature = "sha256")]
    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            to_hex(&HashAlgorithm::Sha256.compute(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn reader_and_slice_digests_agree() {
        let data: Vec<u8> = (0..=255u8).cycle().take(200_000).collect();
        let mut cursor = io::Cursor::new(&data);
        let (digest, hashed) = HashAlgorithm::Sha1.compute_reader(&mut cursor).unwrap();
        assert_eq!(hashed, data.len() as u64);
        assert_eq!(digest, HashAlgorithm::Sha1.compute(&data));
    }

    #[test]
    fn digest_length_matches_declared_length() {
        let alg = HashAlgorithm::default();
        assert_eq!(alg.compute(b"xyz").len(), alg.hash_len());
        #[cfg(feature = "sha256")]
        assert_eq!(HashAlgorithm::Sha256.compute(b"xyz").len(), 32);
    }

    #[test]
    fn name_registry() {
        assert_eq!(HashAlgorithm::from_name("SHA1").unwrap(), HashAlgorithm::Sha1);
        assert_eq!(HashAlgorithm::Sha1.to_string(), "SHA1");
        assert!(matches!(
            HashAlgorithm::from_name("MD5"),
            Err(Error::Compatibility(_))
        ));
        assert!(HashAlgorithm::from_name("sha1").is_err());
    }
}
