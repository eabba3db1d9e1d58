// Signature builder.
//
// Two sequential passes over the basis: the first hashes the whole file,
// the second fingerprints consecutive `chunk_size` blocks (the last block
// may be shorter).

use std::io::{Read, Seek, SeekFrom};

use crate::config::{self, DEFAULT_CHUNK_SIZE};
use crate::hash::{HashAlgorithm, RollingChecksumAlgorithm};
use crate::io::read_full;
use crate::progress::{NullProgressReporter, ProgressReporter};
use crate::signature::Signature;
use crate::Result;

const OPERATION: &str = "Building signatures";

/// Configuration for signature building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureOptions {
    /// Nominal chunk length, within `MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE`.
    pub chunk_size: usize,
    /// Strong hash for chunks and the whole file.
    pub hash: HashAlgorithm,
    /// Rolling checksum for chunks.
    pub rolling: RollingChecksumAlgorithm,
}

impl Default for SignatureOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            hash: HashAlgorithm::default(),
            rolling: RollingChecksumAlgorithm::default(),
        }
    }
}

/// Builds a [`Signature`] from a seekable basis file.
pub struct SignatureBuilder {
    opts: SignatureOptions,
    progress: Box<dyn ProgressReporter>,
}

impl SignatureBuilder {
    /// Create a builder, rejecting out-of-range chunk sizes up front.
    pub fn new(opts: SignatureOptions) -> Result<Self> {
        config::validate_chunk_size(opts.chunk_size)?;
        Ok(Self {
            opts,
            progress: Box::new(NullProgressReporter),
        })
    }

    /// Attach a progress reporter.
    pub fn with_progress(mut self, progress: impl ProgressReporter + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn options(&self) -> &SignatureOptions {
        &self.opts
    }

    /// Fingerprint `basis` from its first byte to end of stream.
    ///
    /// An empty basis yields a signature with no chunks.
    pub fn build<R: Read + Seek>(&mut self, basis: &mut R) -> Result<Signature> {
        let SignatureOptions {
            chunk_size,
            hash,
            rolling,
        } = self.opts;

        let total = basis.seek(SeekFrom::End(0))?;
        basis.seek(SeekFrom::Start(0))?;
        self.progress.report(OPERATION, 0, total);

        let (basis_hash, _) = hash.compute_reader(basis)?;
        basis.seek(SeekFrom::Start(0))?;

        let mut signature = Signature::new(hash, rolling);
        let mut block = vec![0u8; chunk_size];
        loop {
            let read = read_full(basis, &mut block)?;
            if read == 0 {
                break;
            }
            let data = &block[..read];
            signature.push_chunk(read, rolling.calculate(data), hash.compute(data));
            self.progress.report(OPERATION, signature.basis_len(), total);
        }

        log::debug!(
            "signature: {} bytes, {} chunks of {chunk_size} bytes ({hash}/{rolling})",
            signature.basis_len(),
            signature.chunks().len(),
        );

        signature.set_basis_hash(basis_hash);
        Ok(signature)
    }
}
