// Error taxonomy shared by every operation boundary.
//
// Format and compatibility problems are surfaced immediately and never
// retried. I/O errors from caller-supplied streams propagate unchanged.

use std::io;

/// Errors returned by signature building, delta building, delta application
/// and the wire codecs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Magic mismatch, truncated metadata, or a record/command stream whose
    /// length does not line up with its declared sizes.
    #[error("corrupt file format: {0}")]
    CorruptFormat(String),

    /// Format version newer than supported, or an unrecognized algorithm name.
    #[error("incompatible file: {0}")]
    Compatibility(String),

    /// The reconstructed output does not hash to the value recorded in the delta.
    #[error(
        "verification of the patched file failed: the {algorithm} hash of the result is {actual}, \
         but the delta expected {expected}; the basis file has probably changed since the \
         signature was taken"
    )]
    Verification {
        algorithm: &'static str,
        expected: String,
        actual: String,
    },

    /// Chunk size outside the supported range.
    #[error(
        "chunk size {0} is out of range ({min}..={max})",
        min = crate::config::MIN_CHUNK_SIZE,
        max = crate::config::MAX_CHUNK_SIZE
    )]
    InvalidChunkSize(usize),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptFormat(msg.into())
    }

    pub(crate) fn incompatible(msg: impl Into<String>) -> Self {
        Self::Compatibility(msg.into())
    }

    /// Map an I/O error raised while decoding `what` into the error taxonomy.
    ///
    /// Running out of input mid-structure means the file is truncated, which
    /// is a format problem rather than a transport one.
    pub(crate) fn truncated(err: io::Error, what: &str) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::CorruptFormat(format!("unexpected end of stream while reading {what}"))
        } else {
            Self::Io(err)
        }
    }
}

/// Render a digest as lowercase hex for messages and CLI output.
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
