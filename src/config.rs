// Tuning constants for signature building, delta building and patching.
//
// Chunk sizes are bounded so every chunk length fits the signed 16-bit
// field of the signature format.

/// Default nominal chunk length used when building signatures.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Smallest accepted nominal chunk length.
pub const MIN_CHUNK_SIZE: usize = 128;

/// Largest accepted nominal chunk length (31 KiB).
pub const MAX_CHUNK_SIZE: usize = 31 * 1024;

/// Scan buffer used by the delta builder (4 MiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Piece size for copying basis ranges and reading literal runs (4 MiB).
pub const COPY_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Piece size for writing literal runs into a delta (1 MiB).
pub const DATA_BUFFER_SIZE: usize = 1024 * 1024;

/// Check a requested nominal chunk length against the supported range.
pub fn validate_chunk_size(chunk_size: usize) -> crate::Result<usize> {
    if (MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
        Ok(chunk_size)
    } else {
        Err(crate::Error::InvalidChunkSize(chunk_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_bounds() {
        assert!(validate_chunk_size(MIN_CHUNK_SIZE).is_ok());
        assert!(validate_chunk_size(DEFAULT_CHUNK_SIZE).is_ok());
        assert!(validate_chunk_size(MAX_CHUNK_SIZE).is_ok());
        assert!(validate_chunk_size(MIN_CHUNK_SIZE - 1).is_err());
        assert!(validate_chunk_size(MAX_CHUNK_SIZE + 1).is_err());
        assert!(validate_chunk_size(0).is_err());
    }

    #[test]
    fn max_chunk_fits_signed_16_bits() {
        assert!(MAX_CHUNK_SIZE <= i16::MAX as usize);
    }
}
