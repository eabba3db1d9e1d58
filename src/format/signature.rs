// Signature file encoding/decoding.
//
// Layout:
//   "OCTOSIG" | version | hash name | rolling checksum name | ">>>"
//   then one fixed-size record per chunk:
//   i16 length | u32 rolling checksum | hash bytes (length set by the hash)
//
// Chunk offsets are not stored; decoding rebuilds them as running sums.

use std::io::{Read, Seek, SeekFrom, Write};

use super::{
    END_OF_METADATA, SIGNATURE_MAGIC, read_end_of_metadata, read_i16, read_preamble, read_string,
    read_u32, write_preamble, write_string,
};
use crate::hash::{HashAlgorithm, RollingChecksumAlgorithm};
use crate::signature::Signature;
use crate::{Error, Result};

/// Bytes per chunk record for a given strong hash.
pub const fn record_size(hash: HashAlgorithm) -> usize {
    size_of::<i16>() + size_of::<u32>() + hash.hash_len()
}

/// Encode `signature` into `w`.
pub fn write_signature<W: Write + ?Sized>(w: &mut W, signature: &Signature) -> Result<()> {
    let hash = signature.hash_algorithm();

    write_preamble(w, SIGNATURE_MAGIC)?;
    write_string(w, hash.name())?;
    write_string(w, signature.rolling_algorithm().name())?;
    w.write_all(END_OF_METADATA)?;

    for chunk in signature.chunks() {
        let length = i16::try_from(chunk.length)
            .ok()
            .filter(|&l| l > 0)
            .ok_or(Error::InvalidChunkSize(chunk.length))?;
        if chunk.hash.len() != hash.hash_len() {
            return Err(Error::corrupt(format!(
                "chunk at offset {} has a {}-byte hash, {hash} produces {} bytes",
                chunk.start_offset,
                chunk.hash.len(),
                hash.hash_len()
            )));
        }
        w.write_all(&length.to_le_bytes())?;
        w.write_all(&chunk.rolling_checksum.to_le_bytes())?;
        w.write_all(&chunk.hash)?;
    }
    Ok(())
}

/// Decode a signature starting at the current position of `r` and running
/// to end of stream.
pub fn read_signature<R: Read + Seek + ?Sized>(r: &mut R) -> Result<Signature> {
    read_preamble(r, SIGNATURE_MAGIC, "signature")?;

    let hash = HashAlgorithm::from_name(&read_string(r, "hash algorithm name")?)?;
    let rolling = RollingChecksumAlgorithm::from_name(&read_string(r, "rolling checksum name")?)?;
    read_end_of_metadata(r, "signature")?;

    let body_start = r.stream_position()?;
    let end = r.seek(SeekFrom::End(0))?;
    r.seek(SeekFrom::Start(body_start))?;

    let record = record_size(hash) as u64;
    let remaining = end.saturating_sub(body_start);
    if remaining % record != 0 {
        return Err(Error::corrupt(format!(
            "the signature file appears to be corrupt: {remaining} bytes of chunk data is not a \
             multiple of the {record}-byte record size"
        )));
    }

    let mut signature = Signature::new(hash, rolling);
    for _ in 0..remaining / record {
        let length = read_i16(r).map_err(|e| Error::truncated(e, "chunk record"))?;
        if length <= 0 {
            return Err(Error::corrupt(format!(
                "chunk at offset {} has invalid length {length}",
                signature.basis_len()
            )));
        }
        let checksum = read_u32(r).map_err(|e| Error::truncated(e, "chunk record"))?;
        let mut digest = vec![0u8; hash.hash_len()];
        r.read_exact(&mut digest)
            .map_err(|e| Error::truncated(e, "chunk record"))?;
        signature.push_chunk(length as usize, checksum, digest);
    }

    log::debug!(
        "read signature: {} chunks covering {} bytes ({hash}/{rolling})",
        signature.chunks().len(),
        signature.basis_len()
    );
    Ok(signature)
}
