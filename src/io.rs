// File-level helpers for signature, delta and patch.
//
// Provides `signature_file()`, `delta_file()` and `patch_file()`, which open
// the files, wrap them in buffered I/O and drive a configured builder or
// applier over them. Each returns statistics for reporting.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::Result;
use crate::delta::{DeltaApplier, DeltaBuilder, DeltaSummary};
use crate::format::{BinaryDeltaWriter, DeltaReader, read_signature, write_signature};
use crate::hash::HashAlgorithm;
use crate::signature::SignatureBuilder;

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

/// Fill `buf` from `r`, stopping early only at end of stream.
pub(crate) fn read_full<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `signature_file()`.
#[derive(Debug, Clone)]
pub struct SignatureStats {
    /// Basis file size in bytes.
    pub basis_size: u64,
    /// Signature file size in bytes.
    pub signature_size: u64,
    /// Number of chunk records written.
    pub chunks: usize,
    pub hash: HashAlgorithm,
    /// Whole-file strong hash of the basis.
    pub basis_hash: Vec<u8>,
}

/// Statistics returned by `delta_file()`.
#[derive(Debug, Clone)]
pub struct DeltaStats {
    /// Basis size described by the signature.
    pub basis_size: u64,
    /// New file size in bytes.
    pub new_size: u64,
    /// Delta file size in bytes.
    pub delta_size: u64,
    pub summary: DeltaSummary,
}

/// Statistics returned by `patch_file()`.
#[derive(Debug, Clone)]
pub struct PatchStats {
    pub basis_size: u64,
    pub delta_size: u64,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
    pub hash: HashAlgorithm,
    /// Hash the delta expects the output to have.
    pub expected_hash: Vec<u8>,
    /// Whether the output was hashed and compared after writing.
    pub verified: bool,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Build the signature of `basis_path` and write it to `signature_path`.
pub fn signature_file(
    builder: &mut SignatureBuilder,
    basis_path: &Path,
    signature_path: &Path,
) -> Result<SignatureStats> {
    let basis_file = File::open(basis_path)?;
    let basis_size = basis_file.metadata()?.len();
    let mut basis = BufReader::with_capacity(BUF_SIZE, basis_file);

    let signature = builder.build(&mut basis)?;

    let mut out = BufWriter::with_capacity(BUF_SIZE, File::create(signature_path)?);
    write_signature(&mut out, &signature)?;
    let signature_size = out
        .into_inner()
        .map_err(|e| e.into_error())?
        .metadata()?
        .len();

    Ok(SignatureStats {
        basis_size,
        signature_size,
        chunks: signature.chunks().len(),
        hash: signature.hash_algorithm(),
        basis_hash: signature.basis_hash().map(<[u8]>::to_vec).unwrap_or_default(),
    })
}

/// Compute the delta from the basis described by `signature_path` to
/// `new_path` and write it to `delta_path`.
pub fn delta_file(
    builder: &mut DeltaBuilder,
    signature_path: &Path,
    new_path: &Path,
    delta_path: &Path,
) -> Result<DeltaStats> {
    let signature = read_signature(&mut BufReader::with_capacity(BUF_SIZE, File::open(signature_path)?))?;

    let new_file = File::open(new_path)?;
    let new_size = new_file.metadata()?.len();
    let mut new_reader = BufReader::with_capacity(BUF_SIZE, new_file);

    let mut writer = BinaryDeltaWriter::new(BufWriter::with_capacity(BUF_SIZE, File::create(delta_path)?));
    builder.build_delta(&mut new_reader, &signature, &mut writer)?;
    let summary = *writer.summary();
    let delta_size = writer
        .into_inner()
        .into_inner()
        .map_err(|e| e.into_error())?
        .metadata()?
        .len();

    Ok(DeltaStats {
        basis_size: signature.basis_len(),
        new_size,
        delta_size,
        summary,
    })
}

/// Apply the delta at `delta_path` to `basis_path`, writing the result to
/// `output_path`.
pub fn patch_file(
    applier: &mut DeltaApplier,
    basis_path: &Path,
    delta_path: &Path,
    output_path: &Path,
) -> Result<PatchStats> {
    let basis_file = File::open(basis_path)?;
    let basis_size = basis_file.metadata()?.len();
    let mut basis = BufReader::with_capacity(BUF_SIZE, basis_file);

    let delta_file = File::open(delta_path)?;
    let delta_size = delta_file.metadata()?.len();
    let mut delta =
        DeltaReader::new(BufReader::with_capacity(BUF_SIZE, delta_file))?.with_len_hint(delta_size);

    let mut output = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(output_path)?;
    let output_size = applier.apply(&mut basis, &mut delta, &mut output)?;
    output.flush()?;

    Ok(PatchStats {
        basis_size,
        delta_size,
        output_size,
        hash: delta.hash_algorithm(),
        expected_hash: delta.expected_hash().to_vec(),
        verified: applier.options().verify,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::delta::{DeltaOptions, PatchOptions};
    use crate::signature::SignatureOptions;
    use std::path::PathBuf;

    fn write_temp_file(dir: &tempfile::TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    fn builders() -> (SignatureBuilder, DeltaBuilder, DeltaApplier) {
        (
            SignatureBuilder::new(SignatureOptions::default()).unwrap(),
            DeltaBuilder::new(DeltaOptions::default()),
            DeltaApplier::new(PatchOptions::default()),
        )
    }

    #[test]
    fn read_full_stops_at_end_of_stream() {
        let mut buf = [0u8; 8];
        assert_eq!(read_full(&mut b"abc".as_slice(), &mut buf).unwrap(), 3);
        assert_eq!(read_full(&mut b"0123456789".as_slice(), &mut buf).unwrap(), 8);
        assert_eq!(read_full(&mut io::empty(), &mut buf).unwrap(), 0);
    }

    #[test]
    fn signature_delta_patch_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let basis_data: Vec<u8> = (0..100_000u32).map(|i| (i * 7 % 256) as u8).collect();
        let mut new_data = basis_data.clone();
        new_data[50_000..50_010].copy_from_slice(b"0123456789");
        new_data.extend_from_slice(b"appended tail");

        let basis = write_temp_file(&dir, "basis.bin", &basis_data);
        let new = write_temp_file(&dir, "new.bin", &new_data);
        let sig = dir.path().join("basis.octosig");
        let delta = dir.path().join("new.octodelta");
        let out = dir.path().join("out.bin");

        let (mut sb, mut db, mut applier) = builders();
        let sig_stats = signature_file(&mut sb, &basis, &sig).unwrap();
        assert_eq!(sig_stats.basis_size, 100_000);
        assert_eq!(sig_stats.chunks, 49);
        assert_eq!(sig_stats.signature_size, std::fs::metadata(&sig).unwrap().len());
        assert_eq!(sig_stats.basis_hash, HashAlgorithm::Sha1.compute(&basis_data));

        let delta_stats = delta_file(&mut db, &sig, &new, &delta).unwrap();
        assert_eq!(delta_stats.basis_size, 100_000);
        assert_eq!(delta_stats.new_size, new_data.len() as u64);
        assert_eq!(delta_stats.summary.output_len(), new_data.len() as u64);
        assert!(delta_stats.delta_size < 10_000);

        let patch_stats = patch_file(&mut applier, &basis, &delta, &out).unwrap();
        assert!(patch_stats.verified);
        assert_eq!(patch_stats.output_size, new_data.len() as u64);
        assert_eq!(patch_stats.expected_hash, HashAlgorithm::Sha1.compute(&new_data));
        assert_eq!(std::fs::read(&out).unwrap(), new_data);
    }

    #[test]
    fn patch_truncates_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let basis = write_temp_file(&dir, "basis.bin", b"");
        let new = write_temp_file(&dir, "new.bin", b"short");
        let out = write_temp_file(&dir, "out.bin", &[0xFF; 4096]);
        let sig = dir.path().join("sig");
        let delta = dir.path().join("delta");

        let (mut sb, mut db, mut applier) = builders();
        signature_file(&mut sb, &basis, &sig).unwrap();
        delta_file(&mut db, &sig, &new, &delta).unwrap();
        patch_file(&mut applier, &basis, &delta, &out).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"short");
    }

    #[test]
    fn changed_basis_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let data: Vec<u8> = (0..10_000u32).map(|i| (i * 13 % 251) as u8).collect();
        let basis = write_temp_file(&dir, "basis.bin", &data);
        let new = write_temp_file(&dir, "new.bin", &data);
        let sig = dir.path().join("sig");
        let delta = dir.path().join("delta");
        let out = dir.path().join("out");

        let (mut sb, mut db, mut applier) = builders();
        signature_file(&mut sb, &basis, &sig).unwrap();
        delta_file(&mut db, &sig, &new, &delta).unwrap();

        let mut tampered = data.clone();
        tampered[1234] ^= 0xFF;
        std::fs::write(&basis, &tampered).unwrap();

        let err = patch_file(&mut applier, &basis, &delta, &out).unwrap_err();
        assert!(matches!(err, Error::Verification { .. }));
    }

    #[test]
    fn missing_input_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let (mut sb, _, _) = builders();
        let err = signature_file(&mut sb, &dir.path().join("nope"), &dir.path().join("sig")).unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == io::ErrorKind::NotFound));
    }
}
