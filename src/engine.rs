// In-memory engine: signature, diff and patch over byte slices.
//
// Thin wrappers that run the streaming builders and applier over cursors.
// Useful when both files already live in memory, and as the reference path
// for tests and fuzzing.

use std::io::Cursor;

use crate::Result;
use crate::delta::{DeltaApplier, DeltaBuilder, DeltaOptions, PatchOptions};
use crate::format::{BinaryDeltaWriter, DeltaReader, read_signature, write_signature};
use crate::signature::{Signature, SignatureBuilder, SignatureOptions};

/// Build the signature of `basis`.
pub fn signature(basis: &[u8], opts: SignatureOptions) -> Result<Signature> {
    SignatureBuilder::new(opts)?.build(&mut Cursor::new(basis))
}

/// Build the signature of `basis` and encode it.
pub fn signature_bytes(basis: &[u8], opts: SignatureOptions) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_signature(&mut out, &signature(basis, opts)?)?;
    Ok(out)
}

/// Encode the delta from the basis described by `signature` to `new`.
pub fn diff(signature: &Signature, new: &[u8], opts: DeltaOptions) -> Result<Vec<u8>> {
    let mut delta = Vec::new();
    DeltaBuilder::new(opts).build_delta(&mut Cursor::new(new), signature, BinaryDeltaWriter::new(&mut delta))?;
    Ok(delta)
}

/// Like [`diff`], taking an encoded signature.
pub fn diff_bytes(signature: &[u8], new: &[u8], opts: DeltaOptions) -> Result<Vec<u8>> {
    diff(&read_signature(&mut Cursor::new(signature))?, new, opts)
}

/// Apply an encoded delta to `basis`.
pub fn patch(basis: &[u8], delta: &[u8], opts: PatchOptions) -> Result<Vec<u8>> {
    let mut reader = DeltaReader::new(delta)?;
    let mut out = Cursor::new(Vec::new());
    DeltaApplier::new(opts).apply(&mut Cursor::new(basis), &mut reader, &mut out)?;
    Ok(out.into_inner())
}
