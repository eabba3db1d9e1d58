// Binary wire formats for signatures and deltas.
//
// - `signature`: signature file encode/decode
// - `delta`:     delta writer and streaming delta reader
// - `varint`:    LEB128 length prefixes for metadata strings
//
// Both formats share the layout `magic | version | metadata | ">>>" | body`.
// Integers are little-endian throughout.

pub mod delta;
pub mod signature;
pub mod varint;

pub use delta::{BinaryDeltaWriter, DeltaReader};
pub use signature::{read_signature, write_signature};

use std::io::{self, Read, Write};

use crate::{Error, Result};

// ---------------------------------------------------------------------------
// Magic, version and markers
// ---------------------------------------------------------------------------

pub const SIGNATURE_MAGIC: &[u8; 7] = b"OCTOSIG";
pub const DELTA_MAGIC: &[u8; 9] = b"OCTODELTA";

/// Highest format version this build reads and the one it writes.
pub const FORMAT_VERSION: u8 = 0x01;

/// Marks the end of the metadata section in both formats.
pub const END_OF_METADATA: &[u8; 3] = b">>>";

/// Delta command tags.
pub const COPY_COMMAND: u8 = 0x60;
pub const DATA_COMMAND: u8 = 0x80;

/// Longest algorithm name accepted in metadata.
pub const MAX_NAME_LEN: usize = 255;

// ---------------------------------------------------------------------------
// Header helpers
// ---------------------------------------------------------------------------

pub(crate) fn write_preamble<W: Write + ?Sized>(w: &mut W, magic: &[u8]) -> io::Result<()> {
    w.write_all(magic)?;
    w.write_all(&[FORMAT_VERSION])
}

/// Check the magic bytes and version that open every file.
pub(crate) fn read_preamble<R: Read + ?Sized>(r: &mut R, magic: &[u8], what: &str) -> Result<()> {
    let mut found = vec![0u8; magic.len()];
    match r.read_exact(&mut found) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(Error::corrupt(format!("the {what} file appears to be corrupt")));
        }
        Err(e) => return Err(Error::Io(e)),
    }
    if found != magic {
        return Err(Error::corrupt(format!("the {what} file appears to be corrupt")));
    }

    let version = read_u8(r).map_err(|e| Error::truncated(e, "format version"))?;
    if version > FORMAT_VERSION {
        return Err(Error::incompatible(format!(
            "the {what} file uses format version {version}, newer than this program can handle \
             (version {FORMAT_VERSION})"
        )));
    }
    if version == 0 {
        return Err(Error::corrupt(format!("the {what} file has an invalid version byte 0")));
    }
    Ok(())
}

pub(crate) fn read_end_of_metadata<R: Read + ?Sized>(r: &mut R, what: &str) -> Result<()> {
    let marker: [u8; 3] = read_array(r).map_err(|e| Error::truncated(e, "metadata"))?;
    if &marker != END_OF_METADATA {
        return Err(Error::corrupt(format!(
            "the {what} file appears to be corrupt (missing end-of-metadata marker)"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

pub(crate) fn write_string<W: Write + ?Sized>(w: &mut W, s: &str) -> io::Result<()> {
    let len = u32::try_from(s.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "string too long"))?;
    varint::write_u32(w, len)?;
    w.write_all(s.as_bytes())
}

pub(crate) fn read_string<R: Read + ?Sized>(r: &mut R, what: &str) -> Result<String> {
    let len = varint::stream_read_u32(r).map_err(|e| match e.kind() {
        io::ErrorKind::InvalidData => Error::corrupt(format!("invalid length prefix for {what}")),
        _ => Error::truncated(e, what),
    })? as usize;
    if len > MAX_NAME_LEN {
        return Err(Error::corrupt(format!(
            "{what} is {len} bytes long (max {MAX_NAME_LEN})"
        )));
    }
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes)
        .map_err(|e| Error::truncated(e, what))?;
    String::from_utf8(bytes).map_err(|_| Error::corrupt(format!("{what} is not valid UTF-8")))
}

// ---------------------------------------------------------------------------
// Little-endian primitives
// ---------------------------------------------------------------------------

pub(crate) fn read_array<const N: usize, R: Read + ?Sized>(r: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub(crate) fn read_u8<R: Read + ?Sized>(r: &mut R) -> io::Result<u8> {
    read_array::<1, R>(r).map(|b| b[0])
}

pub(crate) fn read_i16<R: Read + ?Sized>(r: &mut R) -> io::Result<i16> {
    read_array(r).map(i16::from_le_bytes)
}

pub(crate) fn read_u32<R: Read + ?Sized>(r: &mut R) -> io::Result<u32> {
    read_array(r).map(u32::from_le_bytes)
}

pub(crate) fn read_i32<R: Read + ?Sized>(r: &mut R) -> io::Result<i32> {
    read_array(r).map(i32::from_le_bytes)
}

pub(crate) fn read_i64<R: Read + ?Sized>(r: &mut R) -> io::Result<i64> {
    read_array(r).map(i64::from_le_bytes)
}
