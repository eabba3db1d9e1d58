// Length prefixes for strings in signature and delta metadata.
//
// Unsigned LEB128: base-128, least-significant group first. Each byte has
// bit 7 set except the final one. Prefixes are limited to 32-bit values
// (at most five bytes).

use std::io::{self, Read, Write};

/// Maximum encoded length for a 32-bit value (ceil(32/7) = 5).
pub const MAX_VARINT_LEN: usize = 5;

/// Encode `num` into `buf`, returning the number of bytes used (1..=5).
#[inline]
pub fn encode_u32(mut num: u32, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = 0;
    loop {
        let byte = (num & 0x7F) as u8;
        num >>= 7;
        if num == 0 {
            buf[i] = byte;
            return i + 1;
        }
        buf[i] = byte | 0x80;
        i += 1;
    }
}

/// Encode a `u32` and write it to a `Write` sink.
pub fn write_u32<W: Write + ?Sized>(w: &mut W, num: u32) -> io::Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u32(num, &mut buf);
    w.write_all(&buf[..len])
}

/// Decode a `u32` from a byte slice. Returns `(value, bytes_consumed)`.
pub fn read_u32(data: &[u8]) -> Result<(u32, usize), VarIntError> {
    let mut val: u32 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if i == MAX_VARINT_LEN {
            return Err(VarIntError::Overflow);
        }
        let group = u32::from(byte & 0x7F);
        // The fifth group may only carry the top four bits.
        if i == MAX_VARINT_LEN - 1 && group > 0x0F {
            return Err(VarIntError::Overflow);
        }
        val |= group << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((val, i + 1));
        }
    }
    Err(VarIntError::Underflow)
}

/// Read a `u32` varint from a streaming source.
pub fn stream_read_u32<R: Read + ?Sized>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    for i in 0..MAX_VARINT_LEN {
        r.read_exact(&mut buf[i..=i])?;
        if buf[i] & 0x80 == 0 {
            return read_u32(&buf[..=i])
                .map(|(val, _)| val)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
        }
    }
    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        VarIntError::Overflow,
    ))
}

/// Varint decoding failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VarIntError {
    /// Value does not fit in 32 bits.
    #[error("varint overflow")]
    Overflow,
    /// Input ended before the final byte.
    #[error("varint underflow (truncated input)")]
    Underflow,
}
