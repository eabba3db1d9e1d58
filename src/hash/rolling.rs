// Rolling checksum used to find candidate chunk matches.
//
// Adler-style: `a` is a byte sum biased by one, `b` the running sum of `a`,
// both truncated to 16 bits and packed as `(b << 16) | a`. Unlike zlib's
// Adler-32 the accumulators wrap at 2^16 rather than modulo 65521, which is
// what allows an O(1) rotate with plain wrapping arithmetic.

use crate::{Error, Result};

/// Rolling checksum algorithms a signature may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RollingChecksumAlgorithm {
    #[default]
    Adler32,
}

impl RollingChecksumAlgorithm {
    /// Every algorithm this build understands.
    pub const ALL: [Self; 1] = [Self::Adler32];

    /// Name recorded in signature files.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Adler32 => "Adler32",
        }
    }

    /// Look up an algorithm by the name stored in a signature file.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.name() == name)
            .ok_or_else(|| {
                Error::incompatible(format!(
                    "the rolling checksum algorithm '{name}' is not supported"
                ))
            })
    }

    /// Checksum of the whole `window`, computed from scratch.
    #[inline]
    pub fn calculate(self, window: &[u8]) -> u32 {
        match self {
            Self::Adler32 => adler32_calculate(window),
        }
    }

    /// Checksum of the window shifted one byte forward: `removed` leaves the
    /// front, `added` enters at the back. `window_size` is the byte length of
    /// the window both before and after the shift.
    #[inline(always)]
    pub fn rotate(self, checksum: u32, removed: u8, added: u8, window_size: usize) -> u32 {
        match self {
            Self::Adler32 => adler32_rotate(checksum, removed, added, window_size),
        }
    }
}

impl std::fmt::Display for RollingChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Full checksum over `window`.
#[inline]
pub fn adler32_calculate(window: &[u8]) -> u32 {
    let mut a: u16 = 1;
    let mut b: u16 = 0;
    for &byte in window {
        a = a.wrapping_add(u16::from(byte));
        b = b.wrapping_add(a);
    }
    (u32::from(b) << 16) | u32::from(a)
}

/// O(1) update of a checksum produced by [`adler32_calculate`].
#[inline(always)]
pub fn adler32_rotate(checksum: u32, removed: u8, added: u8, window_size: usize) -> u32 {
    let removed = u16::from(removed);
    let mut a = checksum as u16;
    let mut b = (checksum >> 16) as u16;

    a = a.wrapping_sub(removed).wrapping_add(u16::from(added));
    // Only the low 16 bits of the window size matter modulo 2^16.
    b = b
        .wrapping_sub((window_size as u16).wrapping_mul(removed))
        .wrapping_add(a)
        .wrapping_sub(1);

    (u32::from(b) << 16) | u32::from(a)
}
