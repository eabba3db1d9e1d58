// Delta commands and the streaming contracts around them.
//
// - `builder`:   DeltaBuilder: rolling-checksum scan of the new file
// - `aggregate`: AggregateCopies: merges basis-contiguous Copy commands
// - `apply`:     DeltaApplier: replays a delta against the basis
// - `summary`:   DeltaSummary: command/byte tallies for a delta
//
// Producers emit commands into a `DeltaWriter`; consumers receive them from
// a `DeltaReader` through a `DeltaSink`. Neither side needs the whole delta
// in memory, and Data payloads travel in bounded pieces.

pub mod aggregate;
pub mod apply;
pub mod builder;
pub mod summary;

pub use aggregate::AggregateCopies;
pub use apply::{DeltaApplier, PatchOptions};
pub use builder::{DeltaBuilder, DeltaOptions};
pub use summary::DeltaSummary;

use std::io::{Read, Seek, SeekFrom};

use crate::hash::HashAlgorithm;
use crate::{Error, Result};

/// A byte range in the basis file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataRange {
    pub start: u64,
    pub length: u64,
}

impl DataRange {
    pub const fn new(start: u64, length: u64) -> Self {
        Self { start, length }
    }

    /// Offset one past the end of the range.
    pub const fn end(&self) -> u64 {
        self.start + self.length
    }
}

/// One step of reconstructing the new file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaCommand {
    /// Append `length` bytes of the basis file starting at `start`.
    Copy(DataRange),
    /// Append these literal bytes.
    Data(Vec<u8>),
}

impl DeltaCommand {
    /// Number of output bytes the command produces.
    pub fn output_len(&self) -> u64 {
        match self {
            Self::Copy(range) => range.length,
            Self::Data(bytes) => bytes.len() as u64,
        }
    }
}

/// Destination for commands produced by the delta builder.
///
/// Metadata is written exactly once, before any command.
pub trait DeltaWriter {
    fn write_metadata(&mut self, hash: HashAlgorithm, expected_hash: &[u8]) -> Result<()>;

    fn write_copy(&mut self, range: DataRange) -> Result<()>;

    /// Emit a Data command holding `length` bytes of `source` starting at
    /// `offset`. The position of `source` is the same on return as on entry.
    fn write_data<R: Read + Seek + ?Sized>(
        &mut self,
        source: &mut R,
        offset: u64,
        length: u64,
    ) -> Result<()>;

    /// Flush anything buffered. No commands follow.
    fn finish(&mut self) -> Result<()>;
}

impl<W: DeltaWriter> DeltaWriter for &mut W {
    fn write_metadata(&mut self, hash: HashAlgorithm, expected_hash: &[u8]) -> Result<()> {
        (**self).write_metadata(hash, expected_hash)
    }

    fn write_copy(&mut self, range: DataRange) -> Result<()> {
        (**self).write_copy(range)
    }

    fn write_data<R: Read + Seek + ?Sized>(
        &mut self,
        source: &mut R,
        offset: u64,
        length: u64,
    ) -> Result<()> {
        (**self).write_data(source, offset, length)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Receiver for commands replayed from a delta stream.
pub trait DeltaSink {
    fn copy(&mut self, range: DataRange) -> Result<()>;

    /// A Data command carrying `length` literal bytes begins; its bytes
    /// follow through [`DeltaSink::data`].
    fn begin_data(&mut self, _length: u64) -> Result<()> {
        Ok(())
    }

    /// Next piece of the current Data command's bytes.
    fn data(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Collects commands in memory.
///
/// Works on both sides: as a `DeltaWriter` it captures what the builder
/// emits, as a `DeltaSink` it captures what a delta stream replays.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeltaRecorder {
    pub hash_algorithm: Option<HashAlgorithm>,
    pub expected_hash: Vec<u8>,
    pub commands: Vec<DeltaCommand>,
    pub finished: bool,
}

impl DeltaRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the new file from `basis` by replaying the recorded commands.
    pub fn reconstruct(&self, basis: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for command in &self.commands {
            match command {
                DeltaCommand::Copy(range) => {
                    let bytes = usize::try_from(range.start)
                        .ok()
                        .zip(usize::try_from(range.end()).ok())
                        .and_then(|(start, end)| basis.get(start..end))
                        .ok_or_else(|| {
                            Error::corrupt(format!(
                                "copy of {}..{} exceeds the {}-byte basis",
                                range.start,
                                range.end(),
                                basis.len()
                            ))
                        })?;
                    out.extend_from_slice(bytes);
                }
                DeltaCommand::Data(bytes) => out.extend_from_slice(bytes),
            }
        }
        Ok(out)
    }
}

impl DeltaWriter for DeltaRecorder {
    fn write_metadata(&mut self, hash: HashAlgorithm, expected_hash: &[u8]) -> Result<()> {
        self.hash_algorithm = Some(hash);
        self.expected_hash = expected_hash.to_vec();
        Ok(())
    }

    fn write_copy(&mut self, range: DataRange) -> Result<()> {
        self.commands.push(DeltaCommand::Copy(range));
        Ok(())
    }

    fn write_data<R: Read + Seek + ?Sized>(
        &mut self,
        source: &mut R,
        offset: u64,
        length: u64,
    ) -> Result<()> {
        let original = source.stream_position()?;
        source.seek(SeekFrom::Start(offset))?;
        let mut bytes = Vec::new();
        let read = Read::take(&mut *source, length).read_to_end(&mut bytes);
        source.seek(SeekFrom::Start(original))?;
        if read? as u64 != length {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "source ended inside a literal range",
            )));
        }
        self.commands.push(DeltaCommand::Data(bytes));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

impl DeltaSink for DeltaRecorder {
    fn copy(&mut self, range: DataRange) -> Result<()> {
        self.commands.push(DeltaCommand::Copy(range));
        Ok(())
    }

    fn begin_data(&mut self, length: u64) -> Result<()> {
        let capacity = length.min(crate::config::DATA_BUFFER_SIZE as u64) as usize;
        self.commands.push(DeltaCommand::Data(Vec::with_capacity(capacity)));
        Ok(())
    }

    fn data(&mut self, bytes: &[u8]) -> Result<()> {
        match self.commands.last_mut() {
            Some(DeltaCommand::Data(buf)) => buf.extend_from_slice(bytes),
            _ => self.commands.push(DeltaCommand::Data(bytes.to_vec())),
        }
        Ok(())
    }
}
