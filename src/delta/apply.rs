// Delta applier.
//
// Replays a delta's commands in order against the basis file, then
// optionally re-reads the output and checks it against the hash recorded in
// the delta.

use std::io::{Read, Seek, SeekFrom, Write};

use super::{DataRange, DeltaSink};
use crate::config::COPY_BUFFER_SIZE;
use crate::error::to_hex;
use crate::format::DeltaReader;
use crate::io::read_full;
use crate::progress::{NullProgressReporter, ProgressReporter};
use crate::{Error, Result};

/// Configuration for delta application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOptions {
    /// Hash the output after writing and compare it to the delta's expected
    /// hash. Costs a second full read of the output.
    pub verify: bool,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self { verify: true }
    }
}

/// Reconstructs a new file from a basis file and a delta.
pub struct DeltaApplier {
    opts: PatchOptions,
    progress: Box<dyn ProgressReporter>,
}

impl DeltaApplier {
    pub fn new(opts: PatchOptions) -> Self {
        Self {
            opts,
            progress: Box::new(NullProgressReporter),
        }
    }

    pub fn with_progress(mut self, progress: impl ProgressReporter + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn options(&self) -> &PatchOptions {
        &self.opts
    }

    /// Write the file described by `delta` to `output`, starting at the
    /// output's current position. Returns the number of bytes written.
    pub fn apply<B, D, O>(&mut self, basis: &mut B, delta: &mut DeltaReader<D>, output: &mut O) -> Result<u64>
    where
        B: Read + Seek,
        D: Read,
        O: Read + Write + Seek,
    {
        let output_start = output.stream_position()?;
        let mut sink = ApplySink {
            basis,
            output: &mut *output,
            buf: Vec::new(),
            written: 0,
        };
        delta.replay_with_progress(&mut sink, self.progress.as_mut())?;
        let written = sink.written;
        output.flush()?;
        log::debug!("patch wrote {written} bytes");

        if self.opts.verify {
            let hash = delta.hash_algorithm();
            output.seek(SeekFrom::Start(output_start))?;
            let (actual, hashed) = hash.compute_reader(&mut Read::take(&mut *output, written))?;
            if hashed != written || actual != delta.expected_hash() {
                return Err(Error::Verification {
                    algorithm: hash.name(),
                    expected: to_hex(delta.expected_hash()),
                    actual: to_hex(&actual),
                });
            }
            log::debug!("verified output {hash} {}", to_hex(&actual));
        } else {
            log::debug!("skipping output verification");
        }
        Ok(written)
    }
}

/// Streams replayed commands from the basis and delta into the output.
struct ApplySink<'a, B, O> {
    basis: &'a mut B,
    output: &'a mut O,
    /// Scratch for basis copies; grows up to `COPY_BUFFER_SIZE`.
    buf: Vec<u8>,
    written: u64,
}

impl<B: Read + Seek, O: Write> DeltaSink for ApplySink<'_, B, O> {
    fn copy(&mut self, range: DataRange) -> Result<()> {
        self.basis.seek(SeekFrom::Start(range.start))?;
        let piece = usize::try_from(range.length).map_or(COPY_BUFFER_SIZE, |l| l.min(COPY_BUFFER_SIZE));
        if self.buf.len() < piece {
            self.buf.resize(piece, 0);
        }

        let mut remaining = range.length;
        while remaining > 0 {
            let want = remaining.min(self.buf.len() as u64) as usize;
            let got = read_full(&mut *self.basis, &mut self.buf[..want])?;
            if got < want {
                return Err(Error::corrupt(format!(
                    "copy of {}..{} runs past the end of the basis file",
                    range.start,
                    range.end()
                )));
            }
            self.output.write_all(&self.buf[..want])?;
            remaining -= want as u64;
        }
        self.written += range.length;
        Ok(())
    }

    fn data(&mut self, bytes: &[u8]) -> Result<()> {
        self.output.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }
}
