// Delta builder.
//
// Slides a window across the new file one byte at a time, updating the
// rolling checksum in O(1), and looks each checksum up in an index of the
// basis signature. A checksum hit is confirmed with the strong hash before
// a Copy is emitted; bytes between confirmed matches become Data commands.
//
// The new file is scanned in buffers. Consecutive buffers overlap by
// `max_chunk - 1` bytes so a window that straddles a buffer boundary is
// tested in full in the next buffer.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};

use super::{AggregateCopies, DataRange, DeltaWriter};
use crate::config::DEFAULT_READ_BUFFER_SIZE;
use crate::hash::RollingChecksumAlgorithm;
use crate::io::read_full;
use crate::progress::{NullProgressReporter, ProgressReporter};
use crate::signature::{ChunkSignature, Signature};
use crate::Result;

const OPERATION: &str = "Building delta";

/// Configuration for delta building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaOptions {
    /// Bytes of the new file scanned per buffer. Raised to twice the largest
    /// chunk when smaller.
    pub read_buffer_size: usize,
    /// Merge Copy commands that continue the same basis run.
    pub aggregate_copies: bool,
}

impl Default for DeltaOptions {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            aggregate_copies: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Chunk index
// ---------------------------------------------------------------------------

/// Signature chunks grouped by rolling checksum.
struct ChunkIndex<'a> {
    chunks: &'a [ChunkSignature],
    /// Indices into `chunks`, sorted by checksum; basis order within a group.
    by_checksum: Vec<usize>,
    /// Checksum -> position of its first entry in `by_checksum`.
    first: HashMap<u32, usize>,
    min_len: usize,
    max_len: usize,
}

impl<'a> ChunkIndex<'a> {
    /// `None` when there is nothing to match against.
    fn new(chunks: &'a [ChunkSignature]) -> Option<Self> {
        let mut by_checksum: Vec<usize> = (0..chunks.len()).filter(|&i| chunks[i].length > 0).collect();
        let min_len = by_checksum.iter().map(|&i| chunks[i].length).min()?;
        let max_len = by_checksum.iter().map(|&i| chunks[i].length).max()?;

        by_checksum.sort_by_key(|&i| chunks[i].rolling_checksum);
        let mut first = HashMap::with_capacity(by_checksum.len());
        for (pos, &i) in by_checksum.iter().enumerate() {
            first.entry(chunks[i].rolling_checksum).or_insert(pos);
        }

        Some(Self {
            chunks,
            by_checksum,
            first,
            min_len,
            max_len,
        })
    }

    fn candidates(&self, checksum: u32) -> impl Iterator<Item = usize> + '_ {
        let start = self.first.get(&checksum).copied().unwrap_or(self.by_checksum.len());
        self.by_checksum[start..]
            .iter()
            .copied()
            .take_while(move |&i| self.chunks[i].rolling_checksum == checksum)
    }
}

// ---------------------------------------------------------------------------
// Scan windows
// ---------------------------------------------------------------------------

/// Start, length and rolling checksum of every window tested in one buffer.
///
/// Windows are `max_len` long while that many bytes remain, then `min_len`
/// long up to the end of the buffer. The checksum is calculated in full only
/// at the first window and when the length changes; every other step is a
/// single `rotate`.
struct Windows<'a> {
    rolling: RollingChecksumAlgorithm,
    data: &'a [u8],
    min_len: usize,
    max_len: usize,
    pos: usize,
    len: usize,
    checksum: u32,
}

impl<'a> Windows<'a> {
    fn new(rolling: RollingChecksumAlgorithm, data: &'a [u8], min_len: usize, max_len: usize) -> Self {
        Self {
            rolling,
            data,
            min_len,
            max_len,
            pos: 0,
            len: 0,
            checksum: 0,
        }
    }
}

impl Iterator for Windows<'_> {
    type Item = (usize, usize, u32);

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.pos;
        let remaining = self.data.len().checked_sub(i)?;
        if remaining < self.min_len {
            return None;
        }
        let len = if remaining < self.max_len { self.min_len } else { self.max_len };

        self.checksum = if i == 0 || len != self.len {
            self.rolling.calculate(&self.data[i..i + len])
        } else {
            self.rolling
                .rotate(self.checksum, self.data[i - 1], self.data[i + len - 1], len)
        };
        self.len = len;
        self.pos += 1;
        Some((i, len, self.checksum))
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Computes the delta that turns a signature's basis into a new file.
pub struct DeltaBuilder {
    opts: DeltaOptions,
    progress: Box<dyn ProgressReporter>,
}

impl DeltaBuilder {
    pub fn new(opts: DeltaOptions) -> Self {
        Self {
            opts,
            progress: Box::new(NullProgressReporter),
        }
    }

    pub fn with_progress(mut self, progress: impl ProgressReporter + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn options(&self) -> &DeltaOptions {
        &self.opts
    }

    /// Scan `new_file` against `signature`, emitting metadata followed by
    /// commands into `writer`, then finish the writer.
    pub fn build_delta<N, W>(&mut self, new_file: &mut N, signature: &Signature, writer: W) -> Result<()>
    where
        N: Read + Seek,
        W: DeltaWriter,
    {
        if self.opts.aggregate_copies {
            self.scan(new_file, signature, AggregateCopies::new(writer))
        } else {
            self.scan(new_file, signature, writer)
        }
    }

    fn scan<N, W>(&mut self, new_file: &mut N, signature: &Signature, mut writer: W) -> Result<()>
    where
        N: Read + Seek,
        W: DeltaWriter,
    {
        let hash = signature.hash_algorithm();
        let rolling = signature.rolling_algorithm();

        let total = new_file.seek(SeekFrom::End(0))?;
        new_file.seek(SeekFrom::Start(0))?;
        self.progress.report(OPERATION, 0, total);

        let (expected_hash, _) = hash.compute_reader(new_file)?;
        new_file.seek(SeekFrom::Start(0))?;
        writer.write_metadata(hash, &expected_hash)?;

        let Some(index) = ChunkIndex::new(signature.chunks()) else {
            log::debug!("empty signature, emitting {total} bytes as data");
            if total > 0 {
                writer.write_data(new_file, 0, total)?;
            }
            self.progress.report(OPERATION, total, total);
            return writer.finish();
        };

        let (min_len, max_len) = (index.min_len, index.max_len);
        let mut buffer = vec![0u8; self.opts.read_buffer_size.max(2 * max_len)];
        log::debug!(
            "scanning {total} bytes against {} chunks ({min_len}..={max_len} bytes) with a {}-byte buffer",
            signature.chunks().len(),
            buffer.len()
        );

        let mut last_match: u64 = 0;
        // Index of the chunk after the last one copied; tried first so that
        // duplicate chunks resolve to one continuous basis run.
        let mut next_chunk: Option<usize> = None;
        let mut end;
        loop {
            let start = new_file.stream_position()?;
            let read = read_full(new_file, &mut buffer)?;
            end = start + read as u64;

            let data = &buffer[..read];
            for (i, window_len, checksum) in Windows::new(rolling, data, min_len, max_len) {
                let position = start + i as u64;
                if position < last_match {
                    continue;
                }

                let window = &data[i..i + window_len];
                let mut strong: Option<Vec<u8>> = None;
                let mut confirms = |c: &ChunkSignature| {
                    c.rolling_checksum == checksum
                        && c.length == window_len
                        && *strong.get_or_insert_with(|| hash.compute(window)) == c.hash
                };
                let matched = next_chunk
                    .filter(|&n| n < index.chunks.len() && confirms(&index.chunks[n]))
                    .or_else(|| index.candidates(checksum).find(|&n| confirms(&index.chunks[n])));

                if let Some(n) = matched {
                    let chunk = &index.chunks[n];
                    if position > last_match {
                        log::trace!("data {last_match}..{position}");
                        writer.write_data(new_file, last_match, position - last_match)?;
                    }
                    log::trace!("copy chunk {n} ({} bytes) at {position}", chunk.length);
                    writer.write_copy(DataRange::new(chunk.start_offset, chunk.length as u64))?;
                    last_match = position + window_len as u64;
                    next_chunk = Some(n + 1);
                }
            }

            self.progress.report(OPERATION, end, total);
            if read < buffer.len() {
                break;
            }
            new_file.seek(SeekFrom::Start(end - (max_len as u64 - 1)))?;
        }

        if end > last_match {
            writer.write_data(new_file, last_match, end - last_match)?;
        }
        writer.finish()
    }
}
