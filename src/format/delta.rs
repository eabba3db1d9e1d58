// Delta file encoding/decoding.
//
// Layout:
//   "OCTODELTA" | version | hash name | i32 hash length | hash bytes | ">>>"
//   then commands until end of stream:
//   0x60 | i64 basis offset | i64 length          (Copy)
//   0x80 | i64 length | literal bytes              (Data)
//
// Neither side holds a whole Data payload: the writer streams literal runs
// from the new file and the reader hands them to the sink in pieces.

use std::io::{self, Read, Seek, SeekFrom, Write};

use super::{
    COPY_COMMAND, DATA_COMMAND, DELTA_MAGIC, END_OF_METADATA, read_end_of_metadata, read_i32,
    read_i64, read_preamble, read_string, write_preamble, write_string,
};
use crate::config::{COPY_BUFFER_SIZE, DATA_BUFFER_SIZE};
use crate::delta::{DataRange, DeltaSink, DeltaSummary, DeltaWriter};
use crate::hash::HashAlgorithm;
use crate::progress::{NullProgressReporter, ProgressReporter};
use crate::{Error, Result};

const APPLY_OPERATION: &str = "Applying delta";

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Serializes delta commands to a byte stream.
pub struct BinaryDeltaWriter<W: Write> {
    inner: W,
    summary: DeltaSummary,
    metadata_written: bool,
    /// Scratch for streaming literal runs; grows up to `DATA_BUFFER_SIZE`.
    buf: Vec<u8>,
}

impl<W: Write> BinaryDeltaWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            summary: DeltaSummary::default(),
            metadata_written: false,
            buf: Vec::new(),
        }
    }

    /// Commands written so far.
    pub fn summary(&self) -> &DeltaSummary {
        &self.summary
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn stream_literal<S: Read + ?Sized>(&mut self, source: &mut S, length: u64) -> Result<()> {
        let piece = usize::try_from(length).map_or(DATA_BUFFER_SIZE, |l| l.min(DATA_BUFFER_SIZE));
        if self.buf.len() < piece {
            self.buf.resize(piece, 0);
        }
        let mut remaining = length;
        while remaining > 0 {
            let n = remaining.min(self.buf.len() as u64) as usize;
            source.read_exact(&mut self.buf[..n])?;
            self.inner.write_all(&self.buf[..n])?;
            remaining -= n as u64;
        }
        Ok(())
    }
}

fn to_wire_i64(value: u64, what: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::corrupt(format!("{what} {value} does not fit in i64")))
}

impl<W: Write> DeltaWriter for BinaryDeltaWriter<W> {
    fn write_metadata(&mut self, hash: HashAlgorithm, expected_hash: &[u8]) -> Result<()> {
        debug_assert!(!self.metadata_written, "delta metadata written twice");
        if expected_hash.len() != hash.hash_len() {
            return Err(Error::corrupt(format!(
                "{hash} digests are {} bytes, got {}",
                hash.hash_len(),
                expected_hash.len()
            )));
        }
        let hash_len = i32::try_from(expected_hash.len())
            .map_err(|_| Error::corrupt("hash too long for the delta format"))?;

        write_preamble(&mut self.inner, DELTA_MAGIC)?;
        write_string(&mut self.inner, hash.name())?;
        self.inner.write_all(&hash_len.to_le_bytes())?;
        self.inner.write_all(expected_hash)?;
        self.inner.write_all(END_OF_METADATA)?;
        self.metadata_written = true;
        Ok(())
    }

    fn write_copy(&mut self, range: DataRange) -> Result<()> {
        debug_assert!(self.metadata_written, "copy command before metadata");
        let start = to_wire_i64(range.start, "copy offset")?;
        let length = to_wire_i64(range.length, "copy length")?;

        let mut record = [0u8; 17];
        record[0] = COPY_COMMAND;
        record[1..9].copy_from_slice(&start.to_le_bytes());
        record[9..].copy_from_slice(&length.to_le_bytes());
        self.inner.write_all(&record)?;
        self.summary.record_copy(range.length);
        Ok(())
    }

    fn write_data<S: Read + Seek + ?Sized>(
        &mut self,
        source: &mut S,
        offset: u64,
        length: u64,
    ) -> Result<()> {
        debug_assert!(self.metadata_written, "data command before metadata");
        let wire_len = to_wire_i64(length, "data length")?;
        self.inner.write_all(&[DATA_COMMAND])?;
        self.inner.write_all(&wire_len.to_le_bytes())?;

        let original = source.stream_position()?;
        source.seek(SeekFrom::Start(offset))?;
        let streamed = self.stream_literal(source, length);
        source.seek(SeekFrom::Start(original))?;
        streamed?;

        self.summary.record_data(length);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.flush()?;
        log::debug!(
            "delta written: {} copy ({} bytes), {} data ({} bytes)",
            self.summary.copy_commands,
            self.summary.copy_bytes,
            self.summary.data_commands,
            self.summary.data_bytes
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Tracks how many bytes have been pulled from the delta stream.
struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

/// Streaming delta decoder.
///
/// Metadata is parsed by [`DeltaReader::new`]; commands are replayed into a
/// [`DeltaSink`] afterwards, in file order.
pub struct DeltaReader<R: Read> {
    reader: CountingReader<R>,
    hash_algorithm: HashAlgorithm,
    expected_hash: Vec<u8>,
    len_hint: Option<u64>,
    buf: Vec<u8>,
}

impl<R: Read> DeltaReader<R> {
    /// Parse the delta header and metadata from `reader`.
    pub fn new(reader: R) -> Result<Self> {
        let mut reader = CountingReader {
            inner: reader,
            count: 0,
        };
        read_preamble(&mut reader, DELTA_MAGIC, "delta")?;

        let hash_algorithm = HashAlgorithm::from_name(&read_string(&mut reader, "hash algorithm name")?)?;
        let hash_len = read_i32(&mut reader).map_err(|e| Error::truncated(e, "hash length"))?;
        if usize::try_from(hash_len).ok() != Some(hash_algorithm.hash_len()) {
            return Err(Error::corrupt(format!(
                "the delta file declares a {hash_len}-byte {hash_algorithm} hash, expected {}",
                hash_algorithm.hash_len()
            )));
        }
        let mut expected_hash = vec![0u8; hash_algorithm.hash_len()];
        reader
            .read_exact(&mut expected_hash)
            .map_err(|e| Error::truncated(e, "expected hash"))?;
        read_end_of_metadata(&mut reader, "delta")?;

        Ok(Self {
            reader,
            hash_algorithm,
            expected_hash,
            len_hint: None,
            buf: Vec::new(),
        })
    }

    /// Total size of the delta stream, used as the progress denominator.
    pub fn with_len_hint(mut self, len: u64) -> Self {
        self.len_hint = Some(len);
        self
    }

    /// Algorithm that produced [`DeltaReader::expected_hash`].
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    /// Strong hash of the file this delta reconstructs.
    pub fn expected_hash(&self) -> &[u8] {
        &self.expected_hash
    }

    /// Bytes consumed from the delta stream so far.
    pub fn bytes_read(&self) -> u64 {
        self.reader.count
    }

    pub fn into_inner(self) -> R {
        self.reader.inner
    }

    /// Replay every remaining command into `sink`.
    pub fn replay<S: DeltaSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        self.replay_with_progress(sink, &mut NullProgressReporter)
    }

    /// Like [`DeltaReader::replay`], reporting stream position after each
    /// command.
    pub fn replay_with_progress<S: DeltaSink + ?Sized>(
        &mut self,
        sink: &mut S,
        progress: &mut dyn ProgressReporter,
    ) -> Result<()> {
        let total = self.len_hint.unwrap_or(0);
        while let Some(tag) = self.next_tag()? {
            match tag {
                COPY_COMMAND => {
                    let start = self.read_length("copy offset")?;
                    let length = self.read_length("copy length")?;
                    sink.copy(DataRange::new(start, length))?;
                }
                DATA_COMMAND => {
                    let length = self.read_length("data length")?;
                    self.replay_literal(sink, length)?;
                }
                other => {
                    return Err(Error::corrupt(format!(
                        "unknown delta command 0x{other:02x} at offset {}",
                        self.reader.count - 1
                    )));
                }
            }
            progress.report(APPLY_OPERATION, self.reader.count, total);
        }
        Ok(())
    }

    /// Next command tag, or `None` at a clean end of stream.
    fn next_tag(&mut self) -> Result<Option<u8>> {
        let mut tag = [0u8; 1];
        loop {
            match self.reader.read(&mut tag) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(tag[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    fn read_length(&mut self, what: &str) -> Result<u64> {
        let value = read_i64(&mut self.reader).map_err(|e| Error::truncated(e, what))?;
        u64::try_from(value).map_err(|_| Error::corrupt(format!("negative {what} {value}")))
    }

    fn replay_literal<S: DeltaSink + ?Sized>(&mut self, sink: &mut S, length: u64) -> Result<()> {
        sink.begin_data(length)?;
        let piece = usize::try_from(length).map_or(COPY_BUFFER_SIZE, |l| l.min(COPY_BUFFER_SIZE));
        if self.buf.len() < piece {
            self.buf.resize(piece, 0);
        }
        let mut remaining = length;
        while remaining > 0 {
            let n = remaining.min(self.buf.len() as u64) as usize;
            self.reader
                .read_exact(&mut self.buf[..n])
                .map_err(|e| Error::truncated(e, "data command payload"))?;
            sink.data(&self.buf[..n])?;
            remaining -= n as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::{DeltaCommand, DeltaRecorder};
    use std::io::Cursor;

    const HASH: [u8; 20] = [0x11; 20];

    fn header() -> Vec<u8> {
        let mut out = b"OCTODELTA\x01\x04SHA1".to_vec();
        out.extend_from_slice(&20i32.to_le_bytes());
        out.extend_from_slice(&HASH);
        out.extend_from_slice(b">>>");
        out
    }

    fn sample_delta() -> Vec<u8> {
        let mut source = Cursor::new(b"hello, world".to_vec());
        let mut writer = BinaryDeltaWriter::new(Vec::new());
        writer.write_metadata(HashAlgorithm::Sha1, &HASH).unwrap();
        writer.write_copy(DataRange::new(4096, 2048)).unwrap();
        writer.write_data(&mut source, 7, 5).unwrap();
        writer.finish().unwrap();
        writer.into_inner()
    }

    fn replay(bytes: Vec<u8>) -> Result<DeltaRecorder> {
        let mut reader = DeltaReader::new(Cursor::new(bytes))?;
        let mut rec = DeltaRecorder::new();
        reader.replay(&mut rec)?;
        Ok(rec)
    }

    #[test]
    fn metadata_layout() {
        let mut writer = BinaryDeltaWriter::new(Vec::new());
        writer.write_metadata(HashAlgorithm::Sha1, &HASH).unwrap();
        assert_eq!(writer.into_inner(), header());
    }

    #[test]
    fn command_layout() {
        let bytes = sample_delta();
        let body = &bytes[header().len()..];
        assert_eq!(body[0], COPY_COMMAND);
        assert_eq!(&body[1..9], &4096i64.to_le_bytes());
        assert_eq!(&body[9..17], &2048i64.to_le_bytes());
        assert_eq!(body[17], DATA_COMMAND);
        assert_eq!(&body[18..26], &5i64.to_le_bytes());
        assert_eq!(&body[26..], b"world");
    }

    #[test]
    fn writer_restores_source_position_and_counts() {
        let mut source = Cursor::new(vec![9u8; 100]);
        source.set_position(42);
        let mut writer = BinaryDeltaWriter::new(Vec::new());
        writer.write_metadata(HashAlgorithm::Sha1, &HASH).unwrap();
        writer.write_data(&mut source, 10, 20).unwrap();
        writer.write_copy(DataRange::new(0, 7)).unwrap();
        assert_eq!(source.position(), 42);
        assert_eq!(
            *writer.summary(),
            DeltaSummary {
                copy_commands: 1,
                copy_bytes: 7,
                data_commands: 1,
                data_bytes: 20,
            }
        );
    }

    #[test]
    fn reader_replays_writer_output() {
        let mut reader = DeltaReader::new(Cursor::new(sample_delta())).unwrap();
        assert_eq!(reader.hash_algorithm(), HashAlgorithm::Sha1);
        assert_eq!(reader.expected_hash(), &HASH);
        assert_eq!(reader.bytes_read(), header().len() as u64);

        let mut rec = DeltaRecorder::new();
        reader.replay(&mut rec).unwrap();
        assert_eq!(
            rec.commands,
            vec![
                DeltaCommand::Copy(DataRange::new(4096, 2048)),
                DeltaCommand::Data(b"world".to_vec()),
            ]
        );
    }

    #[test]
    fn header_only_delta_has_no_commands() {
        assert!(replay(header()).unwrap().commands.is_empty());
    }

    #[test]
    fn truncated_commands_are_corrupt() {
        let full = sample_delta();
        // Inside the copy record, inside the data length, inside the payload.
        for cut in [header().len() + 5, header().len() + 20, full.len() - 2] {
            let err = replay(full[..cut].to_vec()).unwrap_err();
            assert!(matches!(err, Error::CorruptFormat(_)), "cut at {cut}: {err:?}");
        }
    }

    #[test]
    fn unknown_tag_is_corrupt() {
        let mut bytes = header();
        bytes.push(0x42);
        let err = replay(bytes).unwrap_err();
        assert!(matches!(err, Error::CorruptFormat(msg) if msg.contains("0x42")));
    }

    #[test]
    fn negative_lengths_are_corrupt() {
        let mut bytes = header();
        bytes.push(COPY_COMMAND);
        bytes.extend_from_slice(&0i64.to_le_bytes());
        bytes.extend_from_slice(&(-1i64).to_le_bytes());
        assert!(matches!(replay(bytes), Err(Error::CorruptFormat(_))));

        let mut bytes = header();
        bytes.push(DATA_COMMAND);
        bytes.extend_from_slice(&(-10i64).to_le_bytes());
        assert!(matches!(replay(bytes), Err(Error::CorruptFormat(_))));
    }

    #[test]
    fn wrong_hash_length_is_corrupt() {
        let mut bytes = b"OCTODELTA\x01\x04SHA1".to_vec();
        bytes.extend_from_slice(&16i32.to_le_bytes());
        bytes.extend_from_slice(&[0; 16]);
        bytes.extend_from_slice(b">>>");
        assert!(matches!(
            DeltaReader::new(Cursor::new(bytes)),
            Err(Error::CorruptFormat(_))
        ));
    }

    #[test]
    fn header_errors() {
        let mut bytes = header();
        bytes[0] = b'X';
        assert!(matches!(
            DeltaReader::new(Cursor::new(bytes)),
            Err(Error::CorruptFormat(_))
        ));

        let mut bytes = header();
        bytes[9] = 0x07;
        assert!(matches!(
            DeltaReader::new(Cursor::new(bytes)),
            Err(Error::Compatibility(_))
        ));

        let mut bytes = b"OCTODELTA\x01\x03MD5".to_vec();
        bytes.extend_from_slice(&16i32.to_le_bytes());
        assert!(matches!(
            DeltaReader::new(Cursor::new(bytes)),
            Err(Error::Compatibility(_))
        ));

        let mut bytes = header();
        let n = bytes.len();
        bytes[n - 1] = b'<';
        assert!(matches!(
            DeltaReader::new(Cursor::new(bytes)),
            Err(Error::CorruptFormat(_))
        ));

        assert!(matches!(
            DeltaReader::new(Cursor::new(b"OCTODELTA".to_vec())),
            Err(Error::CorruptFormat(_))
        ));
    }

    #[test]
    fn large_literal_arrives_in_bounded_pieces() {
        struct Pieces(Vec<usize>, u64);
        impl DeltaSink for Pieces {
            fn copy(&mut self, _range: DataRange) -> Result<()> {
                Ok(())
            }
            fn begin_data(&mut self, length: u64) -> Result<()> {
                self.1 = length;
                Ok(())
            }
            fn data(&mut self, bytes: &[u8]) -> Result<()> {
                self.0.push(bytes.len());
                Ok(())
            }
        }

        let len = COPY_BUFFER_SIZE + 1000;
        let mut source = Cursor::new(vec![0xEEu8; len]);
        let mut writer = BinaryDeltaWriter::new(Vec::new());
        writer.write_metadata(HashAlgorithm::Sha1, &HASH).unwrap();
        writer.write_data(&mut source, 0, len as u64).unwrap();

        let mut reader = DeltaReader::new(Cursor::new(writer.into_inner())).unwrap();
        let mut sink = Pieces(Vec::new(), 0);
        reader.replay(&mut sink).unwrap();
        assert_eq!(sink.1, len as u64);
        assert_eq!(sink.0, vec![COPY_BUFFER_SIZE, 1000]);
    }

    #[test]
    fn replay_reports_stream_progress() {
        let bytes = sample_delta();
        let total = bytes.len() as u64;
        let mut reader = DeltaReader::new(Cursor::new(bytes)).unwrap().with_len_hint(total);
        let mut seen = Vec::new();
        let mut progress = |_: &str, cur: u64, t: u64| seen.push((cur, t));
        reader
            .replay_with_progress(&mut DeltaSummary::default(), &mut progress)
            .unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen.last(), Some(&(total, total)));
    }
}
