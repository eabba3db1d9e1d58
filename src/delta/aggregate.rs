// Copy aggregation.
//
// Wraps a DeltaWriter and holds back the most recent Copy. A following Copy
// whose basis range starts exactly where the held one ends is folded into
// it; anything else flushes the held Copy first. Only offsets and lengths
// are inspected, never file contents.

use std::io::{Read, Seek};

use super::{DataRange, DeltaWriter};
use crate::Result;
use crate::hash::HashAlgorithm;

/// Decorator merging basis-contiguous Copy commands.
#[derive(Debug)]
pub struct AggregateCopies<W: DeltaWriter> {
    inner: W,
    pending: Option<DataRange>,
}

impl<W: DeltaWriter> AggregateCopies<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            pending: None,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwrap the inner writer. Call [`DeltaWriter::finish`] first or a held
    /// Copy is lost.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn flush_pending(&mut self) -> Result<()> {
        if let Some(range) = self.pending.take() {
            self.inner.write_copy(range)?;
        }
        Ok(())
    }
}

/// Merge `next` onto `held` when it continues the same basis run.
fn try_coalesce(held: DataRange, next: DataRange) -> Option<DataRange> {
    (held.length > 0 && held.end() == next.start)
        .then(|| DataRange::new(held.start, held.length + next.length))
}

impl<W: DeltaWriter> DeltaWriter for AggregateCopies<W> {
    fn write_metadata(&mut self, hash: HashAlgorithm, expected_hash: &[u8]) -> Result<()> {
        self.inner.write_metadata(hash, expected_hash)
    }

    fn write_copy(&mut self, range: DataRange) -> Result<()> {
        if let Some(held) = self.pending
            && let Some(merged) = try_coalesce(held, range)
        {
            self.pending = Some(merged);
            return Ok(());
        }
        self.flush_pending()?;
        self.pending = Some(range);
        Ok(())
    }

    fn write_data<R: Read + Seek + ?Sized>(
        &mut self,
        source: &mut R,
        offset: u64,
        length: u64,
    ) -> Result<()> {
        self.flush_pending()?;
        self.inner.write_data(source, offset, length)
    }

    fn finish(&mut self) -> Result<()> {
        self.flush_pending()?;
        self.inner.finish()
    }
}
