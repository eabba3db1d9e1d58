// Command and byte tallies for a delta.
//
// Filled either by the binary writer as commands are emitted or by replaying
// an existing delta into it as a sink.

use super::{DataRange, DeltaSink};
use crate::Result;

/// How a delta reconstructs its target.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeltaSummary {
    pub copy_commands: u64,
    pub copy_bytes: u64,
    pub data_commands: u64,
    pub data_bytes: u64,
}

impl DeltaSummary {
    /// Size of the file the delta reconstructs.
    pub fn output_len(&self) -> u64 {
        self.copy_bytes + self.data_bytes
    }

    pub fn commands(&self) -> u64 {
        self.copy_commands + self.data_commands
    }

    pub(crate) fn record_copy(&mut self, length: u64) {
        self.copy_commands += 1;
        self.copy_bytes += length;
    }

    pub(crate) fn record_data(&mut self, length: u64) {
        self.data_commands += 1;
        self.data_bytes += length;
    }
}

impl DeltaSink for DeltaSummary {
    fn copy(&mut self, range: DataRange) -> Result<()> {
        self.record_copy(range.length);
        Ok(())
    }

    fn begin_data(&mut self, length: u64) -> Result<()> {
        self.record_data(length);
        Ok(())
    }

    fn data(&mut self, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tallies_commands() {
        let mut summary = DeltaSummary::default();
        summary.copy(DataRange::new(0, 4096)).unwrap();
        summary.begin_data(10).unwrap();
        summary.data(&[0; 10]).unwrap();
        summary.copy(DataRange::new(8192, 100)).unwrap();

        assert_eq!(summary.copy_commands, 2);
        assert_eq!(summary.copy_bytes, 4196);
        assert_eq!(summary.data_commands, 1);
        assert_eq!(summary.data_bytes, 10);
        assert_eq!(summary.commands(), 3);
        assert_eq!(summary.output_len(), 4206);
    }
}
