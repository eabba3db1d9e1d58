#![no_main]
use chunkdelta::delta::{DeltaRecorder, PatchOptions};
use chunkdelta::engine;
use chunkdelta::format::{DeltaReader, read_signature};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Both decoders must reject arbitrary bytes with an error, never a panic.
    let _ = read_signature(&mut Cursor::new(data));
    if let Ok(mut reader) = DeltaReader::new(data) {
        let _ = reader.replay(&mut DeltaRecorder::new());
    }

    // Also apply against a non-empty basis.
    if data.len() >= 2 {
        let split = data.len() / 2;
        let (basis, delta) = data.split_at(split);
        let _ = engine::patch(basis, delta, PatchOptions::default());
    }
});
