#![no_main]
use chunkdelta::delta::{DeltaOptions, PatchOptions};
use chunkdelta::engine;
use chunkdelta::signature::SignatureOptions;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    // First bytes pick the chunk size, buffer size and aggregation.
    let chunk_size = 128 + (data[0] as usize) * 4;
    let read_buffer_size = 1 + (data[1] as usize) * 64;
    let aggregate_copies = data[2] & 1 != 0;
    let payload = &data[3..];

    // Split payload into "basis" and "new".
    let split = payload.len() / 2;
    let (basis, new) = payload.split_at(split);

    let sig = engine::signature(
        basis,
        SignatureOptions {
            chunk_size,
            ..Default::default()
        },
    )
    .unwrap();
    let delta = engine::diff(
        &sig,
        new,
        DeltaOptions {
            read_buffer_size,
            aggregate_copies,
        },
    )
    .unwrap();
    let patched = engine::patch(basis, &delta, PatchOptions::default()).unwrap();
    assert_eq!(patched, new);
});
