#![no_main]

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parallel_range::{MemoryStore, ParallelRangeReader, ReaderConfig};

#[derive(Debug, Arbitrary)]
struct Input {
    part_size: u8,
    parallelism: u8,
    window: u8,
    read_size: u8,
    data: Vec<u8>,
}

fuzz_target!(|input: Input| {
    if input.data.len() > 64 * 1024 {
        return;
    }

    let store = MemoryStore::new();
    store.insert("bucket", "key", input.data.clone());

    let parallelism = usize::from(input.parallelism % 8) + 1;
    let config = ReaderConfig::new(u64::from(input.part_size) + 1, parallelism)
        .with_window(usize::from(input.window % 16) + parallelism)
        .with_admission_interval(Duration::from_millis(1))
        .with_poll_intervals(Duration::from_millis(1), Duration::from_millis(1));

    let mut reader = ParallelRangeReader::open(Arc::new(store), "bucket/key", config)
        .expect("reader must open");

    let mut out = Vec::with_capacity(input.data.len());
    let mut buf = vec![0u8; usize::from(input.read_size) + 1];
    loop {
        let n = reader.read(&mut buf).expect("memory store never fails");
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, input.data);
    reader.close().expect("clean close");
});
