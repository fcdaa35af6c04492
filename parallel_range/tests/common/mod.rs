#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parallel_range::{
    MemoryStore, ObjectMetadata, ObjectStore, ReaderConfig, StoreError, StoreResult,
};
use parking_lot::Mutex;

pub const CONTAINER: &str = "bucket";
pub const KEY: &str = "object.bin";
pub const PATH: &str = "s3://bucket/object.bin";

/// Deterministic, non-repeating-looking test payload.
pub fn test_data(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x9E37_79B9;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

/// Settings with every wait shortened to keep tests fast.
pub fn fast_config(part_size: u64, parallelism: usize) -> ReaderConfig {
    ReaderConfig::new(part_size, parallelism)
        .with_admission_interval(Duration::from_millis(1))
        .with_poll_intervals(Duration::from_millis(5), Duration::from_millis(5))
        .with_backoff(Duration::from_millis(1), Duration::from_millis(4))
}

pub fn memory_store(data: &[u8]) -> MemoryStore {
    let store = MemoryStore::new();
    store.insert(CONTAINER, KEY, data.to_vec());
    store
}

/// What a [`FaultyStore`] does to range requests starting at a given offset.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Fail this many requests, then serve normally.
    FailTimes(u32),
    /// Fail every request.
    FailAlways,
    /// Serve every response one byte short.
    Truncate,
    /// Report the object missing.
    NotFound,
    /// Sleep before serving.
    Delay(Duration),
    /// Panic inside the store call.
    Panic,
}

/// Wraps a [`MemoryStore`], injecting faults per range start offset and
/// counting range requests.
pub struct FaultyStore {
    inner: MemoryStore,
    faults: Mutex<HashMap<u64, Fault>>,
    calls: Mutex<HashMap<u64, u32>>,
    total_calls: AtomicUsize,
}

impl FaultyStore {
    pub fn new(data: &[u8]) -> Self {
        Self {
            inner: memory_store(data),
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            total_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_fault(self, start: u64, fault: Fault) -> Self {
        self.faults.lock().insert(start, fault);
        self
    }

    pub fn calls_for(&self, start: u64) -> u32 {
        self.calls.lock().get(&start).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }
}

struct ShortBy<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> Read for ShortBy<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let max = buf.len().min(self.remaining as usize);
        let n = self.inner.read(&mut buf[..max])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

impl ObjectStore for FaultyStore {
    fn metadata(&self, container: &str, key: &str) -> StoreResult<ObjectMetadata> {
        self.inner.metadata(container, key)
    }

    fn get_range(
        &self,
        container: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> StoreResult<Box<dyn Read + Send>> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        let call = {
            let mut calls = self.calls.lock();
            let count = calls.entry(start).or_insert(0);
            *count += 1;
            *count
        };

        let fault = self.faults.lock().get(&start).copied();
        match fault {
            Some(Fault::FailTimes(n)) if call <= n => {
                Err(StoreError::Transport(format!("injected failure {call}/{n}")))
            }
            Some(Fault::FailAlways) => Err(StoreError::Transport("injected failure".into())),
            Some(Fault::NotFound) => Err(StoreError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            }),
            Some(Fault::Truncate) => {
                let body = self.inner.get_range(container, key, start, end)?;
                Ok(Box::new(ShortBy {
                    inner: body,
                    remaining: end - start,
                }))
            }
            Some(Fault::Panic) => panic!("injected panic at offset {start}"),
            Some(Fault::Delay(delay)) => {
                thread::sleep(delay);
                self.inner.get_range(container, key, start, end)
            }
            _ => self.inner.get_range(container, key, start, end),
        }
    }
}

/// Reads `reader` to the end in `buf_size` pieces.
pub fn read_all_in(reader: &mut impl Read, buf_size: usize) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; buf_size];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}
