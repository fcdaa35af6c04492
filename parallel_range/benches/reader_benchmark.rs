use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use parallel_range::{LocalStore, MemoryStore, ObjectStore, ParallelRangeReader, ReaderConfig};
use pprof::criterion::{Output, PProfProfiler};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

const MIB: usize = 1024 * 1024;

fn object(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i * 31 % 251) as u8).collect()
}

fn config(part_size: usize, parallelism: usize) -> ReaderConfig {
    ReaderConfig::new(part_size as u64, parallelism)
        .with_admission_interval(Duration::from_millis(1))
        .with_poll_intervals(Duration::from_millis(5), Duration::from_millis(5))
}

fn drain(store: Arc<dyn ObjectStore>, config: ReaderConfig, buf_size: usize) -> usize {
    let mut reader = ParallelRangeReader::open(store, "bench/object.bin", config).unwrap();
    let mut buffer = vec![0u8; buf_size];
    let mut total = 0;
    loop {
        let n = reader.read(&mut buffer).unwrap();
        if n == 0 {
            break;
        }
        total += n;
    }
    reader.close().unwrap();
    total
}

fn bench_memory_parallelism(c: &mut Criterion) {
    let data = object(64 * MIB);
    let store = MemoryStore::new();
    store.insert("bench", "object.bin", data.clone());
    let store: Arc<dyn ObjectStore> = Arc::new(store);

    let mut group = c.benchmark_group("memory_store");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.sample_size(10);

    for parallelism in [1, 4, 16] {
        group.bench_with_input(
            BenchmarkId::new("parallelism", parallelism),
            &parallelism,
            |b, &parallelism| {
                b.iter(|| drain(store.clone(), config(4 * MIB, parallelism), 64 * 1024))
            },
        );
    }

    group.finish();
}

fn bench_read_buffer_sizes(c: &mut Criterion) {
    let data = object(16 * MIB);
    let store = MemoryStore::new();
    store.insert("bench", "object.bin", data.clone());
    let store: Arc<dyn ObjectStore> = Arc::new(store);

    let mut group = c.benchmark_group("read_buffer");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.sample_size(10);

    // 4096 is the block size the digest driver reads with.
    for buf_size in [1024, 4096, 65536] {
        group.bench_function(format!("buffer_{}", buf_size), |b| {
            b.iter(|| drain(store.clone(), config(MIB, 4), buf_size))
        });
    }

    group.finish();
}

fn bench_local_store(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data = object(32 * MIB);
    std::fs::create_dir_all(dir.path().join("bench")).unwrap();
    std::fs::write(dir.path().join("bench/object.bin"), &data).unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));

    let mut group = c.benchmark_group("local_store");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.sample_size(10);

    group.bench_function("parallel_range", |b| {
        b.iter(|| drain(store.clone(), config(4 * MIB, 8), 64 * 1024))
    });

    group.bench_function("std_fs_read", |b| {
        b.iter(|| {
            let mut file = std::fs::File::open(dir.path().join("bench/object.bin")).unwrap();
            let mut buffer = vec![0u8; 64 * 1024];
            let mut total = 0;
            while let Ok(n) = file.read(&mut buffer) {
                if n == 0 {
                    break;
                }
                total += n;
            }
            total
        })
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)));
    targets = bench_memory_parallelism, bench_read_buffer_sizes, bench_local_store
}
criterion_main!(benches);
