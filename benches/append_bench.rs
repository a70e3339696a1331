//! Benchmarks for the sample append hot path

use criterion::{criterion_group, criterion_main, Criterion};
use pvfs::{Config, HighTime, IndexedDataFile, Vfs};
use tempfile::TempDir;

fn append_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");
    group.sample_size(10);

    for (label, async_cache) in [("sync_cache", false), ("async_cache", true)] {
        group.bench_function(label, |b| {
            b.iter_batched(
                || {
                    let temp = TempDir::new().unwrap();
                    let vfs = Vfs::create(&temp.path().join("bench.pvfs")).unwrap();
                    let config = Config::builder()
                        .datarate(1000.0)
                        .async_cache(async_cache)
                        .build();
                    let channel =
                        IndexedDataFile::open_or_create(&vfs, "bench", &config).unwrap();
                    (temp, channel)
                },
                |(_temp, channel)| {
                    for k in 0..100_000i64 {
                        let time = HighTime::new(k / 1000, (k % 1000) as f64 / 1000.0);
                        channel.append(time, k as f64).unwrap();
                    }
                    channel.close().unwrap();
                },
                criterion::BatchSize::PerIteration,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, append_benchmarks);
criterion_main!(benches);
