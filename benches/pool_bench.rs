use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use framebind::buffers::{BufferPoolManager, CacheMode, PoolConfig};
use std::time::Duration;

fn manager() -> BufferPoolManager {
    BufferPoolManager::new(256 * 1024 * 1024, Duration::from_millis(10))
}

fn benchmark_get_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("BlockPool_GetRelease");

    for block_size in [4096, 65536, 1382400].iter() {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("fixed", block_size),
            block_size,
            |b, &block_size| {
                let manager = manager();
                let pool_id = manager
                    .create_pool(PoolConfig::new("bench").with_fixed_size(block_size).with_block_count(8))
                    .unwrap();

                b.iter(|| {
                    let buffer = manager.get_block(pool_id, block_size, false).unwrap();
                    black_box(buffer.handle());
                    manager.release_block(buffer).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn benchmark_drain_and_refill(c: &mut Criterion) {
    let mut group = c.benchmark_group("BlockPool_DrainRefill");

    for block_count in [8, 32, 128].iter() {
        group.throughput(Throughput::Elements(*block_count as u64));
        group.bench_with_input(
            BenchmarkId::new("take_all", block_count),
            block_count,
            |b, &block_count| {
                let manager = manager();
                let pool_id = manager
                    .create_pool(PoolConfig::new("drain").with_max_size(4096).with_block_count(block_count))
                    .unwrap();

                b.iter(|| {
                    // Take every block, then hand them all back
                    let held: Vec<_> = (0..block_count)
                        .map(|i| manager.get_block(pool_id, 64 + i, false).unwrap())
                        .collect();
                    drop(black_box(held));
                });
            },
        );
    }

    group.finish();
}

fn benchmark_cache_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("BlockPool_CacheFlush");

    for cache_mode in [CacheMode::Coherent, CacheMode::Cached].iter() {
        group.bench_with_input(
            BenchmarkId::new("write_flush", format!("{:?}", cache_mode)),
            cache_mode,
            |b, &cache_mode| {
                let manager = manager();
                let pool_id = manager
                    .create_pool(
                        PoolConfig::new("flush")
                            .with_fixed_size(4096)
                            .with_block_count(2)
                            .with_cache_mode(cache_mode),
                    )
                    .unwrap();
                let mut buffer = manager.get_block(pool_id, 4096, false).unwrap();

                b.iter(|| {
                    buffer.fill(0xAB).unwrap();
                    manager.flush_cache(&buffer, true).unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_get_release,
    benchmark_drain_and_refill,
    benchmark_cache_flush
);
criterion_main!(benches);
