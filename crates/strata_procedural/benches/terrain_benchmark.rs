//! Benchmark for full chunk generation.
//!
//! Run with: cargo bench --package strata_procedural --bench terrain_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use strata_procedural::{ChunkCoord, ChunkDims, HeightFieldGenerator, VoxelGrid, WorldParams};

fn benchmark_single_chunk(c: &mut Criterion) {
    let mut generator = HeightFieldGenerator::new(WorldParams::with_seed(42));
    let mut grid = VoxelGrid::new(ChunkDims::default());

    c.bench_function("single_chunk_generation", |b| {
        let mut coord = 0i32;
        b.iter(|| {
            coord = coord.wrapping_add(1);
            black_box(generator.generate(&mut grid, ChunkCoord::new(coord, coord / 2)))
        });
    });
}

fn benchmark_cached_climate(c: &mut Criterion) {
    let mut generator = HeightFieldGenerator::new(WorldParams::with_seed(42));
    let mut grid = VoxelGrid::new(ChunkDims::default());

    // Same chunk over and over: climate batch comes from the cache
    c.bench_function("regenerate_same_chunk", |b| {
        b.iter(|| black_box(generator.generate(&mut grid, ChunkCoord::new(0, 0))));
    });
}

fn benchmark_view_ring(c: &mut Criterion) {
    let mut group = c.benchmark_group("view_ring");
    group.sample_size(10);
    // Radius-2 load ring
    group.throughput(Throughput::Elements(25));
    group.bench_function("5x5_chunks", |b| {
        b.iter(|| {
            let mut generator = HeightFieldGenerator::new(WorldParams::with_seed(42));
            let mut grid = VoxelGrid::new(ChunkDims::default());
            for z in -2..=2 {
                for x in -2..=2 {
                    black_box(generator.generate(&mut grid, ChunkCoord::new(x, z)));
                }
            }
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_single_chunk,
    benchmark_cached_climate,
    benchmark_view_ring
);
criterion_main!(benches);
