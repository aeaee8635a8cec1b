//! Benchmark for Subzone topology generation and validation.
//!
//! Run with: cargo bench --package delve_procedural --bench topology_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use delve_core::{BiomeTheme, ChunkId, GenerationSeed};
use delve_procedural::{TopologyGenerator, TopologyParams, TopologyValidator};

fn params(theme: BiomeTheme, size: u32, seed: u64) -> TopologyParams {
    TopologyParams {
        chunk_id: ChunkId::new("world/r0/z0/s0"),
        theme,
        size_estimate: size,
        difficulty: 10,
        depth: 3,
        seed: GenerationSeed::new(seed),
    }
}

fn benchmark_generation(c: &mut Criterion) {
    let generator = TopologyGenerator::default();
    let mut group = c.benchmark_group("generate_subzone");

    for theme in [BiomeTheme::Fortress, BiomeTheme::Crypt, BiomeTheme::Caverns] {
        for size in [16_u32, 64, 120] {
            group.bench_with_input(
                BenchmarkId::new(theme.as_str(), size),
                &size,
                |b, &size| {
                    let mut seed = 0_u64;
                    b.iter(|| {
                        seed += 1;
                        black_box(generator.generate(&params(theme, size, seed)))
                    });
                },
            );
        }
    }
    group.finish();
}

fn benchmark_validation(c: &mut Criterion) {
    let nodes = TopologyGenerator::default()
        .generate(&params(BiomeTheme::Caverns, 120, 42))
        .unwrap();

    c.bench_function("validate_120_nodes", |b| {
        b.iter(|| black_box(TopologyValidator::validate(&nodes)));
    });
}

criterion_group!(benches, benchmark_generation, benchmark_validation);
criterion_main!(benches);
