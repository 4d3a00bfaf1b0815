//! Criterion benchmarks for the NLM stages.
//!
//! Run with: cargo bench -p nlmeans_core
//! Run specific: cargo bench -p nlmeans_core -- box_filter

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::{Array2, Array3};
use rand::prelude::*;

use nlmeans_core::{
    compute_distance, denoise_packed, BoxFilter, NlmConfig, Offset, PackedFrames, ReferenceSpace,
    WeightKernel, WeightingFunction,
};

// =============================================================================
// Helper Functions for Test Data Generation
// =============================================================================

fn random_image_f32(rows: usize, cols: usize, channels: usize, seed: u64) -> Array3<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array3::from_shape_fn((rows, cols, channels), |_| rng.gen())
}

fn random_stack_f32(
    rows: usize,
    cols: usize,
    frames: usize,
    space: ReferenceSpace,
    seed: u64,
) -> PackedFrames<f32> {
    let images: Vec<_> = (0..frames)
        .map(|t| random_image_f32(rows, cols, space.channels(), seed + t as u64))
        .collect();
    PackedFrames::from_images(&images, space).expect("valid benchmark stack")
}

// =============================================================================
// Distance Benchmarks
// =============================================================================

fn bench_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance");

    for space in [ReferenceSpace::Luma, ReferenceSpace::Yuv, ReferenceSpace::Rgb] {
        let stack = random_stack_f32(256, 256, 1, space, 42);
        let mut out = Array2::zeros((256, 256));
        group.throughput(Throughput::Elements(256 * 256));
        group.bench_with_input(
            BenchmarkId::new("space", format!("{:?}", space)),
            &space,
            |b, _| b.iter(|| compute_distance(black_box(&stack), 0, Offset::spatial(2, -1), &mut out)),
        );
    }

    group.finish();
}

// =============================================================================
// Summation Benchmarks
// =============================================================================

fn bench_box_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("box_filter");
    let mut rng = StdRng::seed_from_u64(7);
    let input: Array2<f32> = Array2::from_shape_fn((512, 512), |_| rng.gen::<f32>() * 0.01);
    let mut partial = Array2::zeros((512, 512));
    let mut out = Array2::zeros((512, 512));

    group.throughput(Throughput::Elements(512 * 512));
    for radius in [1, 2, 4, 8] {
        let kernel = WeightKernel::new(WeightingFunction::Welsch, 1.2f32, radius);
        let filter = BoxFilter::new(radius, kernel);

        group.bench_with_input(BenchmarkId::new("horizontal", radius), &radius, |b, _| {
            b.iter(|| filter.horizontal(black_box(input.view()), &mut partial))
        });
        group.bench_with_input(BenchmarkId::new("vertical", radius), &radius, |b, _| {
            b.iter(|| filter.vertical(black_box(input.view()), &mut out))
        });
    }

    group.finish();
}

// =============================================================================
// Full Pass Benchmarks
// =============================================================================

fn bench_full_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_pass");
    group.sample_size(10);

    let spatial = random_stack_f32(128, 128, 1, ReferenceSpace::Luma, 1);
    let spatial_config = NlmConfig::<f32> {
        temporal_radius: 0,
        ..NlmConfig::default()
    };
    group.bench_function("luma_128_d0", |b| {
        b.iter(|| denoise_packed(black_box(&spatial), None, &spatial_config))
    });

    let temporal = random_stack_f32(128, 128, 3, ReferenceSpace::Yuv, 2);
    let temporal_config = NlmConfig::<f32>::default();
    group.bench_function("yuv_128_d1", |b| {
        b.iter(|| denoise_packed(black_box(&temporal), None, &temporal_config))
    });

    group.finish();
}

// =============================================================================
// Criterion Configuration
// =============================================================================

criterion_group!(benches, bench_distance, bench_box_filter, bench_full_pass);

criterion_main!(benches);
