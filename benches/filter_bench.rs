//! Benchmarks for filter presets and the 4K enhance pipeline.
//!
//! Measures per-preset cost on a typical preview-sized image and the
//! unsharp passes used after upscaling.
//!
//! Run with: `cargo bench --bench filter_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgba, RgbaImage};
use slidekit::upscale::UnsharpMask;
use slidekit::FilterPreset;

/// Gradient swatch roughly the size of a phone preview.
fn swatch(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    })
}

fn bench_presets(c: &mut Criterion) {
    let source = swatch(650, 650);
    let mut group = c.benchmark_group("filter_preset");
    for preset in FilterPreset::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(preset.name()), &preset, |b, preset| {
            b.iter(|| {
                let mut image = source.clone();
                preset.apply(black_box(&mut image));
                image
            });
        });
    }
    group.finish();
}

fn bench_unsharp(c: &mut Criterion) {
    let source = swatch(1280, 720);
    c.bench_function("unsharp_coarse_720p", |b| {
        b.iter(|| UnsharpMask::COARSE.apply(black_box(&source)));
    });
    c.bench_function("unsharp_fine_720p", |b| {
        b.iter(|| UnsharpMask::FINE.apply(black_box(&source)));
    });
}

criterion_group!(benches, bench_presets, bench_unsharp);
criterion_main!(benches);
