//! Benchmarks for the Galgo ingestion pipeline.
//!
//! Run with: cargo bench -p galgo-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use galgo_core::config::ThumbnailConfig;
use galgo_core::pipeline::{PerceptualHasher, ThumbnailGenerator, TypeSniffer};
use image::{DynamicImage, Rgb, RgbImage};

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8])
    }))
}

fn benchmark_perceptual_hash(c: &mut Criterion) {
    let hasher = PerceptualHasher::new();
    let img = gradient(1024, 768);

    c.bench_function("perceptual_identity", |b| {
        b.iter(|| hasher.identity(black_box(&img)))
    });
}

fn benchmark_thumbnail(c: &mut Criterion) {
    let img = gradient(1920, 1080);
    let generator = ThumbnailGenerator::new(ThumbnailConfig::default(), 30_000);

    c.bench_function("thumbnail_render_256", |b| {
        b.iter(|| generator.render(black_box(&img)))
    });
    c.bench_function("thumbnail_generate_webp_256", |b| {
        b.iter(|| generator.generate(black_box(&img)))
    });
}

fn benchmark_sniff(c: &mut Criterion) {
    let mut mp4 = b"\0\0\0\x20ftypisom\0\0\x02\0".to_vec();
    mp4.resize(TypeSniffer::HEADER_LEN, 0);
    let text = vec![b'a'; TypeSniffer::HEADER_LEN];

    c.bench_function("sniff_mp4", |b| b.iter(|| TypeSniffer::sniff(black_box(&mp4))));
    c.bench_function("sniff_unsupported", |b| {
        b.iter(|| TypeSniffer::sniff(black_box(&text)))
    });
}

criterion_group!(
    benches,
    benchmark_perceptual_hash,
    benchmark_thumbnail,
    benchmark_sniff
);
criterion_main!(benches);
