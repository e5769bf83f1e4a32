//! Benchmarks for dimension planning and compression.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{DynamicImage, Rgb, RgbImage};
use slimsnap_core::Tier;
use slimsnap_image::{compress, detect_format, encode_image, plan_dimensions, CompressionSettings, ImageFormat};

fn bench_format_detection(c: &mut Criterion) {
    let jpeg_data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

    c.bench_function("detect_jpeg", |b| {
        b.iter(|| detect_format(black_box(&jpeg_data)))
    });
}

fn bench_plan(c: &mut Criterion) {
    c.bench_function("plan_dimensions", |b| {
        b.iter(|| {
            plan_dimensions(
                black_box(4000),
                black_box(3000),
                black_box(Tier::Free),
                black_box(1600),
                black_box(900),
            )
        })
    });
}

fn bench_compress(c: &mut Criterion) {
    let img = RgbImage::from_fn(640, 480, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8]));
    let original = encode_image("bench", &DynamicImage::ImageRgb8(img), ImageFormat::Jpeg, 95)
        .expect("fixture encodes");
    let settings = CompressionSettings::with_quality(60);

    c.bench_function("compress_640x480_q60", |b| {
        b.iter(|| compress("bench", black_box(&original), "image/jpeg", &settings, Tier::Free))
    });
}

criterion_group!(benches, bench_format_detection, bench_plan, bench_compress);
criterion_main!(benches);
