//! Canvas benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mediafy::{Canvas, Coords, Environment, ImageSource, MediafyConfig};
use web_apis::SyntheticCamera;

fn env() -> Environment {
    Environment::new(MediafyConfig::default()).expect("default config is valid")
}

/// Benchmark drawing a camera-sized frame onto a canvas.
fn bench_put_image(c: &mut Criterion) {
    let env = env();
    let frame = SyntheticCamera::render(640, 480, 0);
    let target = Canvas::new(&env, (640, 480)).expect("canvas");

    let mut group = c.benchmark_group("put_image");

    group.bench_function("same_size", |b| {
        let source = ImageSource::Bitmap(frame.clone());
        b.iter(|| {
            target.put_image(black_box(source.clone()), None).expect("draw");
        })
    });

    for scale in [0.5, 0.25] {
        group.bench_with_input(BenchmarkId::new("scaled", scale), &scale, |b, &scale| {
            let source = ImageSource::Bitmap(frame.clone());
            let mut coords = Coords::new(0.0, 0.0, 640.0, 480.0);
            coords.scale(scale);
            b.iter(|| {
                target.put_image(black_box(source.clone()), Some(coords)).expect("draw");
            })
        });
    }

    group.finish();
}

/// Benchmark reading pixels back and encoding.
fn bench_readback(c: &mut Criterion) {
    let env = env();
    let canvas = Canvas::new(&env, (320, 240)).expect("canvas");
    canvas
        .put_image(SyntheticCamera::render(320, 240, 3), None)
        .expect("draw");

    let mut group = c.benchmark_group("readback");

    group.bench_function("get_image_data", |b| {
        b.iter(|| black_box(canvas.get_image_data(None).expect("read")))
    });

    group.bench_function("to_data_url_png", |b| {
        b.iter(|| black_box(canvas.to_data_url("image/png").expect("encode")))
    });

    group.bench_function("clear", |b| {
        b.iter(|| {
            canvas.clear(black_box(None)).expect("clear");
        })
    });

    group.finish();
}

criterion_group!(benches, bench_put_image, bench_readback);
criterion_main!(benches);
