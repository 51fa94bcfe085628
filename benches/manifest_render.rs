//! Benchmarks for manifest rendering and parsing
//!
//! Rendering happens once per manifest cache miss; the parser is what
//! clients and tests run over the result.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use skipsplice_media::{parse_media_playlist, ManifestBuilder};

const URL: &str = "https://media.example.com/show/s01e01.mkv";
const TOTAL: u64 = 700 * 1024 * 1024;

fn bench_render(c: &mut Criterion) {
    let builder = ManifestBuilder::default();
    let mut group = c.benchmark_group("render");

    group.bench_function("spliced", |b| {
        b.iter(|| {
            builder.spliced(
                black_box(URL),
                Some(1420.0),
                black_box(41_943_040),
                black_box(71_303_168),
                Some(TOTAL),
            )
        })
    });

    group.bench_function("single_skip", |b| {
        b.iter(|| builder.simple(black_box(URL), Some(1420.0), black_box(71_303_168), Some(TOTAL)))
    });

    group.bench_function("unknown_length", |b| {
        b.iter(|| builder.simple(black_box(URL), None, black_box(71_303_168), None))
    });

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let playlist = ManifestBuilder::default().spliced(URL, Some(1420.0), 41_943_040, 71_303_168, Some(TOTAL));

    c.bench_function("parse_spliced", |b| {
        b.iter(|| parse_media_playlist(black_box(&playlist)).unwrap())
    });
}

criterion_group!(benches, bench_render, bench_parse);
criterion_main!(benches);
