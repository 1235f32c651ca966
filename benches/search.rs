#[path = "../util/util.rs"]
mod util;

use util::synthetic_images;

use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode};
use pngsqueeze::{
    codec::PngEncoder,
    kmeans::{self, KmeansOptions},
    quantize,
    search::{self, ParameterSet},
    Raster,
};

/// Each synthetic image reduced to 32 colors.
fn indexed_images() -> Vec<(String, Raster)> {
    synthetic_images()
        .iter()
        .map(|(name, image)| {
            let options = KmeansOptions::new().max_rounds(Some(10));
            let palette = kmeans::palette(image, options).unwrap().palette;
            (name.clone(), quantize::quantize(image, &palette).unwrap().indexed)
        })
        .collect()
}

fn search_curated(c: &mut Criterion) {
    let images = indexed_images();
    let candidates = ParameterSet::Curated.candidates();

    let mut group = c.benchmark_group("search_curated");
    group
        .sample_size(10)
        .noise_threshold(0.05)
        .sampling_mode(SamplingMode::Flat)
        .warm_up_time(Duration::from_millis(500))
        .measurement_time(Duration::from_secs(5));

    for (name, image) in &images {
        group.bench_with_input(BenchmarkId::new("single", name), image, |b, image| {
            b.iter(|| search::search(image, &candidates, &PngEncoder).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("par", name), image, |b, image| {
            b.iter(|| search::search_par(image, &candidates, &PngEncoder).unwrap())
        });
    }
}

criterion_group!(benches, search_curated);
criterion_main!(benches);
