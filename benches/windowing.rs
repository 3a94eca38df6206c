use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kolosal_forecast::data::{RaggedSeriesIndex, ReservoirShuffle, SamplerMode, WindowSampler};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::Arc;

fn create_ragged_index(n_series: usize, max_len: usize) -> RaggedSeriesIndex {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);

    let series: Vec<Vec<f32>> = (0..n_series)
        .map(|_| {
            let len = rng.gen_range(1..=max_len);
            (0..len).map(|_| rng.gen::<f32>() * 10.0).collect()
        })
        .collect();

    RaggedSeriesIndex::from_series(&series)
}

fn bench_last_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("last_window");
    let index = create_ragged_index(10_000, 1024);

    for width in [64, 512, 2048].iter() {
        group.bench_with_input(BenchmarkId::new("extract", width), width, |b, &width| {
            b.iter(|| {
                for i in 0..index.len() {
                    black_box(index.extract_last_window(i, width).unwrap());
                }
            })
        });
    }

    group.finish();
}

fn bench_training_windows(c: &mut Criterion) {
    let mut group = c.benchmark_group("training_windows");
    let index = Arc::new(create_ragged_index(1_000, 512));

    for buffer in [0i64, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("shuffled", buffer), buffer, |b, &buffer| {
            b.iter(|| {
                let sampler = WindowSampler::new(index.clone(), 128, 16, SamplerMode::Training)
                    .unwrap()
                    .with_seed(7);
                let shuffled =
                    ReservoirShuffle::from_buffer_size(sampler.into_iter(), Some(buffer), Some(8)).unwrap();
                for window in shuffled.take(5_000) {
                    black_box(window);
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_last_window, bench_training_windows);
criterion_main!(benches);
