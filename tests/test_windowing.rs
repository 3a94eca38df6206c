//! Integration test: ragged index, window sampling and shuffling

use kolosal_forecast::data::{
    RaggedSeriesIndex, ReservoirShuffle, SamplerMode, SeriesCollection, Window, WindowSampler,
    DEFAULT_TARGET,
};
use kolosal_forecast::ForecastError;
use std::collections::HashMap;
use std::sync::Arc;

fn five_series() -> SeriesCollection {
    SeriesCollection::from_targets(vec![
        ("long", (0..30).map(|v| v as f32).collect::<Vec<_>>()),
        ("short", vec![1.0, 2.0]),
        ("medium", (0..12).map(|v| v as f32 * 10.0).collect::<Vec<_>>()),
        ("empty", Vec::new()),
        ("exact", vec![5.0, 6.0, 7.0, 8.0]),
    ])
    .unwrap()
}

fn index() -> Arc<RaggedSeriesIndex> {
    Arc::new(RaggedSeriesIndex::new(&five_series(), DEFAULT_TARGET).unwrap())
}

fn same(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| (x.is_nan() && y.is_nan()) || x == y)
}

// ============================================================================
// Ragged index
// ============================================================================

#[test]
fn test_last_window_examples() {
    let index = RaggedSeriesIndex::from_series(&[vec![1.0f32, 2.0, 3.0], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]]);

    let padded = index.extract_last_window(0, 5).unwrap();
    assert!(same(&padded, &[f32::NAN, f32::NAN, 1.0, 2.0, 3.0]));

    let tail = index.extract_last_window(1, 3).unwrap();
    assert_eq!(tail, vec![4.0, 5.0, 6.0]);
}

#[test]
fn test_last_window_tail_property() {
    let index = index();
    for i in 0..index.len() {
        let series = index.series(i).unwrap().to_vec();
        for width in 1..40 {
            let window = index.extract_last_window(i, width).unwrap();
            assert_eq!(window.len(), width);

            let real = series.len().min(width);
            let pad = width - real;
            assert!(window[..pad].iter().all(|v| v.is_nan()));
            assert_eq!(&window[pad..], &series[series.len() - real..]);
        }
    }
}

#[test]
fn test_offsets_are_cumulative() {
    let index = index();
    assert_eq!(index.offsets(), &[0, 30, 32, 44, 44, 48]);
    assert_eq!(index.values().len(), 48);
    assert!(matches!(
        index.extract_last_window(0, 0),
        Err(ForecastError::InvalidConfiguration(_))
    ));
}

// ============================================================================
// Window sampling
// ============================================================================

#[test]
fn test_validation_yields_one_window_per_series_in_order() {
    let windows: Vec<Window> = WindowSampler::new(index(), 6, 4, SamplerMode::Validation)
        .unwrap()
        .into_iter()
        .collect();

    assert_eq!(windows.len(), 5);
    let order: Vec<usize> = windows.iter().map(|w| w.item_index).collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);

    // "long": context 20..26, future 26..30
    assert_eq!(windows[0].context, vec![20.0, 21.0, 22.0, 23.0, 24.0, 25.0]);
    assert_eq!(windows[0].future, vec![26.0, 27.0, 28.0, 29.0]);
    assert!(!windows[0].has_future_padding());

    // "short" has fewer observations than the horizon: padded future
    assert!(windows[1].context.iter().all(|v| v.is_nan()));
    assert!(windows[1].has_future_padding());

    // "empty" is fully padded on both sides
    assert!(windows[3].context_is_pad.iter().all(|&p| p));
    assert!(windows[3].future_is_pad.iter().all(|&p| p));

    // "exact" is split at 0 with a full future
    assert_eq!(windows[4].future, vec![5.0, 6.0, 7.0, 8.0]);
    assert_eq!(windows[4].context_padding(), 6);
}

#[test]
fn test_training_skips_short_series() {
    let windows: Vec<Window> = WindowSampler::new(index(), 6, 4, SamplerMode::Training)
        .unwrap()
        .with_seed(17)
        .into_iter()
        .take(400)
        .collect();

    let mut per_item: HashMap<usize, usize> = HashMap::new();
    for window in &windows {
        *per_item.entry(window.item_index).or_default() += 1;
        assert_eq!(window.context.len(), 6);
        assert_eq!(window.future.len(), 4);
        assert!(!window.has_future_padding());
    }

    assert!(!per_item.contains_key(&1));
    assert!(!per_item.contains_key(&3));
    assert!(per_item.contains_key(&0));
    assert!(per_item.contains_key(&2));
}

#[test]
fn test_training_windows_are_real_slices() {
    let idx = index();
    let windows = WindowSampler::new(idx.clone(), 5, 3, SamplerMode::Training)
        .unwrap()
        .with_seed(3)
        .into_iter()
        .take(200);

    for window in windows {
        let series = idx.series(window.item_index).unwrap();
        let split = window.forecast_start;
        assert_eq!(&window.future[..], &series[split..split + 3]);

        let real = split.min(5);
        assert_eq!(&window.context[5 - real..], &series[split - real..split]);
    }
}

#[test]
fn test_training_is_reproducible_with_seed() {
    let take = |seed| -> Vec<(usize, usize)> {
        WindowSampler::new(index(), 6, 4, SamplerMode::Training)
            .unwrap()
            .with_seed(seed)
            .into_iter()
            .take(100)
            .map(|w| (w.item_index, w.forecast_start))
            .collect()
    };
    assert_eq!(take(9), take(9));
    assert_ne!(take(9), take(10));
}

#[test]
fn test_training_without_eligible_series_fails() {
    let collection = SeriesCollection::from_targets(vec![("a", vec![1.0]), ("b", vec![])]).unwrap();
    let index = Arc::new(RaggedSeriesIndex::new(&collection, DEFAULT_TARGET).unwrap());
    let result = WindowSampler::new(index.clone(), 4, 2, SamplerMode::Training);
    assert!(matches!(result, Err(ForecastError::DataError(_))));

    // validation still covers both
    let count = WindowSampler::new(index, 4, 2, SamplerMode::Validation)
        .unwrap()
        .into_iter()
        .count();
    assert_eq!(count, 2);
}

#[test]
fn test_non_positive_lengths_rejected() {
    assert!(matches!(
        WindowSampler::new(index(), 0, 4, SamplerMode::Validation),
        Err(ForecastError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        WindowSampler::new(index(), 4, 0, SamplerMode::Validation),
        Err(ForecastError::InvalidConfiguration(_))
    ));
}

// ============================================================================
// Shuffling
// ============================================================================

#[test]
fn test_shuffle_preserves_multiset() {
    for buffer in [1i64, 7, 64, 1000] {
        let mut out: Vec<u32> = ReservoirShuffle::from_buffer_size(0..500u32, Some(buffer), Some(5))
            .unwrap()
            .collect();
        assert_eq!(out.len(), 500);
        out.sort_unstable();
        assert_eq!(out, (0..500).collect::<Vec<_>>());
    }
}

#[test]
fn test_shuffle_disabled_is_identity() {
    let none: Vec<u32> = ReservoirShuffle::from_buffer_size(0..50u32, None, None).unwrap().collect();
    let zero: Vec<u32> = ReservoirShuffle::from_buffer_size(0..50u32, Some(0), None).unwrap().collect();
    assert_eq!(none, (0..50).collect::<Vec<_>>());
    assert_eq!(zero, none);
}

#[test]
fn test_shuffle_actually_reorders() {
    let out: Vec<u32> = ReservoirShuffle::from_buffer_size(0..200u32, Some(50), Some(1))
        .unwrap()
        .collect();
    assert_ne!(out, (0..200).collect::<Vec<_>>());
}

#[test]
fn test_negative_buffer_rejected() {
    assert!(matches!(
        ReservoirShuffle::from_buffer_size(0..3u32, Some(-1), None),
        Err(ForecastError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_shuffled_training_stream_is_unbounded() {
    let sampler = WindowSampler::new(index(), 6, 4, SamplerMode::Training)
        .unwrap()
        .with_seed(1);
    let shuffled = ReservoirShuffle::from_buffer_size(sampler.into_iter(), Some(32), Some(2)).unwrap();
    assert_eq!(shuffled.take(1_000).count(), 1_000);
}
