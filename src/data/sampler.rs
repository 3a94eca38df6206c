//! Window sampling
//!
//! Turns a ragged index into (context, future) windows. Training mode
//! cycles the series forever and draws random split points; validation mode
//! takes the trailing window of every series exactly once.

use crate::error::{ForecastError, Result};
use super::ragged::{left_pad, RaggedSeriesIndex};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::iter::FusedIterator;
use std::str::FromStr;
use std::sync::Arc;

/// How windows are drawn from each series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerMode {
    /// Random split points over an endless pass through the series
    Training,
    /// The last window of each series, once, in input order
    Validation,
}

impl fmt::Display for SamplerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplerMode::Training => write!(f, "training"),
            SamplerMode::Validation => write!(f, "validation"),
        }
    }
}

impl FromStr for SamplerMode {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "training" => Ok(SamplerMode::Training),
            "validation" => Ok(SamplerMode::Validation),
            other => Err(ForecastError::InvalidConfiguration(format!(
                "unknown sampler mode '{}', expected 'training' or 'validation'",
                other
            ))),
        }
    }
}

/// A (context, future) pair cut from one series at `forecast_start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    /// Position of the source series in the input collection
    pub item_index: usize,
    /// Offset of the first future observation within the series
    pub forecast_start: usize,
    /// Past observations, left-padded with NaN to the context length
    pub context: Vec<f32>,
    pub context_is_pad: Vec<bool>,
    /// Future observations, right-padded with NaN to the prediction length
    pub future: Vec<f32>,
    pub future_is_pad: Vec<bool>,
}

impl Window {
    /// Number of padded context positions
    pub fn context_padding(&self) -> usize {
        self.context_is_pad.iter().filter(|&&p| p).count()
    }

    /// Whether any future position is padding
    pub fn has_future_padding(&self) -> bool {
        self.future_is_pad.iter().any(|&p| p)
    }
}

/// Draws each candidate split point independently so that, on average,
/// `num_instances` windows come out of every series.
///
/// The acceptance probability is `num_instances` divided by the running
/// mean number of candidates per series seen so far.
#[derive(Debug, Clone)]
pub struct ExpectedNumInstanceSampler {
    num_instances: f64,
    min_future: usize,
    total_candidates: usize,
    series_seen: usize,
}

impl ExpectedNumInstanceSampler {
    pub fn new(num_instances: f64, min_future: usize) -> Self {
        Self {
            num_instances,
            min_future,
            total_candidates: 0,
            series_seen: 0,
        }
    }

    /// Number of valid split points for a series of `series_len`
    pub fn num_candidates(&self, series_len: usize) -> usize {
        // splits live in [0, series_len - min_future]
        (series_len + 1).saturating_sub(self.min_future)
    }

    /// Split points for one series, in increasing order
    pub fn sample<R: Rng + ?Sized>(&mut self, series_len: usize, rng: &mut R) -> Vec<usize> {
        let candidates = self.num_candidates(series_len);
        if candidates == 0 {
            return Vec::new();
        }

        self.series_seen += 1;
        self.total_candidates += candidates;
        let mean_candidates = self.total_candidates as f64 / self.series_seen as f64;
        let p = self.num_instances / mean_candidates;

        (0..candidates).filter(|_| rng.gen::<f64>() < p).collect()
    }
}

/// Picks the split leaving `min_future` observations for the future window.
///
/// Series shorter than `min_future` split at 0, so every series still
/// produces a window.
#[derive(Debug, Clone, Copy)]
pub struct ValidationSplitSampler {
    min_future: usize,
}

impl ValidationSplitSampler {
    pub fn new(min_future: usize) -> Self {
        Self { min_future }
    }

    pub fn split_point(&self, series_len: usize) -> usize {
        series_len.saturating_sub(self.min_future)
    }
}

/// Cuts fixed-shape windows out of a series at a given split point
#[derive(Debug, Clone, Copy)]
pub struct InstanceSplitter {
    past_length: usize,
    future_length: usize,
}

impl InstanceSplitter {
    pub fn new(past_length: usize, future_length: usize) -> Self {
        Self {
            past_length,
            future_length,
        }
    }

    pub fn split(&self, series: &[f32], split: usize, item_index: usize) -> Window {
        let split = split.min(series.len());

        let past = &series[split.saturating_sub(self.past_length)..split];
        let context_pad = self.past_length - past.len();
        let context = left_pad(past, self.past_length);
        let mut context_is_pad = vec![true; context_pad];
        context_is_pad.resize(self.past_length, false);

        let future_end = (split + self.future_length).min(series.len());
        let mut future = series[split..future_end].to_vec();
        let observed = future.len();
        future.resize(self.future_length, f32::NAN);
        let mut future_is_pad = vec![false; observed];
        future_is_pad.resize(self.future_length, true);

        Window {
            item_index,
            forecast_start: split,
            context,
            context_is_pad,
            future,
            future_is_pad,
        }
    }
}

/// Produces windows from a ragged index in one of two modes
#[derive(Debug, Clone)]
pub struct WindowSampler {
    index: Arc<RaggedSeriesIndex>,
    context_length: usize,
    prediction_length: usize,
    mode: SamplerMode,
    seed: Option<u64>,
}

impl WindowSampler {
    /// Validate lengths and, in training mode, that at least one series is
    /// long enough to yield a split with a full future window.
    pub fn new(
        index: Arc<RaggedSeriesIndex>,
        context_length: usize,
        prediction_length: usize,
        mode: SamplerMode,
    ) -> Result<Self> {
        if context_length == 0 {
            return Err(ForecastError::InvalidConfiguration(
                "context_length must be positive".to_string(),
            ));
        }
        if prediction_length == 0 {
            return Err(ForecastError::InvalidConfiguration(
                "prediction_length must be positive".to_string(),
            ));
        }

        if mode == SamplerMode::Training {
            let eligible = (0..index.len())
                .filter(|&i| index.series_at(i).len() >= prediction_length)
                .count();
            if eligible == 0 {
                return Err(ForecastError::DataError(format!(
                    "no series has at least prediction_length={} observations to train on",
                    prediction_length
                )));
            }
            if eligible < index.len() {
                tracing::debug!(
                    skipped = index.len() - eligible,
                    prediction_length,
                    "Series too short for training windows are skipped"
                );
            }
        }

        Ok(Self {
            index,
            context_length,
            prediction_length,
            mode,
            seed: None,
        })
    }

    /// Seed the split-point generator for reproducible training windows
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn mode(&self) -> SamplerMode {
        self.mode
    }

    pub fn context_length(&self) -> usize {
        self.context_length
    }

    pub fn prediction_length(&self) -> usize {
        self.prediction_length
    }

    fn splitter(&self) -> InstanceSplitter {
        InstanceSplitter::new(self.context_length, self.prediction_length)
    }
}

impl IntoIterator for WindowSampler {
    type Item = Window;
    type IntoIter = Windows;

    fn into_iter(self) -> Windows {
        let splitter = self.splitter();
        match self.mode {
            SamplerMode::Training => {
                let rng = match self.seed {
                    Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
                    None => Xoshiro256PlusPlus::from_entropy(),
                };
                Windows::Training(TrainingWindows {
                    sampler: ExpectedNumInstanceSampler::new(1.0, self.prediction_length),
                    index: self.index,
                    splitter,
                    rng,
                    cursor: 0,
                    pending: VecDeque::new(),
                })
            }
            SamplerMode::Validation => Windows::Validation(ValidationWindows {
                sampler: ValidationSplitSampler::new(self.prediction_length),
                index: self.index,
                splitter,
                cursor: 0,
            }),
        }
    }
}

/// Window stream of either mode
#[derive(Debug)]
pub enum Windows {
    Training(TrainingWindows),
    Validation(ValidationWindows),
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        match self {
            Windows::Training(inner) => inner.next(),
            Windows::Validation(inner) => inner.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Windows::Training(inner) => inner.size_hint(),
            Windows::Validation(inner) => inner.size_hint(),
        }
    }
}

/// Endless stream of randomly placed training windows
#[derive(Debug)]
pub struct TrainingWindows {
    index: Arc<RaggedSeriesIndex>,
    splitter: InstanceSplitter,
    sampler: ExpectedNumInstanceSampler,
    rng: Xoshiro256PlusPlus,
    cursor: usize,
    pending: VecDeque<Window>,
}

impl Iterator for TrainingWindows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        loop {
            if let Some(window) = self.pending.pop_front() {
                return Some(window);
            }

            let item_index = self.cursor;
            self.cursor += 1;
            if self.cursor == self.index.len() {
                self.cursor = 0;
            }

            let series = self.index.series_at(item_index);
            for split in self.sampler.sample(series.len(), &mut self.rng) {
                self.pending.push_back(self.splitter.split(series, split, item_index));
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

impl FusedIterator for TrainingWindows {}

/// One trailing window per series, in input order
#[derive(Debug)]
pub struct ValidationWindows {
    index: Arc<RaggedSeriesIndex>,
    splitter: InstanceSplitter,
    sampler: ValidationSplitSampler,
    cursor: usize,
}

impl Iterator for ValidationWindows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.cursor >= self.index.len() {
            return None;
        }
        let item_index = self.cursor;
        self.cursor += 1;

        let series = self.index.series_at(item_index);
        let split = self.sampler.split_point(series.len());
        Some(self.splitter.split(series, split, item_index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.index.len() - self.cursor;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ValidationWindows {}

impl FusedIterator for ValidationWindows {}
