//! Batched, time-limited forecasting

use super::config::InferenceConfig;
use super::output::ForecastOutput;
use crate::budget::{BudgetedExt, Deadline};
use crate::data::{InferenceDataset, SeriesCollection, DEFAULT_TARGET};
use crate::error::{ForecastError, Result};
use crate::model::ForecastModel;
use ndarray::{concatenate, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::debug;

/// Inference statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceStats {
    pub total_series: u64,
    pub total_batches: u64,
    pub error_count: u64,
    pub deadline_exceeded_count: u64,
    pub last_latency_ms: f64,
}

#[derive(Debug, Default)]
struct Counters {
    series: AtomicU64,
    batches: AtomicU64,
    errors: AtomicU64,
    deadlines: AtomicU64,
    /// f64 bits of the last call's latency
    last_latency_bits: AtomicU64,
}

/// Runs a [`ForecastModel`] over a collection, batch by batch
#[derive(Debug)]
pub struct InferenceEngine {
    config: InferenceConfig,
    counters: Counters,
}

impl InferenceEngine {
    pub fn new(config: InferenceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.with_capped_context_length(),
            counters: Counters::default(),
        })
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_series: self.counters.series.load(Ordering::Relaxed),
            total_batches: self.counters.batches.load(Ordering::Relaxed),
            error_count: self.counters.errors.load(Ordering::Relaxed),
            deadline_exceeded_count: self.counters.deadlines.load(Ordering::Relaxed),
            last_latency_ms: f64::from_bits(self.counters.last_latency_bits.load(Ordering::Relaxed)),
        }
    }

    /// Context length this engine would use for `data`
    pub fn context_length_for(&self, data: &SeriesCollection) -> usize {
        self.config.resolve_context_length(data.max_len())
    }

    /// Forecast every series, using the configured time limit
    pub fn predict<M: ForecastModel + ?Sized>(
        &self,
        model: &M,
        data: &SeriesCollection,
        prediction_length: usize,
    ) -> Result<ForecastOutput> {
        let deadline = Deadline::new(self.config.time_limit_secs)?;
        self.predict_with_deadline(model, data, prediction_length, deadline)
    }

    /// Forecast every series under an explicit deadline.
    ///
    /// An overrun discards all batches computed so far.
    pub fn predict_with_deadline<M: ForecastModel + ?Sized>(
        &self,
        model: &M,
        data: &SeriesCollection,
        prediction_length: usize,
        deadline: Deadline,
    ) -> Result<ForecastOutput> {
        let start = Instant::now();
        let result = self.run(model, data, prediction_length, deadline);

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.counters
            .last_latency_bits
            .store(latency_ms.to_bits(), Ordering::Relaxed);
        match &result {
            Ok(output) => {
                self.counters
                    .series
                    .fetch_add(output.num_items() as u64, Ordering::Relaxed);
            }
            Err(e) if e.is_deadline_exceeded() => {
                self.counters.deadlines.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    fn run<M: ForecastModel + ?Sized>(
        &self,
        model: &M,
        data: &SeriesCollection,
        prediction_length: usize,
        deadline: Deadline,
    ) -> Result<ForecastOutput> {
        if prediction_length == 0 {
            return Err(ForecastError::InvalidConfiguration(
                "prediction_length must be positive".to_string(),
            ));
        }
        let levels = &self.config.quantile_levels;
        let context_length = self.context_length_for(data);
        let dataset = InferenceDataset::new(data, DEFAULT_TARGET, context_length)?;
        debug!(
            series = dataset.len(),
            context_length,
            batch_size = self.config.resolved_batch_size(),
            "Starting batched forecast"
        );

        let mut means: Vec<Array2<f32>> = Vec::new();
        let mut quantiles: Vec<Array3<f32>> = Vec::new();

        for batch in dataset.batches(self.config.resolved_batch_size())?.budgeted(deadline) {
            let batch = batch?;
            let rows = batch.nrows();
            let forecast = model.predict_quantiles(batch.view(), prediction_length, levels)?;

            let expected = (rows, prediction_length, levels.len());
            if forecast.quantiles.dim() != expected || forecast.mean.dim() != (rows, prediction_length) {
                return Err(ForecastError::ShapeError {
                    expected: format!("{:?}", expected),
                    actual: format!("{:?}", forecast.quantiles.dim()),
                });
            }
            self.counters.batches.fetch_add(1, Ordering::Relaxed);
            means.push(forecast.mean);
            quantiles.push(forecast.quantiles);
        }

        let mean = if means.is_empty() {
            Array2::zeros((0, prediction_length))
        } else {
            let views: Vec<_> = means.iter().map(|m| m.view()).collect();
            concatenate(Axis(0), &views)?
        };
        let quantiles = if quantiles.is_empty() {
            Array3::zeros((0, prediction_length, levels.len()))
        } else {
            let views: Vec<_> = quantiles.iter().map(|q| q.view()).collect();
            concatenate(Axis(0), &views)?
        };

        ForecastOutput::new(data.item_ids(), levels.clone(), mean, quantiles)
    }
}
