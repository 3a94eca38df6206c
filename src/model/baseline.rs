//! Random-walk reference model
//!
//! Forecasts the last observed value plus a learned level offset, with
//! quantiles from the empirical distribution of one-step differences
//! widened by the square root of the horizon. Used by the CLI and as a
//! stand-in wherever a real pretrained model is not needed.

use crate::data::TrainingBatch;
use crate::error::{ForecastError, Result};
use super::{FineTunableModel, ForecastModel, QuantileForecast};
use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Weights of [`NaiveQuantileModel`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NaiveCheckpoint {
    pub bias: f32,
}

/// Random-walk forecaster with a single trainable offset
#[derive(Debug, Clone, Default)]
pub struct NaiveQuantileModel {
    bias: f32,
    max_prediction_length: Option<usize>,
}

impl NaiveQuantileModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the horizon accepted for fine-tuning
    pub fn with_max_prediction_length(mut self, length: usize) -> Self {
        self.max_prediction_length = Some(length);
        self
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }

    fn level(&self, context: ArrayView1<'_, f32>) -> f32 {
        let last = context.iter().rev().find(|v| !v.is_nan()).copied().unwrap_or(0.0);
        last + self.bias
    }

    /// Mean absolute error and the mean sign of the residuals
    fn residual_stats(&self, context: &Array2<f32>, target: &Array2<f32>) -> (f32, f32) {
        let mut abs_sum = 0.0f64;
        let mut sign_sum = 0.0f64;
        let mut count = 0usize;

        for (ctx, tgt) in context.axis_iter(Axis(0)).zip(target.axis_iter(Axis(0))) {
            let level = self.level(ctx);
            for &y in tgt.iter().filter(|y| !y.is_nan()) {
                let err = (y - level) as f64;
                abs_sum += err.abs();
                sign_sum += if err > 0.0 {
                    1.0
                } else if err < 0.0 {
                    -1.0
                } else {
                    0.0
                };
                count += 1;
            }
        }

        if count == 0 {
            return (0.0, 0.0);
        }
        ((abs_sum / count as f64) as f32, (sign_sum / count as f64) as f32)
    }
}

/// Linear-interpolated empirical quantile of sorted values
fn empirical_quantile(sorted: &[f32], q: f64) -> f32 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = (pos - lo as f64) as f32;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

impl ForecastModel for NaiveQuantileModel {
    fn predict_quantiles(
        &self,
        context: ArrayView2<'_, f32>,
        prediction_length: usize,
        quantile_levels: &[f64],
    ) -> Result<QuantileForecast> {
        if let Some(&bad) = quantile_levels.iter().find(|q| !(0.0..=1.0).contains(*q)) {
            return Err(ForecastError::InvalidConfiguration(format!(
                "quantile level {} outside [0, 1]",
                bad
            )));
        }

        let batch = context.nrows();
        let mut mean = Array2::zeros((batch, prediction_length));
        let mut quantiles = Array3::zeros((batch, prediction_length, quantile_levels.len()));

        for (row, ctx) in context.axis_iter(Axis(0)).enumerate() {
            let level = self.level(ctx);
            let observed: Vec<f32> = ctx.iter().copied().filter(|v| !v.is_nan()).collect();
            let mut diffs: Vec<f32> = observed.windows(2).map(|w| w[1] - w[0]).collect();
            diffs.sort_by(|a, b| a.total_cmp(b));
            let offsets: Vec<f32> = quantile_levels
                .iter()
                .map(|&q| empirical_quantile(&diffs, q))
                .collect();

            for h in 0..prediction_length {
                mean[[row, h]] = level;
                let widen = ((h + 1) as f32).sqrt();
                for (k, offset) in offsets.iter().enumerate() {
                    quantiles[[row, h, k]] = level + offset * widen;
                }
            }
        }

        Ok(QuantileForecast { quantiles, mean })
    }

    fn max_prediction_length(&self) -> Option<usize> {
        self.max_prediction_length
    }
}

impl FineTunableModel for NaiveQuantileModel {
    type Checkpoint = NaiveCheckpoint;

    fn fit_step(&mut self, batch: &TrainingBatch, learning_rate: f64) -> Result<f32> {
        let TrainingBatch::Raw { context, target } = batch else {
            return Err(ForecastError::ModelError(
                "naive model trains on raw windows only".to_string(),
            ));
        };
        let (loss, mean_sign) = self.residual_stats(context, target);
        // subgradient step on the mean absolute error
        self.bias += (learning_rate as f32) * mean_sign;
        Ok(loss)
    }

    fn eval_loss(&self, batch: &TrainingBatch) -> Result<f32> {
        let TrainingBatch::Raw { context, target } = batch else {
            return Err(ForecastError::ModelError(
                "naive model evaluates raw windows only".to_string(),
            ));
        };
        Ok(self.residual_stats(context, target).0)
    }

    fn checkpoint(&self) -> NaiveCheckpoint {
        NaiveCheckpoint { bias: self.bias }
    }

    fn restore(&mut self, checkpoint: NaiveCheckpoint) {
        self.bias = checkpoint.bias;
    }
}
