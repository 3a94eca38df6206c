//! Fine-tuning configuration

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for step-based fine-tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FineTuneConfig {
    /// Peak learning rate, decayed linearly to zero
    pub learning_rate: f64,

    /// Number of optimizer steps
    pub max_steps: usize,

    /// Examples per training batch; the inference batch size when absent
    pub batch_size: Option<usize>,

    /// Reservoir size for pseudo-shuffling; `None` or 0 disables it
    pub shuffle_buffer_size: Option<i64>,

    /// Evaluate on validation data while training
    pub eval_during_fine_tune: bool,

    /// Cap on validation series used for evaluation
    pub eval_max_items: Option<usize>,

    pub eval_steps: usize,
    pub save_steps: usize,
    pub logging_steps: usize,

    /// Keep the step log in the training summary
    pub keep_logs: bool,

    /// Seed for window sampling and shuffling
    pub seed: Option<u64>,
}

impl Default for FineTuneConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-4,
            max_steps: 5000,
            batch_size: None,
            shuffle_buffer_size: Some(10_000),
            eval_during_fine_tune: false,
            eval_max_items: Some(100),
            eval_steps: 100,
            save_steps: 100,
            logging_steps: 100,
            keep_logs: false,
            seed: None,
        }
    }
}

impl FineTuneConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_max_steps(mut self, steps: usize) -> Self {
        self.max_steps = steps;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn with_shuffle_buffer_size(mut self, size: Option<i64>) -> Self {
        self.shuffle_buffer_size = size;
        self
    }

    /// Enable evaluation with the given interval
    pub fn with_evaluation(mut self, eval_steps: usize) -> Self {
        self.eval_during_fine_tune = true;
        self.eval_steps = eval_steps;
        self
    }

    pub fn with_eval_max_items(mut self, items: Option<usize>) -> Self {
        self.eval_max_items = items;
        self
    }

    pub fn with_save_steps(mut self, steps: usize) -> Self {
        self.save_steps = steps;
        self
    }

    pub fn with_logging_steps(mut self, steps: usize) -> Self {
        self.logging_steps = steps;
        self
    }

    pub fn with_keep_logs(mut self, keep: bool) -> Self {
        self.keep_logs = keep;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Learning rate after `step` completed steps
    pub fn learning_rate_at(&self, step: usize) -> f64 {
        if self.max_steps == 0 {
            return self.learning_rate;
        }
        let progress = step.min(self.max_steps) as f64 / self.max_steps as f64;
        self.learning_rate * (1.0 - progress)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ForecastError::InvalidConfiguration(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.batch_size == Some(0) {
            return Err(ForecastError::InvalidConfiguration(
                "batch_size must be positive".to_string(),
            ));
        }
        if let Some(size) = self.shuffle_buffer_size {
            if size < 0 {
                return Err(ForecastError::InvalidConfiguration(format!(
                    "shuffle_buffer_size must be non-negative, got {}",
                    size
                )));
            }
        }
        if self.eval_steps == 0 || self.save_steps == 0 || self.logging_steps == 0 {
            return Err(ForecastError::InvalidConfiguration(
                "eval_steps, save_steps and logging_steps must be positive".to_string(),
            ));
        }
        if self.eval_max_items == Some(0) {
            return Err(ForecastError::InvalidConfiguration(
                "eval_max_items must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}
