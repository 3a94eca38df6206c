//! Pretrained forecaster
//!
//! Wraps a model capability with the full workflow:
//! - Optional fine-tuning on training windows under the fit time limit
//! - Zero-shot comparison on a validation subset, reverting to the
//!   pretrained weights when fine-tuning made things worse
//! - Batched prediction under a time limit, defaulting to whatever budget
//!   `fit` left over

mod config;

pub use config::ForecasterConfig;

use crate::budget::Deadline;
use crate::data::{
    Batched, ExampleFormat, FineTuningDataset, SamplerMode, SeriesCollection, TrainingBatch,
    DEFAULT_TARGET,
};
use crate::error::Result;
use crate::inference::{ForecastOutput, InferenceEngine, InferenceStats};
use crate::model::{FineTunableModel, ModelPreset};
use crate::training::{
    evaluate, load_checkpoint, save_checkpoint, StepTrainer, TrainingSummary,
};
use rand::prelude::*;
use rand::seq::index;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory under `output_dir` holding the kept fine-tuned weights
pub const FINE_TUNED_CHECKPOINT_DIR: &str = "fine-tuned-ckpt";
/// File inside [`FINE_TUNED_CHECKPOINT_DIR`]
pub const CHECKPOINT_FILE: &str = "model.json";
/// Directory under `output_dir` for intermediate trainer checkpoints
pub const TRAINER_LOG_DIR: &str = "trainer-logs";

/// Static capability flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecasterTags {
    pub allow_nan: bool,
    pub can_use_val_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimumResources {
    pub num_cpus: usize,
    pub num_gpus: usize,
}

/// What happened during `fit`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    /// `None` when fine-tuning is disabled
    pub training: Option<TrainingSummary>,
    /// Horizon used for fine-tuning after truncation
    pub fine_tune_prediction_length: usize,
    pub zero_shot_loss: Option<f32>,
    pub fine_tuned_loss: Option<f32>,
    /// Whether the fine-tuned weights were kept
    pub kept_fine_tuned: bool,
    pub elapsed_secs: f64,
}

/// A forecaster built on a [`FineTunableModel`]
#[derive(Debug)]
pub struct PretrainedForecaster<M: FineTunableModel> {
    config: ForecasterConfig,
    model: M,
    engine: InferenceEngine,
    fine_tuned: bool,
    remaining_time_secs: Option<f64>,
}

impl<M: FineTunableModel> PretrainedForecaster<M> {
    pub fn new(config: ForecasterConfig, model: M) -> Result<Self> {
        config.validate()?;
        let engine = InferenceEngine::new(config.resolved_inference())?;
        Ok(Self {
            config,
            model,
            engine,
            fine_tuned: false,
            remaining_time_secs: None,
        })
    }

    pub fn config(&self) -> &ForecasterConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn is_fine_tuned(&self) -> bool {
        self.fine_tuned
    }

    /// Budget left over from the last time-limited `fit`
    pub fn remaining_time_secs(&self) -> Option<f64> {
        self.remaining_time_secs
    }

    pub fn inference_stats(&self) -> InferenceStats {
        self.engine.stats()
    }

    pub fn tags(&self) -> ForecasterTags {
        ForecasterTags {
            allow_nan: true,
            can_use_val_data: true,
        }
    }

    pub fn minimum_resources(&self, gpu_available: bool) -> MinimumResources {
        let num_gpus = if gpu_available {
            ModelPreset::min_num_gpus_for(&self.config.resolved_model_path())
        } else {
            0
        };
        MinimumResources {
            num_cpus: 1,
            num_gpus,
        }
    }

    /// Context length used for `data`
    pub fn context_length_for(&self, data: &SeriesCollection) -> usize {
        self.engine.context_length_for(data)
    }

    /// Horizon for fine-tuning, truncated to what the model supports
    pub fn fine_tune_prediction_length(&self) -> usize {
        let requested = self.config.prediction_length;
        match self.model.max_prediction_length() {
            Some(max) if max < requested => {
                debug!(
                    requested,
                    max, "Prediction length exceeds the model maximum, fine-tuning on the shorter horizon"
                );
                max
            }
            _ => requested,
        }
    }

    fn fine_tuned_checkpoint_path(dir: &Path) -> PathBuf {
        dir.join(FINE_TUNED_CHECKPOINT_DIR).join(CHECKPOINT_FILE)
    }

    /// Restore weights written by an earlier `fit`
    pub fn load_fine_tuned(&mut self, output_dir: impl AsRef<Path>) -> Result<()> {
        let checkpoint = load_checkpoint(Self::fine_tuned_checkpoint_path(output_dir.as_ref()))?;
        self.model.restore(checkpoint);
        self.fine_tuned = true;
        Ok(())
    }

    /// Fine-tune when enabled and record the leftover time budget
    pub fn fit(
        &mut self,
        train: &SeriesCollection,
        val: Option<&SeriesCollection>,
        time_limit_secs: Option<f64>,
    ) -> Result<FitReport> {
        let deadline = Deadline::new(time_limit_secs)?;
        let prediction_length = self.fine_tune_prediction_length();

        let mut report = FitReport {
            training: None,
            fine_tune_prediction_length: prediction_length,
            zero_shot_loss: None,
            fine_tuned_loss: None,
            kept_fine_tuned: false,
            elapsed_secs: 0.0,
        };

        if self.config.fine_tune {
            self.fine_tune(train, val, prediction_length, time_limit_secs, &mut report)?;
        } else {
            debug!("Fine-tuning disabled, using pretrained weights");
        }

        report.elapsed_secs = deadline.elapsed().as_secs_f64();
        self.remaining_time_secs = deadline.remaining_secs();
        Ok(report)
    }

    fn fine_tune(
        &mut self,
        train: &SeriesCollection,
        val: Option<&SeriesCollection>,
        prediction_length: usize,
        time_limit_secs: Option<f64>,
        report: &mut FitReport,
    ) -> Result<()> {
        let ft = self.config.fine_tune_config.clone();
        let context_length = self.context_length_for(train);
        let format = ExampleFormat::from_tokenizer(self.model.tokenizer());

        let mut train_ds = FineTuningDataset::new(
            train,
            DEFAULT_TARGET,
            context_length,
            prediction_length,
            format.clone(),
            SamplerMode::Training,
        )?;
        if let Some(seed) = ft.seed {
            train_ds = train_ds.with_seed(seed);
        }
        let batch_size = self.config.fine_tune_batch_size();
        let batches = Batched::new(train_ds.shuffle(ft.shuffle_buffer_size)?, batch_size)?;

        let eval_batches = match val {
            Some(val) if !val.is_empty() => self.eval_batches(
                val,
                context_length,
                prediction_length,
                format,
            )?,
            _ => Vec::new(),
        };

        let pretrained = self.model.checkpoint();
        if !eval_batches.is_empty() {
            report.zero_shot_loss = Some(evaluate(&self.model, &eval_batches)?);
        }

        // the step budget is measured from the start of the loop
        let mut trainer =
            StepTrainer::new(&mut self.model, ft.clone())?.with_time_limit(time_limit_secs)?;
        if ft.eval_during_fine_tune {
            trainer = trainer.with_eval_batches(eval_batches.clone());
        }
        let log_dir = self.config.output_dir.as_ref().map(|dir| dir.join(TRAINER_LOG_DIR));
        if let Some(dir) = &log_dir {
            trainer = trainer.with_checkpoint_dir(dir);
        }
        report.training = Some(trainer.train(batches)?);

        if let (Some(dir), false) = (&log_dir, ft.keep_logs) {
            if dir.exists() {
                fs::remove_dir_all(dir)?;
            }
        }

        let keep = match report.zero_shot_loss {
            Some(zero_shot) => {
                let fine_tuned = evaluate(&self.model, &eval_batches)?;
                report.fine_tuned_loss = Some(fine_tuned);
                fine_tuned <= zero_shot
            }
            None => true,
        };

        if keep {
            if let Some(dir) = &self.config.output_dir {
                let path = Self::fine_tuned_checkpoint_path(dir);
                info!(path = %path.display(), "Saving fine-tuned checkpoint");
                save_checkpoint(&path, &self.model.checkpoint())?;
            }
            self.fine_tuned = true;
        } else {
            info!(
                zero_shot_loss = ?report.zero_shot_loss,
                fine_tuned_loss = ?report.fine_tuned_loss,
                "Fine-tuning did not improve validation loss, reverting to pretrained weights"
            );
            self.model.restore(pretrained);
            self.fine_tuned = false;
        }
        report.kept_fine_tuned = keep;
        Ok(())
    }

    /// One validation window per series over at most `eval_max_items` series
    fn eval_batches(
        &self,
        val: &SeriesCollection,
        context_length: usize,
        prediction_length: usize,
        format: ExampleFormat,
    ) -> Result<Vec<TrainingBatch>> {
        let ft = &self.config.fine_tune_config;
        let subset = match ft.eval_max_items {
            Some(max_items) if max_items < val.len() => {
                let mut rng = match ft.seed {
                    Some(s) => Xoshiro256PlusPlus::seed_from_u64(s),
                    None => Xoshiro256PlusPlus::from_entropy(),
                };
                let mut chosen = index::sample(&mut rng, val.len(), max_items).into_vec();
                chosen.sort_unstable();
                val.select(&chosen)?
            }
            _ => val.clone(),
        };

        let dataset = FineTuningDataset::new(
            &subset,
            DEFAULT_TARGET,
            context_length,
            prediction_length,
            format,
            SamplerMode::Validation,
        )?;
        Batched::new(dataset.iter()?, self.config.fine_tune_batch_size())?.collect()
    }

    /// Forecast every series; `time_limit_secs` overrides the configured limit
    pub fn predict(&self, data: &SeriesCollection, time_limit_secs: Option<f64>) -> Result<ForecastOutput> {
        let limit = time_limit_secs.or(self.config.inference.time_limit_secs);
        let deadline = Deadline::new(limit)?;
        self.engine
            .predict_with_deadline(&self.model, data, self.config.prediction_length, deadline)
    }

    /// Forecast under the budget left over from `fit`
    pub fn predict_with_remaining_budget(&self, data: &SeriesCollection) -> Result<ForecastOutput> {
        self.predict(data, self.remaining_time_secs)
    }
}
