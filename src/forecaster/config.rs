//! Forecaster configuration

use crate::error::{ForecastError, Result};
use crate::inference::InferenceConfig;
use crate::model::{resolve_model_path, ModelPreset, TorchDtype};
use crate::training::FineTuneConfig;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Everything needed to fit and run a pretrained forecaster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecasterConfig {
    /// Model path or alias such as `bolt-small`
    pub model_path: String,

    /// Forecast horizon
    pub prediction_length: usize,

    /// Weight precision; the model preset's default when absent
    pub torch_dtype: Option<TorchDtype>,

    /// Fine-tune on the training data during `fit`
    pub fine_tune: bool,

    pub inference: InferenceConfig,

    pub fine_tune_config: FineTuneConfig,

    /// Where fine-tuned weights and trainer checkpoints are written
    pub output_dir: Option<PathBuf>,
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            model_path: "autogluon/chronos-bolt-small".to_string(),
            prediction_length: 1,
            torch_dtype: None,
            fine_tune: false,
            inference: InferenceConfig::default(),
            fine_tune_config: FineTuneConfig::default(),
            output_dir: None,
        }
    }
}

impl ForecasterConfig {
    pub fn new(model_path: impl Into<String>, prediction_length: usize) -> Self {
        Self {
            model_path: model_path.into(),
            prediction_length,
            ..Default::default()
        }
    }

    pub fn with_fine_tune(mut self, config: FineTuneConfig) -> Self {
        self.fine_tune = true;
        self.fine_tune_config = config;
        self
    }

    pub fn with_inference(mut self, config: InferenceConfig) -> Self {
        self.inference = config;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_torch_dtype(mut self, dtype: TorchDtype) -> Self {
        self.torch_dtype = Some(dtype);
        self
    }

    /// Model path with aliases expanded
    pub fn resolved_model_path(&self) -> String {
        resolve_model_path(&self.model_path)
    }

    /// Inference batch size, defaulting to the model preset's
    pub fn batch_size(&self) -> usize {
        self.inference
            .batch_size
            .unwrap_or_else(|| ModelPreset::default_batch_size_for(&self.resolved_model_path()))
    }

    /// Fine-tuning batch size, defaulting to the inference batch size
    pub fn fine_tune_batch_size(&self) -> usize {
        self.fine_tune_config
            .batch_size
            .unwrap_or_else(|| self.batch_size())
    }

    pub fn resolved_torch_dtype(&self) -> TorchDtype {
        self.torch_dtype
            .unwrap_or_else(|| ModelPreset::default_dtype_for(&self.resolved_model_path()))
    }

    /// Inference settings with the batch size resolved against the preset
    pub fn resolved_inference(&self) -> InferenceConfig {
        InferenceConfig {
            batch_size: Some(self.batch_size()),
            ..self.inference.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_path.trim().is_empty() {
            return Err(ForecastError::InvalidConfiguration(
                "model_path must not be empty".to_string(),
            ));
        }
        if self.prediction_length == 0 {
            return Err(ForecastError::InvalidConfiguration(
                "prediction_length must be positive".to_string(),
            ));
        }
        self.inference.validate()?;
        if self.fine_tune {
            self.fine_tune_config.validate()?;
        }
        Ok(())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
