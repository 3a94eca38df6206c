//! Model capabilities
//!
//! The pretrained forecasters themselves live outside this crate. The
//! pipeline only relies on the capabilities below:
//! - [`ForecastModel`] - quantile forecasts from a batch of contexts
//! - [`SeriesTokenizer`] - optional context/label tokenization
//! - [`FineTunableModel`] - single optimization steps and checkpoints

mod baseline;
mod presets;

pub use baseline::{NaiveQuantileModel, NaiveCheckpoint};
pub use presets::{
    resolve_model_path, ModelPreset, TorchDtype, FALLBACK_BATCH_SIZE, MODEL_ALIASES, MODEL_PRESETS,
};

use crate::data::TrainingBatch;
use crate::error::Result;
use ndarray::{Array2, Array3, ArrayView2};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Token ids and attention mask for one context, plus the scale used
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizedContext {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<bool>,
    pub scale: f32,
}

/// Label ids for one future window; masked positions are ignored
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizedLabels {
    pub labels: Vec<i64>,
    pub labels_mask: Vec<bool>,
}

/// Maps real-valued windows to token ids
pub trait SeriesTokenizer: Send + Sync {
    fn context_input_transform(&self, context: &[f32]) -> Result<TokenizedContext>;

    /// Tokenize the future window with the scale of its context
    fn label_input_transform(&self, future: &[f32], scale: f32) -> Result<TokenizedLabels>;
}

/// Forecasts for a batch of series
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileForecast {
    /// Shape `(batch, prediction_length, n_quantiles)`
    pub quantiles: Array3<f32>,
    /// Shape `(batch, prediction_length)`
    pub mean: Array2<f32>,
}

/// Produces quantile forecasts from NaN-padded contexts
pub trait ForecastModel {
    /// `context` has shape `(batch, context_length)`
    fn predict_quantiles(
        &self,
        context: ArrayView2<'_, f32>,
        prediction_length: usize,
        quantile_levels: &[f64],
    ) -> Result<QuantileForecast>;

    /// Tokenizer for token-based variants; `None` means raw windows
    fn tokenizer(&self) -> Option<Arc<dyn SeriesTokenizer>> {
        None
    }

    /// Longest horizon the model can be fine-tuned on, if limited
    fn max_prediction_length(&self) -> Option<usize> {
        None
    }
}

/// A model whose weights can be updated step by step
pub trait FineTunableModel: ForecastModel {
    /// Serializable snapshot of the weights
    type Checkpoint: Clone + Serialize + DeserializeOwned;

    /// Run one optimization step and return the training loss
    fn fit_step(&mut self, batch: &TrainingBatch, learning_rate: f64) -> Result<f32>;

    /// Loss on a batch without updating weights
    fn eval_loss(&self, batch: &TrainingBatch) -> Result<f32>;

    fn checkpoint(&self) -> Self::Checkpoint;

    fn restore(&mut self, checkpoint: Self::Checkpoint);
}
