//! Kolosal Forecast - data pipeline for pretrained time-series forecasters
//!
//! This crate turns collections of variable-length series into model-ready
//! batches and keeps forecasting and fine-tuning inside wall-clock budgets:
//! - Flat ragged storage with O(1) access to each series' trailing context
//! - Training (random split) and validation (last window) window sampling
//! - Bounded-buffer pseudo-shuffling of unbounded streams
//! - Deadline-checked batch iteration and step-level training budgets
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - Series containers, ragged index, samplers, shuffling, formatting
//!
//! ## Budgets and training
//! - [`budget`] - Deadline token and budgeted iteration
//! - [`training`] - Step-based fine-tuning loop with callbacks
//!
//! ## Models and forecasting
//! - [`model`] - Model capability traits, presets and a reference model
//! - [`inference`] - Batched, time-limited quantile forecasting
//! - [`forecaster`] - Fit/predict workflow around a pretrained model
//!
//! ## Services
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data pipeline
pub mod data;
pub mod budget;

// Models, training and inference
pub mod model;
pub mod training;
pub mod inference;
pub mod forecaster;

// Services
pub mod cli;

pub use error::{ForecastError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ForecastError, Result};

    // Data
    pub use crate::data::{
        Batched, ExampleFormat, FineTuningDataset, InferenceDataset, RaggedSeriesIndex,
        ReservoirShuffle, SamplerMode, SeriesCollection, TimeSeriesItem, TrainingBatch,
        TrainingExample, Window, WindowSampler, DEFAULT_TARGET,
    };

    // Budgets
    pub use crate::budget::{BudgetedExt, BudgetedIterator, Deadline};

    // Training
    pub use crate::training::{
        FinalStepGuard, FineTuneConfig, StepBudgetGuard, StepTrainer, TrainerCallback,
        TrainerControl, TrainerState, TrainingOutcome, TrainingSummary,
    };

    // Models
    pub use crate::model::{
        FineTunableModel, ForecastModel, ModelPreset, NaiveQuantileModel, QuantileForecast,
        SeriesTokenizer,
    };

    // Inference
    pub use crate::inference::{ForecastOutput, InferenceConfig, InferenceEngine, InferenceStats};

    // Forecaster
    pub use crate::forecaster::{FitReport, ForecasterConfig, PretrainedForecaster};
}
