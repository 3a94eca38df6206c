//! Time-series data pipeline
//!
//! Provides the building blocks that turn a collection of ragged series
//! into model-ready batches:
//! - Series containers and CSV/DataFrame loading
//! - A flat ragged index with trailing-window extraction
//! - Training and validation window sampling
//! - Bounded-buffer pseudo-shuffling
//! - Tokenized or raw example formatting and batch collation
//! - Fine-tuning and inference datasets

mod format;
mod ragged;
mod sampler;
mod series;
mod shuffle;
pub mod fine_tuning;
pub mod inference;

pub use fine_tuning::{Batched, FineTuningDataset, FineTuningExamples};
pub use format::{ExampleFormat, TrainingBatch, TrainingExample, IGNORE_LABEL};
pub use inference::{left_pad_and_stack, InferenceBatches, InferenceDataset};
pub use ragged::RaggedSeriesIndex;
pub use sampler::{
    ExpectedNumInstanceSampler, InstanceSplitter, SamplerMode, TrainingWindows,
    ValidationSplitSampler, ValidationWindows, Window, WindowSampler, Windows,
};
pub use series::{SeriesCollection, TimeSeriesItem, DEFAULT_TARGET};
pub use shuffle::ReservoirShuffle;
