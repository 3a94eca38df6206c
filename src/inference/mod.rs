//! Inference module
//!
//! Provides batched quantile forecasting with:
//! - Sequential, unshuffled batches of NaN-padded contexts
//! - An optional wall-clock limit checked between batches
//! - All-or-nothing results covering every input series
//! - Long-format DataFrame export

mod config;
mod engine;
mod output;

pub use config::{InferenceConfig, MAX_CONTEXT_LENGTH};
pub use engine::{InferenceEngine, InferenceStats};
pub use output::ForecastOutput;
