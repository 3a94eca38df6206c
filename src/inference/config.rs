//! Inference configuration

use crate::budget::limit_from_secs;
use crate::error::{ForecastError, Result};
use crate::model::FALLBACK_BATCH_SIZE;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Longest context the pretrained models accept
pub const MAX_CONTEXT_LENGTH: usize = 2048;

/// Configuration for batched forecasting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Series per forward pass; the model preset's default when absent
    pub batch_size: Option<usize>,

    /// Context window; inferred from the data when absent
    pub context_length: Option<usize>,

    /// Quantile levels to forecast, each in [0, 1]
    pub quantile_levels: Vec<f64>,

    /// Wall-clock budget for one prediction call
    pub time_limit_secs: Option<f64>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            context_length: None,
            quantile_levels: vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9],
            time_limit_secs: None,
        }
    }
}

impl InferenceConfig {
    /// Create a new inference configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set batch size
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Configured batch size, or the fallback for unknown models
    pub fn resolved_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(FALLBACK_BATCH_SIZE)
    }

    /// Builder method to fix the context length
    pub fn with_context_length(mut self, length: usize) -> Self {
        self.context_length = Some(length);
        self
    }

    pub fn with_quantile_levels(mut self, levels: Vec<f64>) -> Self {
        self.quantile_levels = levels;
        self
    }

    /// Builder method to set a per-call time limit
    pub fn with_time_limit(mut self, secs: f64) -> Self {
        self.time_limit_secs = Some(secs);
        self
    }

    /// Cap a configured context length at [`MAX_CONTEXT_LENGTH`]
    pub fn with_capped_context_length(mut self) -> Self {
        if let Some(length) = self.context_length.filter(|&l| l > MAX_CONTEXT_LENGTH) {
            warn!(
                context_length = length,
                max = MAX_CONTEXT_LENGTH,
                "Context length exceeds the model maximum, capping"
            );
            self.context_length = Some(MAX_CONTEXT_LENGTH);
        }
        self
    }

    /// Context length for data whose longest series has `max_series_len`
    /// values, never above [`MAX_CONTEXT_LENGTH`]
    pub fn resolve_context_length(&self, max_series_len: usize) -> usize {
        match self.context_length {
            Some(length) => length.min(MAX_CONTEXT_LENGTH),
            None => max_series_len.clamp(1, MAX_CONTEXT_LENGTH),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == Some(0) {
            return Err(ForecastError::InvalidConfiguration(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.context_length == Some(0) {
            return Err(ForecastError::InvalidConfiguration(
                "context_length must be positive".to_string(),
            ));
        }
        if self.quantile_levels.is_empty() {
            return Err(ForecastError::InvalidConfiguration(
                "at least one quantile level is required".to_string(),
            ));
        }
        if let Some(q) = self.quantile_levels.iter().find(|q| !(0.0..=1.0).contains(*q)) {
            return Err(ForecastError::InvalidConfiguration(format!(
                "quantile level {} outside [0, 1]",
                q
            )));
        }
        if let Some(secs) = self.time_limit_secs {
            limit_from_secs(secs)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InferenceConfig::default();
        assert_eq!(config.batch_size, None);
        assert_eq!(config.resolved_batch_size(), 8);
        assert_eq!(config.quantile_levels.len(), 9);
        assert!(config.time_limit_secs.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = InferenceConfig::new()
            .with_batch_size(64)
            .with_context_length(512)
            .with_time_limit(30.0);

        assert_eq!(config.batch_size, Some(64));
        assert_eq!(config.resolved_batch_size(), 64);
        assert_eq!(config.context_length, Some(512));
        assert_eq!(config.time_limit_secs, Some(30.0));
    }

    #[test]
    fn test_context_length_resolution() {
        assert_eq!(InferenceConfig::new().resolve_context_length(300), 300);
        assert_eq!(InferenceConfig::new().resolve_context_length(5000), 2048);
        assert_eq!(InferenceConfig::new().resolve_context_length(0), 1);
        assert_eq!(
            InferenceConfig::new().with_context_length(4096).resolve_context_length(10),
            2048
        );
        assert_eq!(
            InferenceConfig::new().with_context_length(64).resolve_context_length(10),
            64
        );
    }

    #[test]
    fn test_invalid_configs() {
        assert!(InferenceConfig::new().with_batch_size(0).validate().is_err());
        assert!(InferenceConfig::new().with_quantile_levels(vec![]).validate().is_err());
        assert!(InferenceConfig::new().with_quantile_levels(vec![1.2]).validate().is_err());
        assert!(InferenceConfig::new().with_time_limit(-1.0).validate().is_err());
        assert!(InferenceConfig::new().with_time_limit(1e20).validate().is_err());
        assert!(InferenceConfig::new().with_time_limit(1e9).validate().is_ok());
    }

    #[test]
    fn test_context_length_capped_once() {
        let config = InferenceConfig::new().with_context_length(4096).with_capped_context_length();
        assert_eq!(config.context_length, Some(MAX_CONTEXT_LENGTH));

        let config = InferenceConfig::new().with_context_length(512).with_capped_context_length();
        assert_eq!(config.context_length, Some(512));
    }
}
