//! Error types for the Kolosal forecasting pipeline

use thiserror::Error;

/// Result type alias for forecasting operations
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Main error type for the forecasting pipeline
#[derive(Error, Debug)]
pub enum ForecastError {
    /// Raised eagerly at construction, never mid-iteration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Time limit exceeded: {elapsed_secs:.3}s elapsed, limit {limit_secs:.3}s")]
    DeadlineExceeded { elapsed_secs: f64, limit_secs: f64 },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ForecastError {
    /// Whether this error is a cooperative cancellation
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, ForecastError::DeadlineExceeded { .. })
    }
}

impl From<polars::error::PolarsError> for ForecastError {
    fn from(err: polars::error::PolarsError) -> Self {
        ForecastError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ForecastError {
    fn from(err: ndarray::ShapeError) -> Self {
        ForecastError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ForecastError::InvalidConfiguration("width must be positive".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: width must be positive");
    }

    #[test]
    fn test_deadline_display() {
        let err = ForecastError::DeadlineExceeded { elapsed_secs: 1.5, limit_secs: 1.0 };
        assert!(err.is_deadline_exceeded());
        assert_eq!(err.to_string(), "Time limit exceeded: 1.500s elapsed, limit 1.000s");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ForecastError = io_err.into();
        assert!(matches!(err, ForecastError::IoError(_)));
        assert!(!err.is_deadline_exceeded());
    }
}
