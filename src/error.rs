//! Error types for the fairness experiment harness

use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, KolosalError>;

/// Main error type
#[derive(Error, Debug)]
pub enum KolosalError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Optimization error: {0}")]
    OptimizationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Fairness error: {0}")]
    FairnessError(String),

    /// Every trial of a search failed, so there is nothing to refit
    #[error("No valid trial among {trials} evaluated")]
    NoValidTrial { trials: usize },
}

impl From<polars::error::PolarsError> for KolosalError {
    fn from(err: polars::error::PolarsError) -> Self {
        KolosalError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for KolosalError {
    fn from(err: serde_json::Error) -> Self {
        KolosalError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for KolosalError {
    fn from(err: ndarray::ShapeError) -> Self {
        KolosalError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl KolosalError {
    /// Whether the error comes from the input data or configuration rather than from
    /// one set of hyperparameters; such errors abort a search instead of failing a trial
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            KolosalError::DataError(_)
                | KolosalError::PreprocessingError(_)
                | KolosalError::FeatureNotFound(_)
                | KolosalError::ConfigError(_)
                | KolosalError::IoError(_)
                | KolosalError::SerializationError(_)
        )
    }

    /// Shorthand for the ubiquitous "y length" mismatch
    pub(crate) fn length_mismatch(what: &str, expected: usize, actual: usize) -> Self {
        KolosalError::ShapeError {
            expected: format!("{} length = {}", what, expected),
            actual: format!("{} length = {}", what, actual),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KolosalError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_no_valid_trial_display() {
        let err = KolosalError::NoValidTrial { trials: 12 };
        assert_eq!(err.to_string(), "No valid trial among 12 evaluated");
    }

    #[test]
    fn test_data_errors_are_classified() {
        assert!(KolosalError::FeatureNotFound("sped".to_string()).is_data_error());
        assert!(KolosalError::PreprocessingError("nulls".to_string()).is_data_error());
        assert!(!KolosalError::TrainingError("diverged".to_string()).is_data_error());
        assert!(!KolosalError::NoValidTrial { trials: 3 }.is_data_error());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: KolosalError = io_err.into();
        assert!(matches!(err, KolosalError::IoError(_)));
    }
}
