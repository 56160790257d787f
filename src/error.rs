//! Error types for the cardspend crate

use thiserror::Error;

/// Result type alias for cardspend operations
pub type Result<T> = std::result::Result<T, CardspendError>;

/// Main error type for the cardspend crate
#[derive(Error, Debug)]
pub enum CardspendError {
    #[error("missing required field: {field}")]
    Schema { field: String },

    #[error("scaler or model used before fit")]
    NotFitted,

    #[error("model artifact not found: {path}")]
    ArtifactNotFound { path: String },

    #[error("model artifact corrupt: {path}: {reason}")]
    ArtifactCorrupt { path: String, reason: String },

    #[error("training failed: no model family completed grid search")]
    TrainingFailure,

    #[error("data error: {0}")]
    Data(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },
}

impl From<polars::error::PolarsError> for CardspendError {
    fn from(err: polars::error::PolarsError) -> Self {
        CardspendError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for CardspendError {
    fn from(err: serde_json::Error) -> Self {
        CardspendError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for CardspendError {
    fn from(err: ndarray::ShapeError) -> Self {
        CardspendError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
