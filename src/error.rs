//! Error types for the anomaly detector

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, AnomalyError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum AnomalyError {
    /// Tensor or array dimensions do not match what the component expects
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    /// Window index outside `[0, len)`
    #[error("Index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Series too short to produce a single window
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Loss became NaN or infinite during training
    #[error("Non-finite loss {value} at epoch {epoch}, batch {batch}")]
    NonFiniteLoss { epoch: usize, batch: usize, value: f64 },

    /// Error raised by libtorch
    #[error("Torch error: {0}")]
    Torch(#[from] tch::TchError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl AnomalyError {
    /// Build a shape mismatch error from anything printable
    pub fn shape(
        context: impl Into<String>,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        AnomalyError::ShapeMismatch {
            context: context.into(),
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }

    /// Whether the error stems from inconsistent dimensions
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, AnomalyError::ShapeMismatch { .. })
    }
}
