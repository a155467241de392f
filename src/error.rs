//! Error types for the orbital-horizon pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, OrbitalError>;

/// Main error type for ingestion, training and prediction
#[derive(Error, Debug)]
pub enum OrbitalError {
    #[error("Header not found: no disposition column within the first {searched} rows")]
    HeaderNotFound { searched: usize },

    #[error("No target column: none of the known disposition columns could be resolved")]
    NoTargetColumn,

    #[error("No dataset loaded: upload a dataset first")]
    NoDatasetLoaded,

    #[error("Invalid backend: {0} (expected 'xgb' or 'lgbm')")]
    InvalidBackend(String),

    #[error("Model artifact unavailable: {path}: {reason}")]
    ModelArtifactUnavailable { path: String, reason: String },

    #[error("Feature set mismatch: model expects {expected:?}, session has {actual:?}")]
    FeatureSetMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("No predictions available: run a prediction first")]
    NoPredictions,

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

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
}

impl OrbitalError {
    /// Stable machine-readable code, used by front ends to map errors
    /// onto their own status vocabulary.
    pub fn code(&self) -> &'static str {
        match self {
            OrbitalError::HeaderNotFound { .. } => "header_not_found",
            OrbitalError::NoTargetColumn => "no_target_column",
            OrbitalError::NoDatasetLoaded => "no_dataset_loaded",
            OrbitalError::InvalidBackend(_) => "invalid_backend",
            OrbitalError::ModelArtifactUnavailable { .. } => "model_artifact_unavailable",
            OrbitalError::FeatureSetMismatch { .. } => "feature_set_mismatch",
            OrbitalError::NoPredictions => "no_predictions",
            OrbitalError::DataError(_) => "data_error",
            OrbitalError::TrainingError(_) => "training_error",
            OrbitalError::ConfigError(_) => "config_error",
            OrbitalError::IoError(_) => "io_error",
            OrbitalError::SerializationError(_) => "serialization_error",
            OrbitalError::ShapeError { .. } => "shape_error",
            OrbitalError::FeatureNotFound(_) => "feature_not_found",
            OrbitalError::ModelNotFitted => "model_not_fitted",
            OrbitalError::InvalidParameter { .. } => "invalid_parameter",
        }
    }

    /// Whether the caller's input (rather than internal state) caused the failure.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            OrbitalError::IoError(_)
                | OrbitalError::SerializationError(_)
                | OrbitalError::ShapeError { .. }
                | OrbitalError::TrainingError(_)
        )
    }
}

impl From<polars::error::PolarsError> for OrbitalError {
    fn from(err: polars::error::PolarsError) -> Self {
        OrbitalError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for OrbitalError {
    fn from(err: serde_json::Error) -> Self {
        OrbitalError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for OrbitalError {
    fn from(err: ndarray::ShapeError) -> Self {
        OrbitalError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
