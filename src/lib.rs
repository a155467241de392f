//! Orbital Horizon - exoplanet candidate classification
//!
//! Ingests heterogeneous survey catalog exports (Kepler KOI, TESS TOI, K2),
//! harmonizes them into one canonical feature space and trains boosted-tree
//! classifiers on the detection status.
//!
//! # Modules
//!
//! ## Pipeline stages
//! - [`ingest`] - Lossy decoding, header discovery, column resolution
//! - [`schema`] - Canonical labels, features and mission tables
//! - [`preprocessing`] - Harmonization, engineering, imputation, scaling
//! - [`training`] - Boosted-tree backends and the training dispatcher
//! - [`evaluation`] - Accuracy, confusion matrix, ROC
//! - [`inference`] - Artifact loading, prediction, CSV export
//!
//! ## Services
//! - [`session`] - Versioned session store
//! - [`service`] - Upload / train / predict / export facade
//! - [`cli`] - Command-line interface

// Core error handling
pub mod config;
pub mod error;

// Pipeline stages
pub mod evaluation;
pub mod inference;
pub mod ingest;
pub mod preprocessing;
pub mod schema;
pub mod training;

// Services
pub mod cli;
pub mod service;
pub mod session;

pub use config::PipelineConfig;
pub use error::{OrbitalError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::error::{OrbitalError, Result};
    pub use crate::evaluation::{ConfusionMatrix, EvaluationReport, Evaluator, RocCurve};
    pub use crate::ingest::{ColumnResolver, HeaderLocator};
    pub use crate::preprocessing::{Scaler, ScalerType, SchemaHarmonizer, TemperaturePreference};
    pub use crate::schema::{CanonicalFeature, FeatureSet, Label};
    pub use crate::service::{ExoplanetService, TrainRequest, TrainingReport, UploadReport};
    pub use crate::training::{Backend, Hyperparameters, TrainedModel, TrainingDispatcher, TrainingHistory};
}
