//! Inference module
//!
//! Applies a persisted model artifact to the current session and exports
//! the labelled rows as CSV.

use crate::config::PipelineConfig;
use crate::error::{OrbitalError, Result};
use crate::preprocessing::to_matrix;
use crate::schema::Label;
use crate::session::SessionSnapshot;
use crate::training::TrainedModel;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const PREDICTION_COLUMN: &str = "prediction";
pub const PREDICTION_LABEL_COLUMN: &str = "prediction_label";

/// Loads model artifacts and labels session rows with them
#[derive(Debug, Clone)]
pub struct Predictor {
    config: PipelineConfig,
}

impl Predictor {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Read an artifact by path, falling back to the models directory.
    pub fn load_artifact(&self, name: &Path) -> Result<TrainedModel> {
        let path: PathBuf = self.config.resolve_model_path(name);
        TrainedModel::load(&path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "model artifact unavailable");
            OrbitalError::ModelArtifactUnavailable {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Predict one label per session row and record them on the snapshot.
    pub fn predict(&self, model: &TrainedModel, snapshot: &SessionSnapshot) -> Result<Vec<Label>> {
        let expected = model.feature_names();
        if expected != snapshot.feature_set.names() {
            return Err(OrbitalError::FeatureSetMismatch {
                expected: expected.to_vec(),
                actual: snapshot.feature_set.names().to_vec(),
            });
        }

        // Inputs are scaled the way the model's training data was
        let frame = match model.scaler() {
            Some(scaler) => scaler.transform(&snapshot.unscaled)?,
            None => snapshot.scaled.clone(),
        };
        let columns: Vec<&str> = expected.iter().map(String::as_str).collect();
        let x = to_matrix(&frame, &columns)?;
        let predictions = model.predict(&x)?;

        info!(
            session_id = %snapshot.id,
            backend = %model.backend(),
            rows = predictions.len(),
            "predictions stored"
        );
        snapshot.set_predictions(predictions.clone());
        Ok(predictions)
    }
}

/// CSV of identifier (if any), unscaled features and the stored predictions.
pub fn export_predictions(snapshot: &SessionSnapshot) -> Result<Vec<u8>> {
    let predictions = snapshot.predictions().ok_or(OrbitalError::NoPredictions)?;
    if predictions.len() != snapshot.unscaled.height() {
        return Err(OrbitalError::ShapeError {
            expected: format!("{} predictions", snapshot.unscaled.height()),
            actual: format!("{} predictions", predictions.len()),
        });
    }

    let mut df = snapshot.unscaled.clone();
    if let Some(identifier) = &snapshot.identifier {
        let values: Vec<&str> = identifier.values.iter().map(String::as_str).collect();
        df.insert_column(0, Series::new(identifier.name.as_str().into(), values))?;
    }
    let ordinals: Vec<u32> = predictions.iter().map(|l| u32::from(l.ordinal())).collect();
    let names: Vec<&str> = predictions.iter().map(|l| l.display_name()).collect();
    df.with_column(Series::new(PREDICTION_COLUMN.into(), ordinals))?;
    df.with_column(Series::new(PREDICTION_LABEL_COLUMN.into(), names))?;

    let mut buf = Vec::new();
    CsvWriter::new(&mut buf).finish(&mut df)?;
    Ok(buf)
}
