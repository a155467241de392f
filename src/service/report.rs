//! Serializable results of the service operations

use crate::error::Result;
use crate::evaluation::{ConfusionMatrix, EvaluationReport, RocCurve};
use crate::ingest::{RawTable, ResolvedColumns};
use crate::preprocessing::{float_column, HarmonizedTable};
use crate::schema::Label;
use crate::training::{Backend, TrainedModel, TrainingHistory};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Rows shown in report previews
pub const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewColumn<T> {
    pub name: String,
    pub values: Vec<T>,
}

/// What an upload resolved to
#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub session_id: String,
    pub mission: String,
    /// Zero-based line of the header row
    pub header_line: usize,
    pub target_column: String,
    /// Missing values per raw column
    pub missing_counts: BTreeMap<String, usize>,
    pub temperature_columns: Vec<String>,
    pub radius_columns: Vec<String>,
    pub feature_columns: Vec<String>,
    /// Raw temperature / radius values of the first retained rows
    pub extracted_raw: Vec<PreviewColumn<Option<f64>>>,
    /// Scaled engineered features of the first retained rows
    pub extracted_normalized: Vec<PreviewColumn<f64>>,
    pub targets_raw: Vec<String>,
    pub targets_numeric: Vec<u8>,
    pub rows: usize,
    pub dropped_rows: usize,
}

impl UploadReport {
    pub(crate) fn build(
        session_id: &str,
        raw: &RawTable,
        resolved: &ResolvedColumns,
        table: &HarmonizedTable,
        scaled: &DataFrame,
    ) -> Result<Self> {
        let missing_counts = raw
            .frame
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), c.null_count()))
            .collect();

        let preview_rows: Vec<usize> = table.kept_rows.iter().take(PREVIEW_ROWS).copied().collect();
        let extracted_raw = resolved
            .temperature
            .iter()
            .chain(&resolved.radius)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|name| {
                let values = float_column(&raw.frame, name)?;
                Ok(PreviewColumn {
                    name: name.clone(),
                    values: preview_rows.iter().map(|&r| values.get(r).copied().flatten()).collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let extracted_normalized = table
            .engineered
            .iter()
            .map(|name| {
                let values = float_column(scaled, name)?;
                Ok(PreviewColumn {
                    name: name.clone(),
                    values: values.into_iter().take(PREVIEW_ROWS).map(|v| v.unwrap_or(0.0)).collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            session_id: session_id.to_string(),
            mission: table.mission.to_string(),
            header_line: raw.header_offset,
            target_column: table.target_column.clone(),
            missing_counts,
            temperature_columns: resolved.temperature.iter().cloned().collect(),
            radius_columns: resolved.radius.iter().cloned().collect(),
            feature_columns: table.feature_set.names().to_vec(),
            extracted_raw,
            extracted_normalized,
            targets_raw: table.raw_labels.iter().take(PREVIEW_ROWS).cloned().collect(),
            targets_numeric: table.labels.iter().take(PREVIEW_ROWS).map(|l| l.ordinal()).collect(),
            rows: table.n_rows(),
            dropped_rows: table.dropped_rows,
        })
    }
}

/// Backend name plus free-form hyperparameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainRequest {
    pub model: String,
    #[serde(default)]
    pub hyperparams: Map<String, Value>,
}

impl TrainRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            hyperparams: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.hyperparams.insert(key.to_string(), value.into());
        self
    }
}

/// Metrics and history of one training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub session_id: String,
    pub backend: Backend,
    pub classes: Vec<Label>,
    pub accuracy: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub roc: Option<RocCurve>,
    pub history: TrainingHistory,
    pub n_train: usize,
    pub n_test: usize,
    pub n_rounds: usize,
    /// Split-count importance per feature
    pub feature_importances: BTreeMap<String, f64>,
}

impl TrainingReport {
    pub(crate) fn new(
        session_id: &str,
        model: &TrainedModel,
        evaluation: EvaluationReport,
        n_train: usize,
        n_test: usize,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            backend: model.backend(),
            classes: model.classes().to_vec(),
            accuracy: evaluation.accuracy,
            confusion_matrix: evaluation.confusion_matrix,
            roc: evaluation.roc,
            history: model.history().clone(),
            n_train,
            n_test,
            n_rounds: model.n_rounds(),
            feature_importances: model.feature_importances(),
        }
    }
}

/// A trained model and its report
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: TrainedModel,
    pub report: TrainingReport,
}
