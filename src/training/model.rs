//! Trained model artifact

use super::history::TrainingHistory;
use super::lightgbm::LightGBMClassifier;
use super::xgboost::XGBoostClassifier;
use crate::error::{OrbitalError, Result};
use crate::preprocessing::Scaler;
use crate::schema::Label;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Boosted-tree backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backend {
    #[serde(rename = "xgb")]
    XGBoost,
    #[serde(rename = "lgbm")]
    LightGBM,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::XGBoost => "xgb",
            Backend::LightGBM => "lgbm",
        }
    }
}

impl FromStr for Backend {
    type Err = OrbitalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "xgb" => Ok(Backend::XGBoost),
            "lgbm" => Ok(Backend::LightGBM),
            other => Err(OrbitalError::InvalidBackend(other.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fitted booster of either backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Booster {
    XGBoost(XGBoostClassifier),
    LightGBM(LightGBMClassifier),
}

impl Booster {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            Booster::XGBoost(m) => m.predict_proba(x),
            Booster::LightGBM(m) => m.predict_proba(x),
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        match self {
            Booster::XGBoost(m) => m.predict(x),
            Booster::LightGBM(m) => m.predict(x),
        }
    }

    fn n_rounds(&self) -> usize {
        match self {
            Booster::XGBoost(m) => m.n_rounds(),
            Booster::LightGBM(m) => m.n_rounds(),
        }
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        match self {
            Booster::XGBoost(m) => m.feature_importances(),
            Booster::LightGBM(m) => m.feature_importances(),
        }
    }
}

/// A booster together with everything needed to apply it to a new upload:
/// the class labels its outputs index, the feature order it was fit on and
/// the scaler that produced its inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    backend: Backend,
    classes: Vec<Label>,
    feature_names: Vec<String>,
    booster: Booster,
    history: TrainingHistory,
    #[serde(default)]
    scaler: Option<Scaler>,
}

impl TrainedModel {
    pub fn new(
        backend: Backend,
        classes: Vec<Label>,
        feature_names: Vec<String>,
        booster: Booster,
        history: TrainingHistory,
    ) -> Self {
        Self {
            backend,
            classes,
            feature_names,
            booster,
            history,
            scaler: None,
        }
    }

    /// Attach the scaler fitted on the training upload.
    pub fn with_scaler(mut self, scaler: Scaler) -> Self {
        self.scaler = Some(scaler);
        self
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Labels in output-column order.
    pub fn classes(&self) -> &[Label] {
        &self.classes
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn scaler(&self) -> Option<&Scaler> {
        self.scaler.as_ref()
    }

    pub fn booster(&self) -> &Booster {
        &self.booster
    }

    /// Boosting rounds kept in the model.
    pub fn n_rounds(&self) -> usize {
        self.booster.n_rounds()
    }

    /// Split-count importance per feature name, summing to one when any
    /// tree split at all.
    pub fn feature_importances(&self) -> BTreeMap<String, f64> {
        match self.booster.feature_importances() {
            Some(values) => self.feature_names.iter().cloned().zip(values).collect(),
            None => BTreeMap::new(),
        }
    }

    /// `n × classes().len()` probabilities.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.booster.predict_proba(x)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<Label>> {
        self.booster
            .predict(x)?
            .into_iter()
            .map(|idx| {
                self.classes.get(idx).copied().ok_or_else(|| {
                    OrbitalError::TrainingError(format!("class index {} out of range", idx))
                })
            })
            .collect()
    }

    /// Save the model to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a model from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&json)?;
        Ok(model)
    }
}
