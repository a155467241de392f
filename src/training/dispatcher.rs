//! Training dispatcher
//!
//! Splits the session matrix, fits the selected backend with its eval sets
//! (training split first, held-out split second) and adapts the backend's
//! native history into the shared [`TrainingHistory`] layout.

use super::history::{HistoryAdapter, LightGBMHistory, TrainingHistory, XGBoostHistory};
use super::lightgbm::{LightGBMClassifier, LightGBMConfig};
use super::model::{Backend, Booster, TrainedModel};
use super::objective::{EvalSet, Objective};
use super::xgboost::{XGBoostClassifier, XGBoostConfig};
use crate::config::PipelineConfig;
use crate::error::{OrbitalError, Result};
use crate::schema::Label;
use ndarray::{Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Caller-tunable settings for the level-wise backend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 3,
            learning_rate: 0.1,
        }
    }
}

impl Hyperparameters {
    /// Read the whitelisted keys from a JSON object; anything else is ignored.
    pub fn from_json(params: &Map<String, Value>) -> Result<Self> {
        let mut hp = Self::default();
        for (key, value) in params {
            match key.as_str() {
                "n_estimators" => hp.n_estimators = positive_int(key, value)?,
                "max_depth" => hp.max_depth = positive_int(key, value)?,
                "learning_rate" => {
                    hp.learning_rate = value
                        .as_f64()
                        .filter(|v| v.is_finite() && *v > 0.0)
                        .ok_or_else(|| invalid(key, value, "must be a positive number"))?;
                }
                other => debug!(key = other, "ignoring unknown hyperparameter"),
            }
        }
        Ok(hp)
    }
}

fn positive_int(key: &str, value: &Value) -> Result<usize> {
    let n = match value.as_u64() {
        Some(n) => Some(n),
        // 100.0 is accepted as 100
        None => value
            .as_f64()
            .filter(|v| v.fract() == 0.0 && *v >= 0.0)
            .map(|v| v as u64),
    };
    match n {
        Some(n) if n > 0 => Ok(n as usize),
        _ => Err(invalid(key, value, "must be a positive integer")),
    }
}

fn invalid(key: &str, value: &Value, reason: &str) -> OrbitalError {
    OrbitalError::InvalidParameter {
        name: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Row indices of a train / test partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded shuffle, then the first `ceil(test_fraction * n)` rows go to test.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Result<TrainTestSplit> {
    if n < 2 {
        return Err(OrbitalError::TrainingError(format!(
            "need at least 2 rows to split, got {}",
            n
        )));
    }
    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(OrbitalError::TrainingError(format!(
            "test fraction {} leaves an empty split for {} rows",
            test_fraction, n
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let train = indices.split_off(n_test);
    Ok(TrainTestSplit { train, test: indices })
}

/// Held-out rows, in split order
#[derive(Debug, Clone)]
pub struct HeldOut {
    pub x: Array2<f64>,
    pub labels: Vec<Label>,
}

/// Output of one dispatch
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub model: TrainedModel,
    pub held_out: HeldOut,
    pub n_train: usize,
}

/// Routes a training request to one of the boosted-tree backends
#[derive(Debug, Clone)]
pub struct TrainingDispatcher {
    test_fraction: f64,
    seed: u64,
    early_stopping_rounds: usize,
}

impl Default for TrainingDispatcher {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl TrainingDispatcher {
    pub fn new(test_fraction: f64, seed: u64, early_stopping_rounds: usize) -> Self {
        Self {
            test_fraction,
            seed,
            early_stopping_rounds,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.test_fraction, config.random_seed, config.early_stopping_rounds)
    }

    pub fn train(
        &self,
        backend: Backend,
        hyperparams: &Hyperparameters,
        x: &Array2<f64>,
        labels: &[Label],
        feature_names: &[String],
    ) -> Result<DispatchResult> {
        if x.nrows() != labels.len() {
            return Err(OrbitalError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", labels.len()),
            });
        }
        if x.ncols() != feature_names.len() {
            return Err(OrbitalError::ShapeError {
                expected: format!("{} feature names", x.ncols()),
                actual: format!("{} feature names", feature_names.len()),
            });
        }

        let start = Instant::now();
        let split = train_test_split(x.nrows(), self.test_fraction, self.seed)?;

        let x_train = x.select(Axis(0), &split.train);
        let train_labels: Vec<Label> = split.train.iter().map(|&i| labels[i]).collect();
        let classes: Vec<Label> = train_labels
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let objective = Objective::for_classes(classes.len())?;
        let class_index = |label: &Label| classes.binary_search(label).ok();
        let y_train: Vec<usize> = train_labels.iter().filter_map(class_index).collect();

        let x_test = x.select(Axis(0), &split.test);
        let test_labels: Vec<Label> = split.test.iter().map(|&i| labels[i]).collect();

        // Test rows whose label never occurs in training cannot be scored by
        // the booster's own metrics; they stay in the held-out set
        let (eval_rows, y_eval): (Vec<usize>, Vec<usize>) = test_labels
            .iter()
            .enumerate()
            .filter_map(|(row, label)| class_index(label).map(|c| (row, c)))
            .unzip();
        if eval_rows.len() < test_labels.len() {
            warn!(
                excluded = test_labels.len() - eval_rows.len(),
                "held-out rows with labels unseen in training excluded from eval metrics"
            );
        }
        let x_eval = x_test.select(Axis(0), &eval_rows);
        let eval_sets = [
            EvalSet { x: &x_train, y: &y_train },
            EvalSet { x: &x_eval, y: &y_eval },
        ];

        let (booster, history) = match backend {
            Backend::XGBoost => self.fit_xgboost(hyperparams, objective, &x_train, &y_train, &eval_sets)?,
            Backend::LightGBM => {
                if *hyperparams != Hyperparameters::default() {
                    info!("lgbm trains with fixed settings; hyperparameters ignored");
                }
                self.fit_lightgbm(objective, &x_train, &y_train, &eval_sets)?
            }
        };

        let model = TrainedModel::new(backend, classes, feature_names.to_vec(), booster, history);
        info!(
            backend = %backend,
            n_train = split.train.len(),
            n_test = split.test.len(),
            n_classes = model.classes().len(),
            rounds = model.n_rounds(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "training complete"
        );

        Ok(DispatchResult {
            model,
            held_out: HeldOut { x: x_test, labels: test_labels },
            n_train: split.train.len(),
        })
    }

    fn fit_xgboost(
        &self,
        hyperparams: &Hyperparameters,
        objective: Objective,
        x: &Array2<f64>,
        y: &[usize],
        eval_sets: &[EvalSet<'_>],
    ) -> Result<(Booster, TrainingHistory)> {
        let config = XGBoostConfig {
            n_estimators: hyperparams.n_estimators,
            max_depth: hyperparams.max_depth,
            learning_rate: hyperparams.learning_rate,
            random_state: Some(self.seed),
            ..Default::default()
        };
        let mut booster = XGBoostClassifier::new(config, objective);
        booster.fit(x, y, eval_sets)?;
        let history = XGBoostHistory.normalize(booster.evals_result());
        Ok((Booster::XGBoost(booster), history))
    }

    fn fit_lightgbm(
        &self,
        objective: Objective,
        x: &Array2<f64>,
        y: &[usize],
        eval_sets: &[EvalSet<'_>],
    ) -> Result<(Booster, TrainingHistory)> {
        let config = LightGBMConfig {
            early_stopping_rounds: Some(self.early_stopping_rounds),
            random_state: Some(self.seed),
            ..Default::default()
        };
        let mut booster = LightGBMClassifier::new(config, objective);
        booster.fit(x, y, eval_sets)?;
        let history = LightGBMHistory.normalize(booster.evals_result());
        Ok((Booster::LightGBM(booster), history))
    }
}
