//! XGBoost-style gradient boosting with second-order approximation
//!
//! - Uses both gradient (first derivative) and hessian (second derivative) of loss
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Level-wise growth bounded by `max_depth`
//! - One tree per round for the logistic objective, one per class for softmax
//!
//! Metrics are recorded every round for each eval set under XGBoost's native
//! names (`validation_{i}` × `logloss`/`error` or `mlogloss`/`merror`).

use super::history::EvalsResult;
use super::objective::{EvalSet, Objective};
use crate::error::{OrbitalError, Result};
use ndarray::{Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    fn count_splits(&self, counts: &mut [f64]) {
        if let XGBNode::Split { feature, left, right, .. } = self {
            if *feature < counts.len() {
                counts[*feature] += 1.0;
            }
            left.count_splits(counts);
            right.count_splits(counts);
        }
    }
}

/// Build an XGBoost tree using exact greedy split finding
fn build_xgb_tree(
    x: &Array2<f64>,
    grad: &[f64],
    hess: &[f64],
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> XGBNode {
    let n = indices.len();

    let g_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| hess[i]).sum();

    let leaf_weight = compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha);

    if depth >= config.max_depth || n < 2 || h_sum < config.min_child_weight {
        return XGBNode::Leaf { weight: leaf_weight };
    }

    // Parallel over candidate features
    let best_split = feature_indices
        .par_iter()
        .filter_map(|&f| find_best_split_for_feature(x, grad, hess, indices, f, config))
        .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

    match best_split {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return XGBNode::Leaf { weight: leaf_weight };
            }

            let left = build_xgb_tree(x, grad, hess, &left_idx, feature_indices, depth + 1, config);
            let right = build_xgb_tree(x, grad, hess, &right_idx, feature_indices, depth + 1, config);

            XGBNode::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => XGBNode::Leaf { weight: leaf_weight },
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if alpha <= 0.0 {
        g_sum
    } else if g_sum > alpha {
        g_sum - alpha
    } else if g_sum < -alpha {
        g_sum + alpha
    } else {
        return 0.0;
    };
    -g_adj / (h_sum + lambda)
}

/// Best (feature, threshold, gain) for one feature, exact greedy
fn find_best_split_for_feature(
    x: &Array2<f64>,
    grad: &[f64],
    hess: &[f64],
    indices: &[usize],
    feature: usize,
    config: &XGBoostConfig,
) -> Option<(usize, f64, f64)> {
    let mut sorted: Vec<usize> = indices.to_vec();
    sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

    let g_total: f64 = sorted.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = sorted.iter().map(|&i| hess[i]).sum();
    let lambda = config.reg_lambda;

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<(f64, f64)> = None;

    for pos in 0..sorted.len().saturating_sub(1) {
        let idx = sorted[pos];
        let next = sorted[pos + 1];
        g_left += grad[idx];
        h_left += hess[idx];

        // No threshold separates identical values
        if (x[[idx, feature]] - x[[next, feature]]).abs() < 1e-12 {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                - (g_total * g_total) / (h_total + lambda));

        if best.map_or(true, |(_, g)| gain > g) {
            let threshold = (x[[idx, feature]] + x[[next, feature]]) / 2.0;
            best = Some((threshold, gain));
        }
    }

    best.map(|(threshold, gain)| (feature, threshold, gain))
}

// ─── XGBoost Classifier ────────────────────────────────────────────────────

/// XGBoost classifier over class indices `0..n_classes`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    config: XGBoostConfig,
    objective: Objective,
    /// rounds × outputs
    trees: Vec<Vec<XGBNode>>,
    base_scores: Vec<f64>,
    n_features: usize,
    evals_result: EvalsResult,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig, objective: Objective) -> Self {
        Self {
            config,
            objective,
            trees: Vec::new(),
            base_scores: Vec::new(),
            n_features: 0,
            evals_result: EvalsResult::default(),
        }
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn n_rounds(&self) -> usize {
        self.trees.len()
    }

    /// Metrics recorded during the last `fit`, native naming.
    pub fn evals_result(&self) -> &EvalsResult {
        &self.evals_result
    }

    fn metric_names(&self) -> (&'static str, &'static str) {
        if self.objective.is_multiclass() {
            ("mlogloss", "merror")
        } else {
            ("logloss", "error")
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &[usize], eval_sets: &[EvalSet<'_>]) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples == 0 {
            return Err(OrbitalError::TrainingError("Empty dataset".into()));
        }
        if y.len() != n_samples {
            return Err(OrbitalError::ShapeError {
                expected: format!("{} labels", n_samples),
                actual: format!("{} labels", y.len()),
            });
        }
        let n_classes = self.objective.n_classes();
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(OrbitalError::TrainingError(format!(
                "class index {} out of range for {} classes",
                bad, n_classes
            )));
        }

        self.n_features = n_features;
        self.trees.clear();
        self.evals_result = EvalsResult::default();
        self.base_scores = self.objective.initial_scores(y);

        let n_outputs = self.objective.n_outputs();
        let lr = self.config.learning_rate;
        let mut raw = self.initial_raw(n_samples);
        let mut eval_raw: Vec<Array2<f64>> =
            eval_sets.iter().map(|s| self.initial_raw(s.x.nrows())).collect();

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        let (loss_name, error_name) = self.metric_names();

        for round in 0..self.config.n_estimators {
            let (grad, hess) = self.objective.gradients(&raw, y);

            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let round_trees: Vec<XGBNode> = (0..n_outputs)
                .map(|k| {
                    let g = grad.column(k).to_vec();
                    let h = hess.column(k).to_vec();
                    build_xgb_tree(x, &g, &h, &row_indices, &col_indices, 0, &self.config)
                })
                .collect();

            for (k, tree) in round_trees.iter().enumerate() {
                for (i, row) in x.rows().into_iter().enumerate() {
                    raw[[i, k]] += lr * tree.predict(row);
                }
                for (set, r) in eval_sets.iter().zip(eval_raw.iter_mut()) {
                    for (i, row) in set.x.rows().into_iter().enumerate() {
                        r[[i, k]] += lr * tree.predict(row);
                    }
                }
            }
            self.trees.push(round_trees);

            for (idx, (set, r)) in eval_sets.iter().zip(&eval_raw).enumerate() {
                let name = format!("validation_{}", idx);
                let loss = self.objective.logloss(r, set.y);
                self.evals_result.record(&name, loss_name, loss);
                self.evals_result.record(&name, error_name, self.objective.error(r, set.y));
                if round % 10 == 0 {
                    debug!(round, set = %name, loss, "xgboost round");
                }
            }
        }

        Ok(())
    }

    fn initial_raw(&self, n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, self.objective.n_outputs()), |(_, k)| self.base_scores[k])
    }

    /// Raw margins, `n × n_outputs`
    pub fn predict_raw(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() || self.base_scores.is_empty() {
            return Err(OrbitalError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(OrbitalError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let mut raw = self.initial_raw(x.nrows());
        let lr = self.config.learning_rate;
        for (i, row) in x.rows().into_iter().enumerate() {
            for round in &self.trees {
                for (k, tree) in round.iter().enumerate() {
                    raw[[i, k]] += lr * tree.predict(row);
                }
            }
        }
        Ok(raw)
    }

    /// Class probabilities, `n × n_classes`
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(self.objective.probabilities(&self.predict_raw(x)?))
    }

    /// Most probable class index per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|r| super::objective::argmax(r.iter().copied()))
            .collect())
    }

    /// Split-count importances, normalized to sum to one
    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        if self.n_features == 0 {
            return None;
        }
        let mut counts = vec![0.0f64; self.n_features];
        for tree in self.trees.iter().flatten() {
            tree.count_splits(&mut counts);
        }
        let total: f64 = counts.iter().sum();
        if total > 0.0 {
            counts.iter_mut().for_each(|c| *c /= total);
        }
        Some(counts)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).max(1);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::history::{HistoryAdapter, XGBoostHistory};

    fn accuracy(model: &XGBoostClassifier, x: &Array2<f64>, y: &[usize]) -> f64 {
        let preds = model.predict(x).unwrap();
        preds.iter().zip(y).filter(|(p, a)| p == a).count() as f64 / y.len() as f64
    }

    fn binary_data() -> (Array2<f64>, Vec<usize>) {
        let x = Array2::from_shape_vec((50, 2), (0..100).map(|i| i as f64 * 0.1).collect()).unwrap();
        let y = x
            .rows()
            .into_iter()
            .map(|r| if r[0] + r[1] > 5.0 { 1 } else { 0 })
            .collect();
        (x, y)
    }

    fn three_class_data() -> (Array2<f64>, Vec<usize>) {
        let x = Array2::from_shape_vec((60, 1), (0..60).map(|i| i as f64).collect()).unwrap();
        let y = (0..60).map(|i| i / 20).collect();
        (x, y)
    }

    #[test]
    fn test_xgboost_binary() {
        let (x, y) = binary_data();
        let mut model = XGBoostClassifier::new(
            XGBoostConfig { n_estimators: 50, max_depth: 4, ..Default::default() },
            Objective::BinaryLogistic,
        );
        model.fit(&x, &y, &[]).unwrap();
        let acc = accuracy(&model, &x, &y);
        assert!(acc >= 0.9, "XGBoost binary accuracy = {}", acc);
    }

    #[test]
    fn test_xgboost_multiclass() {
        let (x, y) = three_class_data();
        let mut model = XGBoostClassifier::new(
            XGBoostConfig { n_estimators: 30, ..Default::default() },
            Objective::MultiSoftmax { n_classes: 3 },
        );
        model.fit(&x, &y, &[]).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.shape(), &[60, 3]);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert!(accuracy(&model, &x, &y) >= 0.9);
    }

    #[test]
    fn test_xgboost_records_native_history() {
        let (x, y) = binary_data();
        let mut model = XGBoostClassifier::new(
            XGBoostConfig { n_estimators: 12, ..Default::default() },
            Objective::BinaryLogistic,
        );
        let eval = [EvalSet { x: &x, y: &y }, EvalSet { x: &x, y: &y }];
        model.fit(&x, &y, &eval).unwrap();

        let native = model.evals_result();
        assert_eq!(native.get("validation_0", "logloss").unwrap().len(), 12);
        assert_eq!(native.get("validation_1", "error").unwrap().len(), 12);

        let losses = native.get("validation_0", "logloss").unwrap();
        assert!(losses[11] < losses[0]);

        let history = XGBoostHistory.normalize(native);
        assert_eq!(history.rounds(), 12);
    }

    #[test]
    fn test_xgboost_constant_features_make_single_leaf() {
        let x = Array2::from_elem((20, 3), 1.0);
        let y: Vec<usize> = (0..20).map(|i| i % 2).collect();
        let mut model = XGBoostClassifier::new(XGBoostConfig::default(), Objective::BinaryLogistic);
        model.fit(&x, &y, &[]).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.column(1).iter().all(|&p| (p - 0.5).abs() < 1e-9));
        assert_eq!(model.feature_importances().unwrap(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_xgboost_rejects_bad_labels() {
        let (x, _) = binary_data();
        let y = vec![2; 50];
        let mut model = XGBoostClassifier::new(XGBoostConfig::default(), Objective::BinaryLogistic);
        assert!(model.fit(&x, &y, &[]).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let model = XGBoostClassifier::new(XGBoostConfig::default(), Objective::BinaryLogistic);
        let x = Array2::zeros((2, 2));
        assert!(matches!(model.predict(&x), Err(OrbitalError::ModelNotFitted)));
    }
}
