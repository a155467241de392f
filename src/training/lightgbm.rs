//! LightGBM-style gradient boosting with leaf-wise tree growth
//!
//! Key differences from the XGBoost-style booster:
//! - Leaf-wise (best-first) tree growth bounded by `max_leaves` instead of level-wise
//! - `min_child_samples` instead of a hessian-based child constraint
//! - Optional early stopping on the first validation set's log-loss
//!
//! Eval sets are named like LightGBM does: the training matrix itself is
//! `training`, every other set `valid_{i}`; metrics are `binary_logloss` /
//! `binary_error` or `multi_logloss` / `multi_error`.

use super::early_stopping::EarlyStopping;
use super::history::EvalsResult;
use super::objective::{argmax, EvalSet, Objective};
use crate::error::{OrbitalError, Result};
use ndarray::{Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBMConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_leaves: usize,
    pub max_depth: Option<usize>,
    pub min_child_samples: usize,
    pub reg_lambda: f64,
    pub reg_alpha: f64,
    pub colsample_bytree: f64,
    /// Rounds without validation improvement before stopping
    pub early_stopping_rounds: Option<usize>,
    /// Log evaluation every n rounds
    pub log_period: usize,
    pub random_state: Option<u64>,
}

impl Default for LightGBMConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_leaves: 31,
            max_depth: None,
            min_child_samples: 20,
            reg_lambda: 0.0,
            reg_alpha: 0.0,
            colsample_bytree: 1.0,
            early_stopping_rounds: None,
            log_period: 10,
            random_state: Some(42),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum LGBNode {
    Leaf { value: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<LGBNode>,
        right: Box<LGBNode>,
    },
}

impl LGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            LGBNode::Leaf { value } => *value,
            LGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    fn count_splits(&self, counts: &mut [f64]) {
        if let LGBNode::Split { feature, left, right, .. } = self {
            if *feature < counts.len() {
                counts[*feature] += 1.0;
            }
            left.count_splits(counts);
            right.count_splits(counts);
        }
    }

    #[cfg(test)]
    fn n_leaves(&self) -> usize {
        match self {
            LGBNode::Leaf { .. } => 1,
            LGBNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

// ---- Tree building utilities ----

fn compute_leaf_weight(g: f64, h: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g.abs() <= alpha { 0.0 } else { g - alpha * g.signum() };
    -g_adj / (h + lambda)
}

fn compute_gain_single(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

fn make_leaf(gradients: &[f64], hessians: &[f64], indices: &[usize], lambda: f64, alpha: f64) -> LGBNode {
    let g: f64 = indices.iter().map(|&i| gradients[i]).sum();
    let h: f64 = indices.iter().map(|&i| hessians[i]).sum();
    LGBNode::Leaf { value: compute_leaf_weight(g, h, lambda, alpha) }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    left_indices: Vec<usize>,
    right_indices: Vec<usize>,
}

fn find_best_split_for_feature(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    feature: usize,
    config: &LightGBMConfig,
) -> Option<SplitCandidate> {
    let mut sorted: Vec<(usize, f64)> = indices.iter().map(|&i| (i, x[[i, feature]])).collect();
    if sorted.len() < 2 {
        return None;
    }
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

    let lambda = config.reg_lambda;
    let total_g: f64 = indices.iter().map(|&i| gradients[i]).sum();
    let total_h: f64 = indices.iter().map(|&i| hessians[i]).sum();
    let parent_score = compute_gain_single(total_g, total_h, lambda);

    let mut left_g = 0.0;
    let mut left_h = 0.0;
    let mut best: Option<(f64, f64, usize)> = None;

    for i in 0..sorted.len() - 1 {
        left_g += gradients[sorted[i].0];
        left_h += hessians[sorted[i].0];

        if i + 1 < config.min_child_samples || sorted.len() - i - 1 < config.min_child_samples {
            continue;
        }
        if sorted[i].1 == sorted[i + 1].1 {
            continue;
        }

        let right_g = total_g - left_g;
        let right_h = total_h - left_h;
        let gain = compute_gain_single(left_g, left_h, lambda)
            + compute_gain_single(right_g, right_h, lambda)
            - parent_score;

        if best.map_or(true, |(g, _, _)| gain > g) {
            best = Some((gain, (sorted[i].1 + sorted[i + 1].1) / 2.0, i + 1));
        }
    }

    let (gain, threshold, pos) = best?;
    if gain <= 0.0 {
        return None;
    }
    Some(SplitCandidate {
        feature,
        threshold,
        gain,
        left_indices: sorted[..pos].iter().map(|&(i, _)| i).collect(),
        right_indices: sorted[pos..].iter().map(|&(i, _)| i).collect(),
    })
}

fn best_split(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    feature_indices: &[usize],
    config: &LightGBMConfig,
) -> Option<SplitCandidate> {
    feature_indices
        .par_iter()
        .filter_map(|&f| find_best_split_for_feature(x, gradients, hessians, indices, f, config))
        .max_by(|a, b| a.gain.partial_cmp(&b.gain).unwrap_or(Ordering::Equal))
}

struct PendingSplit {
    node_id: usize,
    split: SplitCandidate,
}

impl PartialEq for PendingSplit {
    fn eq(&self, other: &Self) -> bool {
        self.split.gain == other.split.gain
    }
}
impl Eq for PendingSplit {}
impl PartialOrd for PendingSplit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PendingSplit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.split.gain.total_cmp(&other.split.gain)
    }
}

enum NodeSlot {
    Leaf(Vec<usize>),
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

/// Build a tree using the leaf-wise (best-first) strategy
fn build_lgb_tree(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    feature_indices: &[usize],
    config: &LightGBMConfig,
) -> LGBNode {
    if indices.len() < config.min_child_samples * 2 {
        return make_leaf(gradients, hessians, indices, config.reg_lambda, config.reg_alpha);
    }

    let max_depth_limit = config.max_depth.unwrap_or(usize::MAX);
    let mut nodes: Vec<NodeSlot> = vec![NodeSlot::Leaf(indices.to_vec())];
    let mut depths: Vec<usize> = vec![0];
    let mut heap: BinaryHeap<PendingSplit> = BinaryHeap::new();

    if max_depth_limit > 0 {
        if let Some(split) = best_split(x, gradients, hessians, indices, feature_indices, config) {
            heap.push(PendingSplit { node_id: 0, split });
        }
    }

    let mut n_leaves = 1usize;
    while n_leaves < config.max_leaves {
        let Some(PendingSplit { node_id, split }) = heap.pop() else {
            break;
        };

        let depth = depths[node_id];
        let left_id = nodes.len();
        let right_id = left_id + 1;
        nodes[node_id] = NodeSlot::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_id,
            right: right_id,
        };
        nodes.push(NodeSlot::Leaf(split.left_indices.clone()));
        nodes.push(NodeSlot::Leaf(split.right_indices.clone()));
        depths.push(depth + 1);
        depths.push(depth + 1);
        n_leaves += 1;

        if depth + 1 >= max_depth_limit {
            continue;
        }
        for (child_id, child_indices) in [(left_id, &split.left_indices), (right_id, &split.right_indices)] {
            if child_indices.len() < config.min_child_samples * 2 {
                continue;
            }
            if let Some(child) = best_split(x, gradients, hessians, child_indices, feature_indices, config) {
                heap.push(PendingSplit { node_id: child_id, split: child });
            }
        }
    }

    fn to_node(nodes: &[NodeSlot], idx: usize, g: &[f64], h: &[f64], lam: f64, alpha: f64) -> LGBNode {
        match &nodes[idx] {
            NodeSlot::Leaf(indices) => make_leaf(g, h, indices, lam, alpha),
            NodeSlot::Split { feature, threshold, left, right } => LGBNode::Split {
                feature: *feature,
                threshold: *threshold,
                left: Box::new(to_node(nodes, *left, g, h, lam, alpha)),
                right: Box::new(to_node(nodes, *right, g, h, lam, alpha)),
            },
        }
    }
    to_node(&nodes, 0, gradients, hessians, config.reg_lambda, config.reg_alpha)
}

// ============ LightGBM Classifier ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBMClassifier {
    pub config: LightGBMConfig,
    objective: Objective,
    /// rounds × outputs
    trees: Vec<Vec<LGBNode>>,
    base_scores: Vec<f64>,
    n_features: usize,
    best_iteration: Option<usize>,
    evals_result: EvalsResult,
}

impl LightGBMClassifier {
    pub fn new(config: LightGBMConfig, objective: Objective) -> Self {
        Self {
            config,
            objective,
            trees: Vec::new(),
            base_scores: Vec::new(),
            n_features: 0,
            best_iteration: None,
            evals_result: EvalsResult::default(),
        }
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Boosting rounds kept in the model.
    pub fn n_rounds(&self) -> usize {
        self.trees.len()
    }

    /// One-based best round when early stopping was active.
    pub fn best_iteration(&self) -> Option<usize> {
        self.best_iteration
    }

    pub fn evals_result(&self) -> &EvalsResult {
        &self.evals_result
    }

    /// Split-count importances over the kept trees, normalized to sum to one
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

    #[cfg(test)]
    fn total_leaves(&self) -> usize {
        self.trees.iter().flatten().map(LGBNode::n_leaves).sum()
    }

    fn metric_names(&self) -> (&'static str, &'static str) {
        if self.objective.is_multiclass() {
            ("multi_logloss", "multi_error")
        } else {
            ("binary_logloss", "binary_error")
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &[usize], eval_sets: &[EvalSet<'_>]) -> Result<()> {
        let n = x.nrows();
        if n == 0 {
            return Err(OrbitalError::TrainingError("Empty dataset".into()));
        }
        if y.len() != n {
            return Err(OrbitalError::ShapeError {
                expected: format!("{} labels", n),
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

        self.n_features = x.ncols();
        self.trees.clear();
        self.best_iteration = None;
        self.evals_result = EvalsResult::default();
        self.base_scores = self.objective.initial_scores(y);

        let names: Vec<String> = eval_sets
            .iter()
            .enumerate()
            .map(|(i, set)| {
                if std::ptr::eq(set.x, x) {
                    "training".to_string()
                } else {
                    format!("valid_{}", i)
                }
            })
            .collect();
        // Early stopping watches the first set that is not the training data
        let monitored = names.iter().position(|n| n != "training");
        let mut stopper = match (self.config.early_stopping_rounds, monitored) {
            (Some(patience), Some(_)) => Some(EarlyStopping::new(patience)),
            _ => None,
        };

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));
        let n_outputs = self.objective.n_outputs();
        let lr = self.config.learning_rate;
        let mut raw = self.initial_raw(n);
        let mut eval_raw: Vec<Array2<f64>> =
            eval_sets.iter().map(|s| self.initial_raw(s.x.nrows())).collect();
        let (loss_name, error_name) = self.metric_names();

        for round in 0..self.config.n_estimators {
            let (grad, hess) = self.objective.gradients(&raw, y);
            let indices: Vec<usize> = (0..n).collect();
            let features = sample_features(&mut rng, self.n_features, self.config.colsample_bytree);

            let round_trees: Vec<LGBNode> = (0..n_outputs)
                .map(|k| {
                    let g = grad.column(k).to_vec();
                    let h = hess.column(k).to_vec();
                    build_lgb_tree(x, &g, &h, &indices, &features, &self.config)
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

            let mut monitored_loss = None;
            for (idx, (set, r)) in eval_sets.iter().zip(&eval_raw).enumerate() {
                let loss = self.objective.logloss(r, set.y);
                self.evals_result.record(&names[idx], loss_name, loss);
                self.evals_result.record(&names[idx], error_name, self.objective.error(r, set.y));
                if Some(idx) == monitored {
                    monitored_loss = Some(loss);
                }
            }

            if self.config.log_period > 0 && (round + 1) % self.config.log_period == 0 {
                debug!(round = round + 1, loss = ?monitored_loss, "lightgbm round");
            }

            if let (Some(stopper), Some(loss)) = (stopper.as_mut(), monitored_loss) {
                if stopper.should_stop(loss) {
                    info!(
                        round = round + 1,
                        best_iteration = stopper.best_round() + 1,
                        "early stopping"
                    );
                    break;
                }
            }
        }

        if let Some(stopper) = stopper {
            let best = stopper.best_round() + 1;
            self.trees.truncate(best);
            self.best_iteration = Some(best);
        }

        Ok(())
    }

    fn initial_raw(&self, n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, self.objective.n_outputs()), |(_, k)| self.base_scores[k])
    }

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
        let lr = self.config.learning_rate;
        let mut raw = self.initial_raw(x.nrows());
        for (i, row) in x.rows().into_iter().enumerate() {
            for round in &self.trees {
                for (k, tree) in round.iter().enumerate() {
                    raw[[i, k]] += lr * tree.predict(row);
                }
            }
        }
        Ok(raw)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(self.objective.probabilities(&self.predict_raw(x)?))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.rows().into_iter().map(|r| argmax(r.iter().copied())).collect())
    }
}

fn sample_features(rng: &mut Xoshiro256PlusPlus, n_features: usize, ratio: f64) -> Vec<usize> {
    let mut features: Vec<usize> = (0..n_features).collect();
    if ratio < 1.0 {
        let k = ((n_features as f64 * ratio).ceil() as usize).max(1);
        features.shuffle(rng);
        features.truncate(k);
        features.sort_unstable();
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_classification_data() -> (Array2<f64>, Vec<usize>) {
        let x = Array2::from_shape_vec((100, 2), (0..200).map(|i| (i as f64) / 100.0).collect()).unwrap();
        let y = (0..100).map(|i| if i < 50 { 0 } else { 1 }).collect();
        (x, y)
    }

    fn small_config() -> LightGBMConfig {
        LightGBMConfig { n_estimators: 30, max_leaves: 8, min_child_samples: 2, ..Default::default() }
    }

    #[test]
    fn test_lightgbm_classifier() {
        let (x, y) = make_classification_data();
        let mut model = LightGBMClassifier::new(small_config(), Objective::BinaryLogistic);
        model.fit(&x, &y, &[]).unwrap();
        let preds = model.predict(&x).unwrap();
        let acc = preds.iter().zip(&y).filter(|(p, t)| p == t).count() as f64 / 100.0;
        assert!(acc > 0.9, "Accuracy too low: {}", acc);
    }

    #[test]
    fn test_lightgbm_predict_proba() {
        let (x, y) = make_classification_data();
        let mut model = LightGBMClassifier::new(small_config(), Objective::BinaryLogistic);
        model.fit(&x, &y, &[]).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 2);
        for i in 0..proba.nrows() {
            assert!((proba[[i, 0]] + proba[[i, 1]] - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_lightgbm_multiclass() {
        let x = Array2::from_shape_vec((90, 1), (0..90).map(|i| i as f64).collect()).unwrap();
        let y: Vec<usize> = (0..90).map(|i| i / 30).collect();
        let mut model = LightGBMClassifier::new(small_config(), Objective::MultiSoftmax { n_classes: 3 });
        model.fit(&x, &y, &[]).unwrap();
        let preds = model.predict(&x).unwrap();
        let acc = preds.iter().zip(&y).filter(|(p, t)| p == t).count() as f64 / 90.0;
        assert!(acc > 0.9, "Accuracy too low: {}", acc);
        assert_eq!(model.predict_proba(&x).unwrap().ncols(), 3);
    }

    #[test]
    fn test_lightgbm_native_history_names() {
        let (x, y) = make_classification_data();
        let x_valid = x.slice(ndarray::s![..20, ..]).to_owned();
        let y_valid = y[..20].to_vec();
        let mut model = LightGBMClassifier::new(small_config(), Objective::BinaryLogistic);
        model
            .fit(&x, &y, &[EvalSet { x: &x, y: &y }, EvalSet { x: &x_valid, y: &y_valid }])
            .unwrap();

        let sets: Vec<&str> = model.evals_result().sets().collect();
        assert_eq!(sets, vec!["training", "valid_1"]);
        assert!(model.evals_result().get("valid_1", "binary_logloss").is_some());
        assert!(model.evals_result().get("training", "binary_error").is_some());
    }

    #[test]
    fn test_lightgbm_early_stopping_truncates() {
        // Validation labels are inverted so its loss only worsens
        let (x, y) = make_classification_data();
        let y_flipped: Vec<usize> = y.iter().map(|&c| 1 - c).collect();
        let x_valid = x.clone();
        let config = LightGBMConfig { early_stopping_rounds: Some(5), ..small_config() };
        let mut model = LightGBMClassifier::new(config, Objective::BinaryLogistic);
        model
            .fit(&x, &y, &[EvalSet { x: &x, y: &y }, EvalSet { x: &x_valid, y: &y_flipped }])
            .unwrap();

        assert_eq!(model.best_iteration(), Some(1));
        assert_eq!(model.n_rounds(), 1);
        // Stops after patience rounds past the best one
        assert_eq!(model.evals_result().get("valid_1", "binary_logloss").unwrap().len(), 6);
    }

    #[test]
    fn test_lightgbm_respects_max_leaves() {
        let (x, y) = make_classification_data();
        let config = LightGBMConfig { n_estimators: 3, max_leaves: 4, min_child_samples: 2, ..Default::default() };
        let mut model = LightGBMClassifier::new(config, Objective::BinaryLogistic);
        model.fit(&x, &y, &[]).unwrap();
        assert!(model.total_leaves() <= 3 * 4);
    }

    #[test]
    fn test_lightgbm_importances_follow_informative_feature() {
        let (x, y) = make_classification_data();
        let mut model = LightGBMClassifier::new(small_config(), Objective::BinaryLogistic);
        model.fit(&x, &y, &[]).unwrap();
        let importances = model.feature_importances().unwrap();
        assert_eq!(importances.len(), x.ncols());
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}
