//! Classification objectives shared by both boosters
//!
//! Raw margins are stored as an `n × n_outputs` matrix: one column for the
//! binary logistic objective, one per class for softmax.

use crate::error::{OrbitalError, Result};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

const MIN_HESSIAN: f64 = 1e-16;
const PROB_EPS: f64 = 1e-15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    BinaryLogistic,
    MultiSoftmax { n_classes: usize },
}

/// Labelled rows a booster reports metrics on every round
#[derive(Debug, Clone, Copy)]
pub struct EvalSet<'a> {
    pub x: &'a Array2<f64>,
    pub y: &'a [usize],
}

impl Objective {
    /// Binary for two classes, softmax above that.
    pub fn for_classes(n_classes: usize) -> Result<Self> {
        match n_classes {
            0 | 1 => Err(OrbitalError::TrainingError(format!(
                "need at least two classes to train, found {}",
                n_classes
            ))),
            2 => Ok(Objective::BinaryLogistic),
            n => Ok(Objective::MultiSoftmax { n_classes: n }),
        }
    }

    pub fn n_classes(&self) -> usize {
        match self {
            Objective::BinaryLogistic => 2,
            Objective::MultiSoftmax { n_classes } => *n_classes,
        }
    }

    /// Trees grown per boosting round.
    pub fn n_outputs(&self) -> usize {
        match self {
            Objective::BinaryLogistic => 1,
            Objective::MultiSoftmax { n_classes } => *n_classes,
        }
    }

    pub fn is_multiclass(&self) -> bool {
        matches!(self, Objective::MultiSoftmax { .. })
    }

    /// Starting margins: log-odds of the positive rate, or log class priors.
    pub fn initial_scores(&self, y: &[usize]) -> Vec<f64> {
        let n = y.len().max(1) as f64;
        match self {
            Objective::BinaryLogistic => {
                let p = (y.iter().filter(|&&c| c == 1).count() as f64 / n).clamp(1e-7, 1.0 - 1e-7);
                vec![(p / (1.0 - p)).ln()]
            }
            Objective::MultiSoftmax { n_classes } => (0..*n_classes)
                .map(|k| {
                    let prior = y.iter().filter(|&&c| c == k).count() as f64 / n;
                    prior.max(1e-7).ln()
                })
                .collect(),
        }
    }

    /// First and second derivatives of the log-loss w.r.t. each margin.
    pub fn gradients(&self, raw: &Array2<f64>, y: &[usize]) -> (Array2<f64>, Array2<f64>) {
        let probs = self.outputs(raw.view());
        let mut grad = Array2::zeros(raw.raw_dim());
        let mut hess = Array2::zeros(raw.raw_dim());

        for (i, &class) in y.iter().enumerate() {
            for k in 0..self.n_outputs() {
                let (p, target) = match self {
                    Objective::BinaryLogistic => (probs[[i, 0]], if class == 1 { 1.0 } else { 0.0 }),
                    Objective::MultiSoftmax { .. } => {
                        (probs[[i, k]], if class == k { 1.0 } else { 0.0 })
                    }
                };
                grad[[i, k]] = p - target;
                hess[[i, k]] = (p * (1.0 - p)).max(MIN_HESSIAN);
            }
        }
        (grad, hess)
    }

    /// Class probabilities, always `n × n_classes`.
    pub fn probabilities(&self, raw: &Array2<f64>) -> Array2<f64> {
        match self {
            Objective::BinaryLogistic => {
                let mut proba = Array2::zeros((raw.nrows(), 2));
                for i in 0..raw.nrows() {
                    let p = sigmoid(raw[[i, 0]]);
                    proba[[i, 0]] = 1.0 - p;
                    proba[[i, 1]] = p;
                }
                proba
            }
            Objective::MultiSoftmax { .. } => self.outputs(raw.view()),
        }
    }

    /// Mean negative log-likelihood of the true class.
    pub fn logloss(&self, raw: &Array2<f64>, y: &[usize]) -> f64 {
        if y.is_empty() {
            return 0.0;
        }
        let proba = self.probabilities(raw);
        let total: f64 = y
            .iter()
            .enumerate()
            .map(|(i, &c)| -proba[[i, c]].clamp(PROB_EPS, 1.0 - PROB_EPS).ln())
            .sum();
        total / y.len() as f64
    }

    /// Fraction of rows whose most probable class is wrong.
    pub fn error(&self, raw: &Array2<f64>, y: &[usize]) -> f64 {
        if y.is_empty() {
            return 0.0;
        }
        let proba = self.probabilities(raw);
        let wrong = y
            .iter()
            .enumerate()
            .filter(|&(i, &c)| argmax(proba.row(i).iter().copied()) != c)
            .count();
        wrong as f64 / y.len() as f64
    }

    // Per-output link: sigmoid column, or row softmax.
    fn outputs(&self, raw: ArrayView2<f64>) -> Array2<f64> {
        match self {
            Objective::BinaryLogistic => raw.mapv(sigmoid),
            Objective::MultiSoftmax { .. } => {
                let mut out = raw.to_owned();
                for mut row in out.rows_mut() {
                    let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    row.mapv_inplace(|v| (v - max).exp());
                    let sum: f64 = row.sum();
                    row.mapv_inplace(|v| v / sum);
                }
                out
            }
        }
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Index of the largest value; ties resolve to the lowest index.
pub fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, v) in values.enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_for_classes() {
        assert!(Objective::for_classes(1).is_err());
        assert_eq!(Objective::for_classes(2).unwrap(), Objective::BinaryLogistic);
        assert_eq!(
            Objective::for_classes(3).unwrap(),
            Objective::MultiSoftmax { n_classes: 3 }
        );
    }

    #[test]
    fn test_binary_gradients() {
        let obj = Objective::BinaryLogistic;
        let raw = array![[0.0], [0.0]];
        let (g, h) = obj.gradients(&raw, &[1, 0]);
        assert!((g[[0, 0]] + 0.5).abs() < 1e-12);
        assert!((g[[1, 0]] - 0.5).abs() < 1e-12);
        assert!((h[[0, 0]] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let obj = Objective::MultiSoftmax { n_classes: 3 };
        let raw = array![[1.0, 2.0, 3.0], [1000.0, 0.0, -1000.0]];
        let p = obj.probabilities(&raw);
        for row in p.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert!(p[[1, 0]] > 0.999);
    }

    #[test]
    fn test_logloss_and_error() {
        let obj = Objective::BinaryLogistic;
        let raw = array![[0.0], [0.0]];
        assert!((obj.logloss(&raw, &[0, 1]) - 2.0f64.ln()).abs() < 1e-12);

        let raw = array![[5.0], [-5.0], [5.0]];
        assert!((obj.error(&raw, &[1, 0, 0]) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_initial_scores() {
        let scores = Objective::BinaryLogistic.initial_scores(&[0, 1, 1, 1]);
        assert!((scores[0] - 3.0f64.ln()).abs() < 1e-12);

        let scores = Objective::MultiSoftmax { n_classes: 3 }.initial_scores(&[0, 1, 1, 2]);
        assert_eq!(scores.len(), 3);
        assert!((scores[1] - 0.5f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_argmax_ties() {
        assert_eq!(argmax([0.5, 0.5].into_iter()), 0);
        assert_eq!(argmax([0.1, 0.7, 0.2].into_iter()), 1);
    }
}
