//! Held-out evaluation
//!
//! Accuracy and a confusion matrix for every model; for binary models also
//! the ROC curve and its area, computed from the positive-class probability.

use crate::error::Result;
use crate::schema::Label;
use crate::training::{HeldOut, TrainedModel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// K×K counts; rows are actual labels, columns predicted labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<Label>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Build over the sorted union of `classes` and the labels seen in
    /// `actual` / `predicted`.
    pub fn new(classes: &[Label], actual: &[Label], predicted: &[Label]) -> Self {
        let labels: Vec<Label> = classes
            .iter()
            .chain(actual)
            .chain(predicted)
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let k = labels.len();
        let mut counts = vec![vec![0usize; k]; k];
        for (a, p) in actual.iter().zip(predicted) {
            if let (Ok(r), Ok(c)) = (labels.binary_search(a), labels.binary_search(p)) {
                counts[r][c] += 1;
            }
        }
        Self { labels, counts }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn trace(&self) -> usize {
        (0..self.labels.len()).map(|i| self.counts[i][i]).sum()
    }

    /// Number of rows whose actual label is each of `labels`.
    pub fn row_sums(&self) -> Vec<usize> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.trace() as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RocPoint {
    pub fpr: f64,
    pub tpr: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocCurve {
    pub positive_label: Label,
    pub points: Vec<RocPoint>,
    pub auc: f64,
}

impl RocCurve {
    /// One point per distinct score, descending, preceded by `(0, 0)` at an
    /// infinite threshold. `None` unless both classes occur.
    pub fn compute(positive_label: Label, is_positive: &[bool], scores: &[f64]) -> Option<Self> {
        let n_pos = is_positive.iter().filter(|&&p| p).count();
        let n_neg = is_positive.len() - n_pos;
        if n_pos == 0 || n_neg == 0 || scores.len() != is_positive.len() {
            return None;
        }

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let mut points = vec![RocPoint { fpr: 0.0, tpr: 0.0, threshold: f64::INFINITY }];
        let (mut tp, mut fp) = (0usize, 0usize);
        for (pos, &i) in order.iter().enumerate() {
            if is_positive[i] {
                tp += 1;
            } else {
                fp += 1;
            }
            let last_of_score = order
                .get(pos + 1)
                .map_or(true, |&next| scores[next] != scores[i]);
            if last_of_score {
                points.push(RocPoint {
                    fpr: fp as f64 / n_neg as f64,
                    tpr: tp as f64 / n_pos as f64,
                    threshold: scores[i],
                });
            }
        }

        let auc = points
            .windows(2)
            .map(|w| (w[1].fpr - w[0].fpr) * (w[1].tpr + w[0].tpr) / 2.0)
            .sum();
        Some(Self { positive_label, points, auc })
    }
}

/// Metrics of one model on its held-out split
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub roc: Option<RocCurve>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn evaluate(&self, model: &TrainedModel, held_out: &HeldOut) -> Result<EvaluationReport> {
        let predicted = model.predict(&held_out.x)?;
        let confusion_matrix = ConfusionMatrix::new(model.classes(), &held_out.labels, &predicted);
        let accuracy = confusion_matrix.accuracy();

        let roc = match model.classes() {
            &[negative, positive] => {
                let proba = model.predict_proba(&held_out.x)?;
                let (is_positive, scores): (Vec<bool>, Vec<f64>) = held_out
                    .labels
                    .iter()
                    .enumerate()
                    .filter(|(_, label)| **label == negative || **label == positive)
                    .map(|(i, label)| (*label == positive, proba[[i, 1]]))
                    .unzip();
                let roc = RocCurve::compute(positive, &is_positive, &scores);
                if roc.is_none() {
                    debug!("held-out split lacks a class; ROC omitted");
                }
                roc
            }
            _ => None,
        };

        Ok(EvaluationReport { accuracy, confusion_matrix, roc })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Label::*;

    #[test]
    fn test_confusion_matrix_counts() {
        let actual = [NotPlanet, NotPlanet, Confirmed, Confirmed, Confirmed];
        let predicted = [NotPlanet, Confirmed, Confirmed, Confirmed, NotPlanet];
        let cm = ConfusionMatrix::new(&[NotPlanet, Confirmed], &actual, &predicted);

        assert_eq!(cm.labels, vec![NotPlanet, Confirmed]);
        assert_eq!(cm.counts, vec![vec![1, 1], vec![1, 2]]);
        assert_eq!(cm.row_sums(), vec![2, 3]);
        assert_eq!(cm.total(), 5);
        assert!((cm.accuracy() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_confusion_matrix_includes_unseen_labels() {
        let cm = ConfusionMatrix::new(&[NotPlanet, Confirmed], &[Candidate], &[Confirmed]);
        assert_eq!(cm.labels, vec![NotPlanet, Candidate, Confirmed]);
        assert_eq!(cm.counts[1][2], 1);
        assert_eq!(cm.accuracy(), 0.0);
    }

    #[test]
    fn test_roc_perfect_separation() {
        let roc = RocCurve::compute(Confirmed, &[false, false, true, true], &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert!((roc.auc - 1.0).abs() < 1e-12);
        assert_eq!(roc.points[0].threshold, f64::INFINITY);
        assert_eq!((roc.points[0].fpr, roc.points[0].tpr), (0.0, 0.0));
        let last = roc.points.last().unwrap();
        assert_eq!((last.fpr, last.tpr), (1.0, 1.0));
    }

    #[test]
    fn test_roc_ties_collapse() {
        let roc = RocCurve::compute(Confirmed, &[false, true, false, true], &[0.5; 4]).unwrap();
        assert_eq!(roc.points.len(), 2);
        assert!((roc.auc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_roc_known_auc() {
        // sklearn: roc_auc_score([0, 0, 1, 1], [0.1, 0.4, 0.35, 0.8]) == 0.75
        let roc = RocCurve::compute(Confirmed, &[false, false, true, true], &[0.1, 0.4, 0.35, 0.8]).unwrap();
        assert!((roc.auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_roc_single_class_is_none() {
        assert!(RocCurve::compute(Confirmed, &[true, true], &[0.2, 0.9]).is_none());
    }
}
