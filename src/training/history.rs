//! Training histories
//!
//! Each booster records metrics in its own native layout
//! ([`EvalsResult`], keyed the way the respective library names eval sets and
//! metrics). A [`HistoryAdapter`] per backend maps that layout onto the
//! backend-neutral [`TrainingHistory`]:
//!
//! ```text
//! { "train":      { "logloss": [..], "error": [..] },
//!   "validation": { "logloss": [..], "error": [..] } }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

type SplitMetrics = BTreeMap<String, BTreeMap<String, Vec<f64>>>;

pub const TRAIN_SPLIT: &str = "train";
pub const VALIDATION_SPLIT: &str = "validation";
pub const LOGLOSS: &str = "logloss";
pub const ERROR: &str = "error";

/// Per-iteration metrics in a booster's native naming
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvalsResult(SplitMetrics);

impl EvalsResult {
    pub fn record(&mut self, set: &str, metric: &str, value: f64) {
        self.0
            .entry(set.to_string())
            .or_default()
            .entry(metric.to_string())
            .or_default()
            .push(value);
    }

    pub fn get(&self, set: &str, metric: &str) -> Option<&[f64]> {
        self.0.get(set)?.get(metric).map(Vec::as_slice)
    }

    pub fn sets(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Drop every value past the first `rounds` iterations.
    pub fn truncate(&mut self, rounds: usize) {
        for metrics in self.0.values_mut() {
            for values in metrics.values_mut() {
                values.truncate(rounds);
            }
        }
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &str, &[f64])> {
        self.0.iter().flat_map(|(set, metrics)| {
            metrics
                .iter()
                .map(move |(metric, values)| (set.as_str(), metric.as_str(), values.as_slice()))
        })
    }
}

/// Backend-neutral history: split -> metric -> per-iteration values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainingHistory(SplitMetrics);

impl TrainingHistory {
    pub fn get(&self, split: &str, metric: &str) -> Option<&[f64]> {
        self.0.get(split)?.get(metric).map(Vec::as_slice)
    }

    pub fn splits(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn metrics(&self, split: &str) -> Vec<&str> {
        self.0
            .get(split)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// (split, metric) pairs, sorted.
    pub fn key_shape(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .flat_map(|(split, metrics)| metrics.keys().map(move |m| (split.clone(), m.clone())))
            .collect()
    }

    /// Number of recorded iterations.
    pub fn rounds(&self) -> usize {
        self.0
            .values()
            .flat_map(|m| m.values())
            .map(Vec::len)
            .max()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Maps one backend's native set / metric names onto the neutral ones.
/// Unmapped entries are dropped.
pub trait HistoryAdapter {
    fn split_name(&self, native: &str) -> Option<&'static str>;
    fn metric_name(&self, native: &str) -> Option<&'static str>;

    fn normalize(&self, native: &EvalsResult) -> TrainingHistory {
        let mut out = SplitMetrics::new();
        for (set, metric, values) in native.iter() {
            let (Some(split), Some(metric)) = (self.split_name(set), self.metric_name(metric)) else {
                continue;
            };
            out.entry(split.to_string())
                .or_default()
                .insert(metric.to_string(), values.to_vec());
        }
        TrainingHistory(out)
    }
}

/// XGBoost names eval sets `validation_{i}` in the order given; the
/// dispatcher passes the training split first.
pub struct XGBoostHistory;

impl HistoryAdapter for XGBoostHistory {
    fn split_name(&self, native: &str) -> Option<&'static str> {
        match native {
            "validation_0" => Some(TRAIN_SPLIT),
            "validation_1" => Some(VALIDATION_SPLIT),
            _ => None,
        }
    }

    fn metric_name(&self, native: &str) -> Option<&'static str> {
        match native {
            "logloss" | "mlogloss" => Some(LOGLOSS),
            "error" | "merror" => Some(ERROR),
            _ => None,
        }
    }
}

/// LightGBM names the training data `training` and other sets `valid_{i}`.
pub struct LightGBMHistory;

impl HistoryAdapter for LightGBMHistory {
    fn split_name(&self, native: &str) -> Option<&'static str> {
        match native {
            "training" => Some(TRAIN_SPLIT),
            "valid_1" => Some(VALIDATION_SPLIT),
            _ => None,
        }
    }

    fn metric_name(&self, native: &str) -> Option<&'static str> {
        match native {
            "binary_logloss" | "multi_logloss" => Some(LOGLOSS),
            "binary_error" | "multi_error" => Some(ERROR),
            _ => None,
        }
    }
}
