//! Versioned session store
//!
//! A session is the most recently harmonized upload. Uploads build a whole
//! [`SessionSnapshot`] and swap it in; readers clone the `Arc` once and work
//! on that snapshot, so a concurrent upload never changes data under them.

use crate::error::{OrbitalError, Result};
use crate::preprocessing::{IdentifierColumn, Scaler};
use crate::schema::{FeatureSet, Label};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use polars::prelude::DataFrame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Generate a short session id
fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

/// One harmonized upload and everything derived from it
#[derive(Debug)]
pub struct SessionSnapshot {
    pub id: String,
    pub generation: u64,
    pub created_at: DateTime<Utc>,
    pub mission: &'static str,
    pub feature_set: FeatureSet,
    /// Imputed, unscaled canonical features
    pub unscaled: DataFrame,
    /// `unscaled` after the session scaler
    pub scaled: DataFrame,
    pub labels: Vec<Label>,
    pub identifier: Option<IdentifierColumn>,
    pub scaler: Scaler,
    predictions: Mutex<Option<Vec<Label>>>,
}

impl SessionSnapshot {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mission: &'static str,
        feature_set: FeatureSet,
        unscaled: DataFrame,
        scaled: DataFrame,
        labels: Vec<Label>,
        identifier: Option<IdentifierColumn>,
        scaler: Scaler,
    ) -> Self {
        Self {
            id: generate_id(),
            generation: 0,
            created_at: Utc::now(),
            mission,
            feature_set,
            unscaled,
            scaled,
            labels,
            identifier,
            scaler,
            predictions: Mutex::new(None),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }

    pub fn set_predictions(&self, predictions: Vec<Label>) {
        *self.predictions.lock() = Some(predictions);
    }

    pub fn predictions(&self) -> Option<Vec<Label>> {
        self.predictions.lock().clone()
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    current: RwLock<Option<Arc<SessionSnapshot>>>,
    generation: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current session; returns the installed snapshot.
    pub fn replace(&self, mut snapshot: SessionSnapshot) -> Arc<SessionSnapshot> {
        snapshot.generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(snapshot);
        *self.current.write() = Some(Arc::clone(&snapshot));
        info!(
            session_id = %snapshot.id,
            generation = snapshot.generation,
            rows = snapshot.n_rows(),
            "session replaced"
        );
        snapshot
    }

    pub fn current(&self) -> Option<Arc<SessionSnapshot>> {
        self.current.read().clone()
    }

    /// The current snapshot, or `NoDatasetLoaded`.
    pub fn require(&self) -> Result<Arc<SessionSnapshot>> {
        self.current().ok_or(OrbitalError::NoDatasetLoaded)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
