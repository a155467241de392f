//! Exoplanet classification service
//!
//! The single entry point front ends talk to: upload a survey export,
//! train a backend on it, predict with a stored artifact, export the
//! labelled rows. All operations share one [`SessionStore`].

mod report;

pub use report::{PreviewColumn, TrainRequest, TrainingOutcome, TrainingReport, UploadReport, PREVIEW_ROWS};

use crate::config::PipelineConfig;
use crate::error::{OrbitalError, Result};
use crate::evaluation::Evaluator;
use crate::inference::{export_predictions, Predictor};
use crate::ingest::{decode_lossy, ColumnProfile, ColumnResolver, HeaderLocator};
use crate::preprocessing::{to_matrix, Scaler, SchemaHarmonizer};
use crate::schema::Label;
use crate::session::{SessionSnapshot, SessionStore};
use crate::training::{Backend, Hyperparameters, TrainedModel, TrainingDispatcher};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub struct ExoplanetService {
    config: PipelineConfig,
    locator: HeaderLocator,
    resolver: ColumnResolver,
    harmonizer: SchemaHarmonizer,
    dispatcher: TrainingDispatcher,
    evaluator: Evaluator,
    predictor: Predictor,
    sessions: SessionStore,
}

impl ExoplanetService {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            locator: HeaderLocator::from_config(&config),
            resolver: ColumnResolver::from_config(&config),
            harmonizer: SchemaHarmonizer::from_config(&config),
            dispatcher: TrainingDispatcher::from_config(&config),
            evaluator: Evaluator,
            predictor: Predictor::new(config.clone()),
            sessions: SessionStore::new(),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn session(&self) -> Option<Arc<SessionSnapshot>> {
        self.sessions.current()
    }

    /// Parse, harmonize and scale an upload, then make it the session.
    /// On error the previous session stays in place.
    pub fn upload(&self, bytes: &[u8]) -> Result<UploadReport> {
        let start = Instant::now();
        let text = decode_lossy(bytes);
        let raw = self.locator.locate(&text)?;

        let profiles = ColumnProfile::from_frame(&raw.frame);
        let resolved = self.resolver.resolve(&profiles);
        if resolved.target.is_none() {
            return Err(OrbitalError::NoTargetColumn);
        }
        let table = self.harmonizer.harmonize(&raw, &resolved)?;

        let columns = table.feature_set.as_strs();
        let mut scaler = Scaler::new(self.config.scaler);
        let scaled = scaler.fit_transform(&table.features, &columns)?;

        let snapshot = SessionSnapshot::new(
            table.mission,
            table.feature_set.clone(),
            table.features.clone(),
            scaled,
            table.labels.clone(),
            table.identifier.clone(),
            scaler,
        );
        let report = UploadReport::build(&snapshot.id, &raw, &resolved, &table, &snapshot.scaled)?;
        self.sessions.replace(snapshot);

        info!(
            session_id = %report.session_id,
            mission = %report.mission,
            rows = report.rows,
            dropped = report.dropped_rows,
            features = report.feature_columns.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "upload complete"
        );
        Ok(report)
    }

    /// Train the requested backend on the current session.
    pub fn train(&self, request: &TrainRequest) -> Result<TrainingOutcome> {
        let snapshot = self.sessions.require()?;
        let backend: Backend = request.model.parse()?;
        let hyperparams = Hyperparameters::from_json(&request.hyperparams)?;

        let x = to_matrix(&snapshot.scaled, &snapshot.feature_set.as_strs())?;
        let result = self.dispatcher.train(
            backend,
            &hyperparams,
            &x,
            &snapshot.labels,
            snapshot.feature_set.names(),
        )?;
        let model = result.model.with_scaler(snapshot.scaler.clone());
        let evaluation = self.evaluator.evaluate(&model, &result.held_out)?;
        let report = TrainingReport::new(
            &snapshot.id,
            &model,
            evaluation,
            result.n_train,
            result.held_out.labels.len(),
        );

        info!(
            session_id = %snapshot.id,
            backend = %backend,
            accuracy = report.accuracy,
            auc = ?report.roc.as_ref().map(|r| r.auc),
            "training evaluated"
        );
        Ok(TrainingOutcome { model, report })
    }

    /// Label every session row with a stored model artifact.
    pub fn predict(&self, artifact: &Path) -> Result<Vec<Label>> {
        let snapshot = self.sessions.require()?;
        let model = self.predictor.load_artifact(artifact)?;
        self.predictor.predict(&model, &snapshot)
    }

    /// Label every session row with an in-memory model.
    pub fn predict_with(&self, model: &TrainedModel) -> Result<Vec<Label>> {
        let snapshot = self.sessions.require()?;
        self.predictor.predict(model, &snapshot)
    }

    /// CSV of the session rows and their latest predictions.
    pub fn export_predictions(&self) -> Result<Vec<u8>> {
        let snapshot = self.sessions.require()?;
        export_predictions(&snapshot)
    }
}
