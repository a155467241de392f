//! Orbital Horizon CLI Module
//!
//! Command-line front end over [`ExoplanetService`]: inspect an upload,
//! train a backend, predict with a stored model.

use clap::{Parser, Subcommand};
use colored::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::evaluation::ConfusionMatrix;
use crate::service::{ExoplanetService, TrainRequest};
use crate::training::{LOGLOSS, VALIDATION_SPLIT};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "orbital-horizon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Exoplanet candidate classification from survey catalog exports")]
#[command(long_about = None)]
pub struct Cli {
    /// Pipeline configuration (JSON); defaults plus ORBITAL_* variables otherwise
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse and harmonize a catalog export, print the upload report
    Inspect {
        /// Input catalog file (CSV)
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Train a model on a catalog export
    Train {
        #[arg(short, long)]
        data: PathBuf,

        /// Backend (xgb, lgbm)
        #[arg(short, long, default_value = "xgb")]
        model: String,

        #[arg(long)]
        n_estimators: Option<usize>,

        #[arg(long)]
        max_depth: Option<usize>,

        #[arg(long)]
        learning_rate: Option<f64>,

        /// Output model file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output training report (JSON)
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Label a catalog export with a trained model
    Predict {
        #[arg(short, long)]
        data: PathBuf,

        /// Trained model file
        #[arg(short, long)]
        model: PathBuf,

        /// Output predictions file (CSV)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    Ok(match path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::from_env()?,
    })
}

fn upload(service: &ExoplanetService, data_path: &Path) -> anyhow::Result<()> {
    step_run("Loading data");
    let start = Instant::now();
    let bytes = std::fs::read(data_path)?;
    let report = service.upload(&bytes)?;
    step_done(&format!(
        "{} rows kept, {} dropped in {:?}",
        report.rows,
        report.dropped_rows,
        start.elapsed()
    ));
    kv("Mission", report.mission.as_str());
    kv("Header line", &report.header_line.to_string());
    kv("Target", report.target_column.as_str());
    kv("Features", &report.feature_columns.len().to_string());
    Ok(())
}

pub fn cmd_inspect(config: PipelineConfig, data_path: &Path) -> anyhow::Result<()> {
    section("Inspect");
    let service = ExoplanetService::new(config)?;

    step_run("Loading data");
    let bytes = std::fs::read(data_path)?;
    let report = service.upload(&bytes)?;
    step_done(&format!("{} rows", report.rows));

    println!();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_train(
    config: PipelineConfig,
    data_path: &Path,
    model: &str,
    n_estimators: Option<usize>,
    max_depth: Option<usize>,
    learning_rate: Option<f64>,
    output: Option<&Path>,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");
    let service = ExoplanetService::new(config)?;
    upload(&service, data_path)?;

    let mut request = TrainRequest::new(model);
    if let Some(n) = n_estimators {
        request = request.with_param("n_estimators", n);
    }
    if let Some(d) = max_depth {
        request = request.with_param("max_depth", d);
    }
    if let Some(lr) = learning_rate {
        request = request.with_param("learning_rate", lr);
    }

    step_run(&format!("Training {}", model.cyan()));
    let start = Instant::now();
    let outcome = service.train(&request)?;
    step_done(&format!("{} rounds in {:?}", outcome.report.n_rounds, start.elapsed()));

    let report = &outcome.report;
    println!();
    println!("  {:<18} {}", muted("Accuracy"), format!("{:.4}", report.accuracy).white().bold());
    if let Some(roc) = &report.roc {
        kv("AUC", &format!("{:.4}", roc.auc));
    }
    if let Some(losses) = report.history.get(VALIDATION_SPLIT, LOGLOSS) {
        if let Some(last) = losses.last() {
            kv("Validation loss", &format!("{:.4}", last));
        }
    }
    kv("Train / test", &format!("{} / {}", report.n_train, report.n_test));
    print_confusion(&report.confusion_matrix);
    print_importances(&report.feature_importances);

    if let Some(path) = output {
        outcome.model.save(path)?;
        step_ok(&format!("Model saved to {}", path.display()));
    }
    if let Some(path) = report_path {
        std::fs::write(path, serde_json::to_string_pretty(report)?)?;
        step_ok(&format!("Report saved to {}", path.display()));
    }
    println!();
    Ok(())
}

fn print_importances(importances: &BTreeMap<String, f64>) {
    let mut ranked: Vec<_> = importances.iter().filter(|(_, v)| **v > 0.0).collect();
    if ranked.is_empty() {
        return;
    }
    ranked.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
    println!();
    println!("  {}", dim("Top features"));
    for (name, value) in ranked.into_iter().take(5) {
        kv(name, &format!("{:.3}", value));
    }
}

pub fn cmd_predict(
    config: PipelineConfig,
    data_path: &Path,
    model_path: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");
    let service = ExoplanetService::new(config)?;
    upload(&service, data_path)?;

    step_run("Predicting");
    let start = Instant::now();
    let predictions = service.predict(model_path)?;
    step_done(&format!("{} rows in {:?}", predictions.len(), start.elapsed()));

    let csv = service.export_predictions()?;
    match output {
        Some(path) => {
            std::fs::write(path, &csv)?;
            step_ok(&format!("Predictions saved to {}", path.display()));
        }
        None => print!("{}", String::from_utf8_lossy(&csv)),
    }
    println!();
    Ok(())
}

fn print_confusion(cm: &ConfusionMatrix) {
    section("Confusion matrix");
    let header: String = cm
        .labels
        .iter()
        .map(|l| format!("{:>16}", l.display_name()))
        .collect();
    println!("  {:<16}{}", "", muted(&header));
    for (label, row) in cm.labels.iter().zip(&cm.counts) {
        let cells: String = row.iter().map(|c| format!("{:>16}", c)).collect();
        println!("  {:<16}{}", muted(label.display_name()), cells);
    }
}
