//! Data preprocessing module
//!
//! Provides the harmonization stages between a parsed survey table and the
//! training matrix:
//! - Mission-to-canonical renaming and label consolidation
//! - Feature engineering (radius / temperature interactions)
//! - Median imputation
//! - Feature scaling (StandardScaler, MinMaxScaler)

mod features;
mod harmonizer;
mod imputer;
mod scaler;

pub use features::{engineer_features, TemperaturePreference};
pub use harmonizer::{HarmonizedTable, IdentifierColumn, SchemaHarmonizer};
pub(crate) use harmonizer::float_column;
pub use imputer::{impute_median, median};
pub use scaler::{Scaler, ScalerType};

use crate::error::{OrbitalError, Result};
use ndarray::Array2;
use polars::prelude::*;

/// Extract the named Float64 columns as a row-major matrix.
pub fn to_matrix(df: &DataFrame, columns: &[&str]) -> Result<Array2<f64>> {
    let data: Vec<Vec<f64>> = columns
        .iter()
        .map(|name| {
            let column = df
                .column(name)
                .map_err(|_| OrbitalError::FeatureNotFound(name.to_string()))?;
            let ca = column.as_materialized_series().f64()?;
            Ok(ca.into_iter().map(|v| v.unwrap_or(0.0)).collect())
        })
        .collect::<Result<_>>()?;

    let n_rows = df.height();
    Ok(Array2::from_shape_fn((n_rows, columns.len()), |(r, c)| data[c][r]))
}
