//! Feature scaling

use crate::error::{OrbitalError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
}

impl FromStr for ScalerType {
    type Err = OrbitalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(ScalerType::Standard),
            "minmax" | "min_max" => Ok(ScalerType::MinMax),
            other => Err(OrbitalError::InvalidParameter {
                name: "scaler".into(),
                value: other.into(),
                reason: "expected 'standard' or 'minmax'".into(),
            }),
        }
    }
}

/// Parameters for a fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // mean or min
    scale: f64,  // std or range
}

/// Per-column affine scaler; parameters are kept in fit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: Vec<(String, ScalerParams)>,
    is_fitted: bool,
}

impl Scaler {
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fitted (center, scale) for a column.
    pub fn params(&self, column: &str) -> Option<(f64, f64)> {
        self.params
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, p)| (p.center, p.scale))
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.params.clear();
        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| OrbitalError::FeatureNotFound(col_name.to_string()))?;
            let series = column.as_materialized_series();

            let params = self.compute_params(series)?;
            self.params.push((col_name.to_string(), params));
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Scale every fitted column present in `df`; other columns pass through.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.apply(df, |v, p| (v - p.center) / p.scale)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    pub fn inverse_transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.apply(df, |v, p| v * p.scale + p.center)
    }

    /// Builds all replacement columns first, then applies them in one pass.
    fn apply(&self, df: &DataFrame, f: impl Fn(f64, &ScalerParams) -> f64) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(OrbitalError::ModelNotFitted);
        }

        let replacements: Vec<Series> = self
            .params
            .iter()
            .filter_map(|(col_name, params)| {
                df.column(col_name).ok().map(|column| {
                    let series = column.as_materialized_series();
                    map_series(series, |v| f(v, params))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result
                .with_column(scaled)
                .map_err(|e| OrbitalError::DataError(e.to_string()))?;
        }

        Ok(result)
    }

    fn compute_params(&self, series: &Series) -> Result<ScalerParams> {
        let ca = series
            .f64()
            .map_err(|e| OrbitalError::DataError(e.to_string()))?;

        match self.scaler_type {
            ScalerType::Standard => {
                // population std, as StandardScaler
                let mean = ca.mean().unwrap_or(0.0);
                let std = ca.std(0).unwrap_or(1.0);
                Ok(ScalerParams {
                    center: mean,
                    scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
                })
            }
            ScalerType::MinMax => {
                let min = ca.min().unwrap_or(0.0);
                let max = ca.max().unwrap_or(1.0);
                let range = max - min;
                Ok(ScalerParams {
                    center: min,
                    scale: if range == 0.0 { 1.0 } else { range },
                })
            }
        }
    }
}

fn map_series(series: &Series, f: impl Fn(f64) -> f64) -> Result<Series> {
    let ca = series
        .f64()
        .map_err(|e| OrbitalError::DataError(e.to_string()))?;

    let mapped: Float64Chunked = ca.into_iter().map(|opt| opt.map(&f)).collect();

    Ok(mapped.with_name(series.name().clone()).into_series())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            Series::new("a".into(), &[1.0, 2.0, 3.0, 4.0, 5.0]).into(),
            Series::new("b".into(), &[7.0, 7.0, 7.0, 7.0, 7.0]).into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_standard_scaler() {
        let mut scaler = Scaler::new(ScalerType::Standard);
        let result = scaler.fit_transform(&frame(), &["a"]).unwrap();

        let col = result.column("a").unwrap().f64().unwrap();
        let mean: f64 = col.mean().unwrap();
        assert!(mean.abs() < 1e-10);
        // population std of 1..5 is sqrt(2)
        let (_, scale) = scaler.params("a").unwrap();
        assert!((scale - 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_keeps_unit_scale() {
        let mut scaler = Scaler::new(ScalerType::Standard);
        let result = scaler.fit_transform(&frame(), &["b"]).unwrap();
        assert_eq!(scaler.params("b"), Some((7.0, 1.0)));
        let col = result.column("b").unwrap().f64().unwrap();
        assert!(col.into_iter().all(|v| v == Some(0.0)));
    }

    #[test]
    fn test_minmax_scaler() {
        let mut scaler = Scaler::new(ScalerType::MinMax);
        let result = scaler.fit_transform(&frame(), &["a"]).unwrap();

        let col = result.column("a").unwrap().f64().unwrap();
        assert!((col.min().unwrap() - 0.0).abs() < 1e-10);
        assert!((col.max().unwrap() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_inverse_transform() {
        let df = frame();
        let mut scaler = Scaler::new(ScalerType::Standard);
        let scaled = scaler.fit_transform(&df, &["a", "b"]).unwrap();
        let unscaled = scaler.inverse_transform(&scaled).unwrap();

        for name in ["a", "b"] {
            let original = df.column(name).unwrap().f64().unwrap();
            let restored = unscaled.column(name).unwrap().f64().unwrap();
            for (o, r) in original.into_iter().zip(restored.into_iter()) {
                assert!((o.unwrap() - r.unwrap()).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn test_transform_before_fit() {
        let scaler = Scaler::new(ScalerType::Standard);
        assert!(matches!(
            scaler.transform(&frame()),
            Err(OrbitalError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_parse_scaler_type() {
        assert_eq!("Standard".parse::<ScalerType>().unwrap(), ScalerType::Standard);
        assert_eq!("minmax".parse::<ScalerType>().unwrap(), ScalerType::MinMax);
        assert!("robust".parse::<ScalerType>().is_err());
    }
}
