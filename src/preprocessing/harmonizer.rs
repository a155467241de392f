//! Schema harmonization
//!
//! Maps one mission's parsed table into the canonical feature/label space:
//! source selection and renaming, identifier preservation, label
//! consolidation, feature engineering, median imputation and canonical
//! ordering.

use super::features::{engineer_features, TemperaturePreference};
use super::imputer::impute_median;
use crate::config::PipelineConfig;
use crate::error::{OrbitalError, Result};
use crate::ingest::{normalize, RawTable, ResolvedColumns};
use crate::schema::{CanonicalFeature, FeatureSet, Label, MissionSchema, MISSIONS};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Markers of uncertainty / limit-flag columns, never picked by fallback.
const UNCERTAINTY_MARKERS: [&str; 2] = ["err", "lim"];

#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierColumn {
    pub name: String,
    pub values: Vec<String>,
}

/// Canonical table for one upload
#[derive(Debug, Clone)]
pub struct HarmonizedTable {
    pub mission: &'static str,
    pub target_column: String,
    pub feature_set: FeatureSet,
    /// Columns produced by feature engineering, in canonical order
    pub engineered: Vec<String>,
    /// Float64 columns in canonical order, no missing values
    pub features: DataFrame,
    pub labels: Vec<Label>,
    /// Raw disposition strings of the retained rows
    pub raw_labels: Vec<String>,
    pub identifier: Option<IdentifierColumn>,
    /// canonical name -> source column
    pub sources: BTreeMap<String, String>,
    /// Row indices of the raw table that survived label mapping
    pub kept_rows: Vec<usize>,
    pub dropped_rows: usize,
}

impl HarmonizedTable {
    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }
}

#[derive(Debug, Clone)]
pub struct SchemaHarmonizer {
    temperature_preference: TemperaturePreference,
}

impl SchemaHarmonizer {
    pub fn new(temperature_preference: TemperaturePreference) -> Self {
        Self {
            temperature_preference,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.temperature_preference)
    }

    pub fn harmonize(&self, raw: &RawTable, resolved: &ResolvedColumns) -> Result<HarmonizedTable> {
        let df = &raw.frame;
        let target = resolved.target.clone().ok_or(OrbitalError::NoTargetColumn)?;
        let mission = MissionSchema::detect(&target, &raw.column_names());
        debug!(mission = mission.name, target = %target, "detected mission schema");

        // Label consolidation decides which rows survive
        let mut kept_rows = Vec::new();
        let mut labels = Vec::new();
        let mut raw_labels = Vec::new();
        for (row, value) in string_column(df, &target)?.into_iter().enumerate() {
            let Some(value) = value else { continue };
            if let Some(label) = mission.map_label(&value) {
                kept_rows.push(row);
                labels.push(label);
                raw_labels.push(value);
            }
        }
        let dropped_rows = df.height() - kept_rows.len();
        if labels.is_empty() {
            return Err(OrbitalError::DataError(format!(
                "no row of '{}' carries a recognized {} disposition",
                target, mission.name
            )));
        }

        // Source selection + renaming
        let mut used = BTreeSet::new();
        let mut sources = BTreeMap::new();
        let mut base: BTreeMap<CanonicalFeature, Vec<Option<f64>>> = BTreeMap::new();
        for feature in CanonicalFeature::ALL {
            let Some(candidates) = resolved.features.get(&feature) else {
                continue;
            };
            let Some(source) = choose_source(feature, mission, candidates, &used) else {
                continue;
            };
            let values = float_column(df, &source)?;
            base.insert(feature, select(&values, &kept_rows));
            sources.insert(feature.name().to_string(), source.clone());
            used.insert(source);
        }
        if base.is_empty() {
            return Err(OrbitalError::DataError(
                "no canonical feature column could be resolved".into(),
            ));
        }

        let engineered = if !resolved.temperature.is_empty() && !resolved.radius.is_empty() {
            engineer_features(&base, self.temperature_preference)
        } else {
            warn!("no temperature or radius columns resolved, skipping feature engineering");
            Vec::new()
        };

        // Impute, then lay out in canonical order
        let mut names = Vec::new();
        let mut columns: Vec<Column> = Vec::new();
        let ordered = base
            .iter()
            .map(|(feature, values)| (feature.name().to_string(), values))
            .chain(engineered.iter().map(|(name, values)| (name.clone(), values)));
        for (name, values) in ordered {
            let (filled, fill) = impute_median(values);
            let missing = values.iter().filter(|v| v.is_none()).count();
            if missing > 0 {
                debug!(feature = %name, missing, fill, "imputed missing values with median");
            }
            columns.push(Series::new(name.as_str().into(), filled).into());
            names.push(name);
        }
        let features = DataFrame::new(columns)?;
        let engineered: Vec<String> = engineered.into_iter().map(|(name, _)| name).collect();

        let identifier = find_identifier(df, mission, &kept_rows)?;

        info!(
            mission = mission.name,
            rows = labels.len(),
            dropped = dropped_rows,
            features = names.len(),
            "harmonized dataset"
        );

        Ok(HarmonizedTable {
            mission: mission.name,
            target_column: target,
            feature_set: FeatureSet::new(names),
            engineered,
            features,
            labels,
            raw_labels,
            identifier,
            sources,
            kept_rows,
            dropped_rows,
        })
    }
}

/// Exact alias match first (this mission's own source name preferred), then
/// the shortest containing column that is not an uncertainty column.
fn choose_source(
    feature: CanonicalFeature,
    mission: &MissionSchema,
    candidates: &BTreeSet<String>,
    used: &BTreeSet<String>,
) -> Option<String> {
    let available: Vec<&String> = candidates.iter().filter(|c| !used.contains(*c)).collect();

    if let Some(own) = mission.source_for(feature).map(normalize) {
        if let Some(c) = available.iter().find(|c| normalize(c) == own) {
            return Some((*c).clone());
        }
    }

    let aliases = feature.aliases();
    if let Some(c) = available.iter().find(|c| aliases.contains(&normalize(c))) {
        return Some((*c).clone());
    }

    available
        .into_iter()
        .filter(|c| {
            let n = normalize(c);
            !UNCERTAINTY_MARKERS.iter().any(|m| n.contains(m))
        })
        .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        .cloned()
}

fn find_identifier(
    df: &DataFrame,
    mission: &MissionSchema,
    kept_rows: &[usize],
) -> Result<Option<IdentifierColumn>> {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let wanted = mission
        .identifier_columns
        .iter()
        .chain(MISSIONS.iter().flat_map(|m| m.identifier_columns.iter()));

    for candidate in wanted {
        if let Some(name) = present.iter().find(|p| p.eq_ignore_ascii_case(candidate)) {
            let values = string_column(df, name)?;
            let values = kept_rows
                .iter()
                .map(|&row| values[row].clone().unwrap_or_default())
                .collect();
            return Ok(Some(IdentifierColumn {
                name: name.clone(),
                values,
            }));
        }
    }
    Ok(None)
}

fn select<T: Clone>(values: &[T], rows: &[usize]) -> Vec<T> {
    rows.iter().map(|&r| values[r].clone()).collect()
}

/// Column cast to Float64; unparseable entries become missing.
pub(crate) fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .map_err(|_| OrbitalError::FeatureNotFound(name.to_string()))?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

pub(crate) fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df
        .column(name)
        .map_err(|_| OrbitalError::FeatureNotFound(name.to_string()))?
        .as_materialized_series()
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{ColumnProfile, ColumnResolver};

    fn kepler_table() -> RawTable {
        let frame = df!(
            "kepoi_name" => &["K1", "K2", "K3", "K4", "K5", "K6"],
            "koi_disposition" => &["CONFIRMED", "FALSE POSITIVE", "NOT DISPOSITIONED", "candidate", "CONFIRMED", "FALSE POSITIVE"],
            "koi_period" => &[Some(10.0), Some(20.0), Some(30.0), None, Some(50.0), Some(60.0)],
            "koi_prad" => &[Some(2.0), Some(0.0), Some(1.0), Some(4.0), None, Some(3.0)],
            "koi_prad_err1" => &[0.1, 0.1, 0.1, 0.1, 0.1, 0.1],
            "koi_steff" => &[5000.0, 6000.0, 5500.0, 5800.0, 5200.0, 4800.0],
            "koi_srad" => &[1.0, 0.9, 1.1, 1.0, 1.2, 0.8]
        )
        .unwrap();
        RawTable {
            header_offset: 0,
            frame,
        }
    }

    fn harmonize(table: &RawTable) -> Result<HarmonizedTable> {
        let targets: Vec<String> = vec!["koi_disposition".into()];
        let resolver = ColumnResolver::new(&targets, 1);
        let resolved = resolver.resolve(&ColumnProfile::from_frame(&table.frame));
        SchemaHarmonizer::new(TemperaturePreference::Stellar).harmonize(table, &resolved)
    }

    #[test]
    fn test_drops_unmapped_labels() {
        let table = harmonize(&kepler_table()).unwrap();
        assert_eq!(table.n_rows(), 5);
        assert_eq!(table.dropped_rows, 1);
        assert_eq!(table.kept_rows, vec![0, 1, 3, 4, 5]);
        assert!(table.labels.iter().all(|l| l.ordinal() <= 2));
        assert_eq!(table.labels[2], Label::Candidate);
    }

    #[test]
    fn test_canonical_order_and_engineering() {
        let table = harmonize(&kepler_table()).unwrap();
        assert_eq!(
            table.feature_set.as_strs(),
            vec![
                "orbital_period",
                "planet_radius",
                "stellar_temp",
                "stellar_radius",
                "planet_radius_sq",
                "stellar_temp_x_planet_rad",
                "stellar_temp_div_planet_rad",
                "stellar_radius_sq",
                "stellar_temp_x_stellar_rad",
                "stellar_temp_div_stellar_rad",
            ]
        );
        assert_eq!(table.sources["planet_radius"], "koi_prad");
    }

    #[test]
    fn test_ratio_with_zero_radius_and_imputation() {
        let table = harmonize(&kepler_table()).unwrap();
        let ratio: Vec<f64> = table
            .features
            .column("stellar_temp_div_planet_rad")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        // row "K2" has radius 0
        assert_eq!(ratio[1], 6000.0);

        let period: Vec<Option<f64>> = table
            .features
            .column("orbital_period")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        // kept periods 10, 20, 50, 60 -> median 35 fills "K4"
        assert_eq!(period[2], Some(35.0));
        assert!(table.features.get_columns().iter().all(|c| c.null_count() == 0));
    }

    #[test]
    fn test_identifier_preserved() {
        let table = harmonize(&kepler_table()).unwrap();
        let id = table.identifier.unwrap();
        assert_eq!(id.name, "kepoi_name");
        assert_eq!(id.values, vec!["K1", "K2", "K4", "K5", "K6"]);
    }

    #[test]
    fn test_no_target() {
        let table = kepler_table();
        let resolved = ResolvedColumns::default();
        let result = SchemaHarmonizer::new(TemperaturePreference::Stellar).harmonize(&table, &resolved);
        assert!(matches!(result, Err(OrbitalError::NoTargetColumn)));
    }

    #[test]
    fn test_choose_source_skips_uncertainty_columns() {
        let candidates: BTreeSet<String> =
            ["koi_prad_err1".to_string(), "koi_prad_x".to_string()].into_iter().collect();
        let chosen = choose_source(
            CanonicalFeature::PlanetRadius,
            &crate::schema::missions::KEPLER,
            &candidates,
            &BTreeSet::new(),
        );
        assert_eq!(chosen.as_deref(), Some("koi_prad_x"));
    }
}
