//! Keyword-driven column resolution
//!
//! Survey catalogs name the same physical quantity differently
//! (`koi_prad`, `pl_rade`, ...). Each concept carries a keyword table; a
//! column belongs to a concept when its normalized name contains one of the
//! keywords. Match sets are ordered sets so the result does not depend on
//! source column order.

use super::normalize;
use crate::config::PipelineConfig;
use crate::schema::CanonicalFeature;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub const TEMPERATURE_KEYWORDS: [&str; 5] = ["temp", "teq", "eqt", "teff", "steff"];
pub const RADIUS_KEYWORDS: [&str; 5] = ["prad", "rade", "radj", "srad", "rad"];

/// Semantic category a source column can be mapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Concept {
    Target,
    Temperature,
    Radius,
    Feature(CanonicalFeature),
}

/// Name and population of one source column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    pub name: String,
    pub normalized: String,
    pub populated: usize,
}

impl ColumnProfile {
    pub fn new(name: impl Into<String>, populated: usize) -> Self {
        let name = name.into();
        Self {
            normalized: normalize(&name),
            name,
            populated,
        }
    }

    pub fn from_frame(df: &DataFrame) -> Vec<Self> {
        df.get_columns()
            .iter()
            .map(|column| Self::new(column.name().to_string(), column.len() - column.null_count()))
            .collect()
    }
}

/// Resolution result for one upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedColumns {
    pub target: Option<String>,
    pub temperature: BTreeSet<String>,
    pub radius: BTreeSet<String>,
    pub features: BTreeMap<CanonicalFeature, BTreeSet<String>>,
}

#[derive(Debug, Clone)]
pub struct ColumnResolver {
    target_keywords: Vec<String>,
    min_populated: usize,
}

impl ColumnResolver {
    pub fn new(target_columns: &[String], min_populated: usize) -> Self {
        Self {
            target_keywords: target_columns.iter().map(|c| normalize(c)).collect(),
            min_populated,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.target_columns, config.min_populated)
    }

    /// Normalized keywords for a concept.
    pub fn keywords(&self, concept: Concept) -> Vec<String> {
        match concept {
            Concept::Target => self.target_keywords.clone(),
            Concept::Temperature => TEMPERATURE_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            Concept::Radius => RADIUS_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            Concept::Feature(feature) => feature.aliases(),
        }
    }

    /// Every column whose normalized name contains a keyword of `concept`.
    /// Non-target concepts drop columns below the population threshold;
    /// the target only drops entirely empty columns.
    pub fn matching(&self, profiles: &[ColumnProfile], concept: Concept) -> BTreeSet<String> {
        let keywords = self.keywords(concept);
        let threshold = match concept {
            Concept::Target => 1,
            _ => self.min_populated,
        };

        profiles
            .iter()
            .filter(|p| !p.normalized.is_empty())
            .filter(|p| keywords.iter().any(|k| p.normalized.contains(k.as_str())))
            .filter(|p| {
                let keep = p.populated >= threshold;
                if !keep {
                    debug!(column = %p.name, populated = p.populated, ?concept, "column below population threshold");
                }
                keep
            })
            .map(|p| p.name.clone())
            .collect()
    }

    /// Pick the label column: exact keyword match in keyword priority order,
    /// then the shortest containing name.
    pub fn resolve_target(&self, profiles: &[ColumnProfile]) -> Option<String> {
        let matches = self.matching(profiles, Concept::Target);
        if matches.is_empty() {
            return None;
        }

        for keyword in &self.target_keywords {
            if let Some(name) = matches.iter().find(|name| normalize(name) == *keyword) {
                return Some(name.clone());
            }
        }

        matches
            .iter()
            .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            .cloned()
    }

    pub fn resolve(&self, profiles: &[ColumnProfile]) -> ResolvedColumns {
        let features = CanonicalFeature::ALL
            .iter()
            .map(|&feature| (feature, self.matching(profiles, Concept::Feature(feature))))
            .filter(|(_, columns)| !columns.is_empty())
            .collect();

        ResolvedColumns {
            target: self.resolve_target(profiles),
            temperature: self.matching(profiles, Concept::Temperature),
            radius: self.matching(profiles, Concept::Radius),
            features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ColumnResolver {
        let targets: Vec<String> = crate::config::DEFAULT_TARGET_COLUMNS
            .iter()
            .map(|s| s.to_string())
            .collect();
        ColumnResolver::new(&targets, 300)
    }

    fn kepler_profiles() -> Vec<ColumnProfile> {
        vec![
            ColumnProfile::new("kepid", 800),
            ColumnProfile::new("koi_disposition", 800),
            ColumnProfile::new("koi_pdisposition", 800),
            ColumnProfile::new("koi_prad", 800),
            ColumnProfile::new("koi_prad_err1", 780),
            ColumnProfile::new("koi_teq", 790),
            ColumnProfile::new("koi_steff", 800),
            ColumnProfile::new("koi_srad", 100),
        ]
    }

    #[test]
    fn test_temperature_and_radius() {
        let resolved = resolver().resolve(&kepler_profiles());
        let temps: Vec<&str> = resolved.temperature.iter().map(String::as_str).collect();
        assert_eq!(temps, vec!["koi_steff", "koi_teq"]);
        // koi_srad is under-populated
        let radii: Vec<&str> = resolved.radius.iter().map(String::as_str).collect();
        assert_eq!(radii, vec!["koi_prad", "koi_prad_err1"]);
    }

    #[test]
    fn test_target_prefers_exact_match() {
        let target = resolver().resolve_target(&kepler_profiles());
        assert_eq!(target.as_deref(), Some("koi_disposition"));
    }

    #[test]
    fn test_target_containment_fallback() {
        let profiles = vec![
            ColumnProfile::new("Archive Disposition Final", 10),
            ColumnProfile::new("disposition_note", 10),
        ];
        assert_eq!(
            resolver().resolve_target(&profiles).as_deref(),
            Some("disposition_note")
        );
    }

    #[test]
    fn test_empty_target_is_unresolvable() {
        let profiles = vec![ColumnProfile::new("koi_disposition", 0)];
        assert_eq!(resolver().resolve_target(&profiles), None);
    }

    #[test]
    fn test_order_independent_and_idempotent() {
        let profiles = kepler_profiles();
        let mut reversed = profiles.clone();
        reversed.reverse();

        let r = resolver();
        let first = r.resolve(&profiles);
        assert_eq!(first, r.resolve(&reversed));
        assert_eq!(first, r.resolve(&profiles));
    }

    #[test]
    fn test_feature_matches() {
        let resolved = resolver().resolve(&kepler_profiles());
        let radius = &resolved.features[&CanonicalFeature::PlanetRadius];
        assert!(radius.contains("koi_prad"));
        assert!(radius.contains("koi_prad_err1"));
        assert!(!resolved.features.contains_key(&CanonicalFeature::StellarRadius));
    }

    #[test]
    fn test_profiles_from_frame() {
        let df = DataFrame::new(vec![
            Series::new("koi_prad".into(), &[Some(1.0), None, Some(3.0)]).into(),
        ])
        .unwrap();
        let profiles = ColumnProfile::from_frame(&df);
        assert_eq!(profiles[0].populated, 2);
        assert_eq!(profiles[0].normalized, "koiprad");
    }
}
