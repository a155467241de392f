//! Mission schema tables
//!
//! One constant table per survey catalog: its label column, identifier
//! columns, source-to-canonical renames and disposition consolidation.

use super::{CanonicalFeature, Label};
use crate::ingest::normalize;

#[derive(Debug, Clone)]
pub struct MissionSchema {
    pub name: &'static str,
    pub label_column: &'static str,
    pub identifier_columns: &'static [&'static str],
    pub renames: &'static [(&'static str, CanonicalFeature)],
    pub labels: &'static [(&'static str, Label)],
}

pub static KEPLER: MissionSchema = MissionSchema {
    name: "kepler",
    label_column: "koi_disposition",
    identifier_columns: &["kepoi_name", "kepler_name", "kepid"],
    renames: &[
        ("koi_period", CanonicalFeature::OrbitalPeriod),
        ("koi_duration", CanonicalFeature::TransitDuration),
        ("koi_depth", CanonicalFeature::TransitDepth),
        ("koi_prad", CanonicalFeature::PlanetRadius),
        ("koi_teq", CanonicalFeature::EquilibriumTemp),
        ("koi_insol", CanonicalFeature::Insolation),
        ("koi_steff", CanonicalFeature::StellarTemp),
        ("koi_srad", CanonicalFeature::StellarRadius),
        ("koi_slogg", CanonicalFeature::StellarLogg),
        ("koi_model_snr", CanonicalFeature::Snr),
    ],
    labels: &[
        ("CONFIRMED", Label::Confirmed),
        ("CANDIDATE", Label::Candidate),
        ("FALSE POSITIVE", Label::NotPlanet),
    ],
};

pub static TESS: MissionSchema = MissionSchema {
    name: "tess",
    label_column: "tfopwg_disp",
    identifier_columns: &["toi", "tid"],
    renames: &[
        ("pl_orbper", CanonicalFeature::OrbitalPeriod),
        ("pl_trandurh", CanonicalFeature::TransitDuration),
        ("pl_trandep", CanonicalFeature::TransitDepth),
        ("pl_rade", CanonicalFeature::PlanetRadius),
        ("pl_eqt", CanonicalFeature::EquilibriumTemp),
        ("pl_insol", CanonicalFeature::Insolation),
        ("st_teff", CanonicalFeature::StellarTemp),
        ("st_rad", CanonicalFeature::StellarRadius),
        ("st_logg", CanonicalFeature::StellarLogg),
    ],
    labels: &[
        ("CP", Label::Confirmed),
        ("KP", Label::Confirmed),
        ("PC", Label::Candidate),
        ("APC", Label::Candidate),
        ("FP", Label::NotPlanet),
        ("FA", Label::NotPlanet),
    ],
};

pub static K2: MissionSchema = MissionSchema {
    name: "k2",
    label_column: "disposition",
    identifier_columns: &["pl_name", "epic_hostname"],
    renames: &[
        ("pl_orbper", CanonicalFeature::OrbitalPeriod),
        ("pl_trandur", CanonicalFeature::TransitDuration),
        ("pl_trandep", CanonicalFeature::TransitDepth),
        ("pl_rade", CanonicalFeature::PlanetRadius),
        ("pl_eqt", CanonicalFeature::EquilibriumTemp),
        ("pl_insol", CanonicalFeature::Insolation),
        ("st_teff", CanonicalFeature::StellarTemp),
        ("st_rad", CanonicalFeature::StellarRadius),
        ("st_logg", CanonicalFeature::StellarLogg),
    ],
    labels: &[
        ("CONFIRMED", Label::Confirmed),
        ("CANDIDATE", Label::Candidate),
        ("FALSE POSITIVE", Label::NotPlanet),
        ("REFUTED", Label::NotPlanet),
    ],
};

/// All known missions, in detection priority order.
pub static MISSIONS: [&MissionSchema; 3] = [&KEPLER, &TESS, &K2];

impl MissionSchema {
    /// Pick the mission for a dataset: exact label-column match first,
    /// otherwise the mission with the most rename sources present.
    pub fn detect(target_column: &str, columns: &[String]) -> &'static MissionSchema {
        let target = normalize(target_column);
        if let Some(mission) = MISSIONS.iter().find(|m| normalize(m.label_column) == target) {
            return *mission;
        }

        let present: Vec<String> = columns.iter().map(|c| normalize(c)).collect();
        let mut best: &'static MissionSchema = MISSIONS[0];
        let mut best_hits = 0usize;
        for mission in MISSIONS.iter() {
            let hits = mission
                .renames
                .iter()
                .filter(|(source, _)| present.contains(&normalize(source)))
                .count();
            if hits > best_hits {
                best = *mission;
                best_hits = hits;
            }
        }
        best
    }

    /// Consolidate a raw disposition string; `None` drops the row.
    pub fn map_label(&self, raw: &str) -> Option<Label> {
        let key = raw.trim().to_uppercase();
        self.labels
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, label)| *label)
    }

    /// Source column this mission uses for a canonical feature.
    pub fn source_for(&self, feature: CanonicalFeature) -> Option<&'static str> {
        self.renames
            .iter()
            .find(|(_, f)| *f == feature)
            .map(|(source, _)| *source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_label_column() {
        assert_eq!(MissionSchema::detect("koi_disposition", &[]).name, "kepler");
        assert_eq!(MissionSchema::detect("TFOPWG_DISP", &[]).name, "tess");
        assert_eq!(MissionSchema::detect("disposition", &[]).name, "k2");
    }

    #[test]
    fn test_detect_by_renames() {
        let columns = vec!["pl_orbper".to_string(), "pl_trandurh".to_string()];
        assert_eq!(MissionSchema::detect("status", &columns).name, "tess");
    }

    #[test]
    fn test_map_label() {
        assert_eq!(KEPLER.map_label(" confirmed "), Some(Label::Confirmed));
        assert_eq!(KEPLER.map_label("FALSE POSITIVE"), Some(Label::NotPlanet));
        assert_eq!(KEPLER.map_label("NOT DISPOSITIONED"), None);
        assert_eq!(TESS.map_label("apc"), Some(Label::Candidate));
        assert_eq!(TESS.map_label("KP"), Some(Label::Confirmed));
        assert_eq!(K2.map_label("REFUTED"), Some(Label::NotPlanet));
    }

    #[test]
    fn test_source_for() {
        assert_eq!(KEPLER.source_for(CanonicalFeature::Snr), Some("koi_model_snr"));
        assert_eq!(TESS.source_for(CanonicalFeature::Snr), None);
    }
}
