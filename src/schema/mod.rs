//! Canonical schema shared by every survey
//!
//! - [`Label`]: ordinal detection status
//! - [`CanonicalFeature`]: the fixed, ordered feature vocabulary
//! - [`FeatureSet`]: the features actually realized for one upload
//! - [`missions`]: per-catalog rename and label tables

pub mod missions;

pub use missions::{MissionSchema, MISSIONS};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal detection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    NotPlanet = 0,
    Candidate = 1,
    Confirmed = 2,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::NotPlanet, Label::Candidate, Label::Confirmed];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            0 => Some(Label::NotPlanet),
            1 => Some(Label::Candidate),
            2 => Some(Label::Confirmed),
            _ => None,
        }
    }

    /// Human-readable name used in exports.
    pub fn display_name(self) -> &'static str {
        match self {
            Label::NotPlanet => "FALSE POSITIVE",
            Label::Candidate => "CANDIDATE",
            Label::Confirmed => "CONFIRMED",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Canonical base features, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalFeature {
    OrbitalPeriod,
    TransitDuration,
    TransitDepth,
    PlanetRadius,
    EquilibriumTemp,
    Insolation,
    StellarTemp,
    StellarRadius,
    StellarLogg,
    Snr,
}

impl CanonicalFeature {
    pub const ALL: [CanonicalFeature; 10] = [
        CanonicalFeature::OrbitalPeriod,
        CanonicalFeature::TransitDuration,
        CanonicalFeature::TransitDepth,
        CanonicalFeature::PlanetRadius,
        CanonicalFeature::EquilibriumTemp,
        CanonicalFeature::Insolation,
        CanonicalFeature::StellarTemp,
        CanonicalFeature::StellarRadius,
        CanonicalFeature::StellarLogg,
        CanonicalFeature::Snr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalFeature::OrbitalPeriod => "orbital_period",
            CanonicalFeature::TransitDuration => "transit_duration",
            CanonicalFeature::TransitDepth => "transit_depth",
            CanonicalFeature::PlanetRadius => "planet_radius",
            CanonicalFeature::EquilibriumTemp => "equilibrium_temp",
            CanonicalFeature::Insolation => "insolation",
            CanonicalFeature::StellarTemp => "stellar_temp",
            CanonicalFeature::StellarRadius => "stellar_radius",
            CanonicalFeature::StellarLogg => "stellar_logg",
            CanonicalFeature::Snr => "snr",
        }
    }

    /// Normalized source names of this feature across all mission tables.
    pub fn aliases(self) -> Vec<String> {
        let mut aliases: Vec<String> = MISSIONS
            .iter()
            .flat_map(|m| m.renames.iter())
            .filter(|(_, feature)| *feature == self)
            .map(|(source, _)| crate::ingest::normalize(source))
            .collect();
        aliases.sort();
        aliases.dedup();
        aliases
    }
}

impl fmt::Display for CanonicalFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered feature names realized for one upload; the column contract
/// between harmonization, training and prediction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(Vec<String>);

impl FeatureSet {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn as_strs(&self) -> Vec<&str> {
        self.0.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }
}
