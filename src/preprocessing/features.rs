//! Radius / temperature feature engineering

use crate::error::{OrbitalError, Result};
use crate::schema::CanonicalFeature;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Which temperature drives the interaction features. Only one is ever used;
/// the other serves as fallback when the preferred one is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperaturePreference {
    Stellar,
    Equilibrium,
}

impl FromStr for TemperaturePreference {
    type Err = OrbitalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "stellar" => Ok(TemperaturePreference::Stellar),
            "equilibrium" | "eq" => Ok(TemperaturePreference::Equilibrium),
            other => Err(OrbitalError::InvalidParameter {
                name: "temperature_preference".into(),
                value: other.into(),
                reason: "expected 'stellar' or 'equilibrium'".into(),
            }),
        }
    }
}

impl TemperaturePreference {
    fn order(self) -> [(CanonicalFeature, &'static str); 2] {
        let stellar = (CanonicalFeature::StellarTemp, "stellar_temp");
        let equilibrium = (CanonicalFeature::EquilibriumTemp, "eq_temp");
        match self {
            TemperaturePreference::Stellar => [stellar, equilibrium],
            TemperaturePreference::Equilibrium => [equilibrium, stellar],
        }
    }
}

/// Engineered columns derived from the base features, in output order:
/// planet radius squared, temperature × / ÷ planet radius, stellar radius
/// squared, temperature × / ÷ stellar radius. A zero denominator divides by 1.
pub fn engineer_features(
    base: &BTreeMap<CanonicalFeature, Vec<Option<f64>>>,
    preference: TemperaturePreference,
) -> Vec<(String, Vec<Option<f64>>)> {
    let temperature = preference
        .order()
        .into_iter()
        .find_map(|(feature, prefix)| base.get(&feature).map(|values| (prefix, values)));

    let radii = [
        (CanonicalFeature::PlanetRadius, "planet_radius", "planet_rad"),
        (CanonicalFeature::StellarRadius, "stellar_radius", "stellar_rad"),
    ];

    let mut out = Vec::new();
    for (feature, squared_prefix, suffix) in radii {
        let Some(radius) = base.get(&feature) else {
            continue;
        };

        out.push((
            format!("{}_sq", squared_prefix),
            radius.iter().map(|r| r.map(|r| r * r)).collect(),
        ));

        if let Some((prefix, temp)) = temperature {
            out.push((
                format!("{}_x_{}", prefix, suffix),
                zip_with(temp, radius, |t, r| t * r),
            ));
            out.push((
                format!("{}_div_{}", prefix, suffix),
                zip_with(temp, radius, |t, r| t / if r == 0.0 { 1.0 } else { r }),
            ));
        }
    }
    out
}

fn zip_with(
    a: &[Option<f64>],
    b: &[Option<f64>],
    f: impl Fn(f64, f64) -> f64,
) -> Vec<Option<f64>> {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some(f(*x, *y)),
            _ => None,
        })
        .collect()
}
