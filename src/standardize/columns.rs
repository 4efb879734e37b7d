//! Column header mapping from national schemas to canonical names.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::crs::Jurisdiction;
use crate::models::{columns, FeatureLayer};

const AUSTRALIA: &[(&str, &str)] = &[
    ("LGA_CODE24", columns::REGION_CODE),
    ("LGA_NAME24", columns::REGION_NAME),
    ("STE_NAME21", columns::STATE_NAME),
];

const NEW_ZEALAND: &[(&str, &str)] = &[
    ("TA2024_V1_", columns::REGION_CODE),
    ("TA2024_NAM", columns::REGION_NAME),
    ("REGC2024_N", columns::STATE_NAME),
];

const PAPUA_NEW_GUINEA: &[(&str, &str)] = &[
    ("ADM2_PCODE", columns::REGION_CODE),
    ("ADM2_EN", columns::REGION_NAME),
    ("ADM1_EN", columns::STATE_NAME),
];

/// Fixed header mapping for a jurisdiction, if it publishes one schema
pub fn name_mapping(jurisdiction: Jurisdiction) -> Option<&'static [(&'static str, &'static str)]> {
    match jurisdiction {
        Jurisdiction::Australia => Some(AUSTRALIA),
        Jurisdiction::NewZealand => Some(NEW_ZEALAND),
        Jurisdiction::PapuaNewGuinea => Some(PAPUA_NEW_GUINEA),
        Jurisdiction::Web => None,
    }
}

/// Tried in order; the first pattern a header matches decides its name
static PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)(LGA|SAL|TA|ADM2).*NAME", columns::REGION_NAME),
        (r"(?i)(STE|REGC|ADM1).*NAME", columns::STATE_NAME),
        (r"(?i)(LGA|SAL|TA|ADM2).*(CODE|PCODE)", columns::REGION_CODE),
    ]
    .into_iter()
    .map(|(pattern, target)| (Regex::new(pattern).expect("valid column regex"), target))
    .collect()
});

fn apply(layer: &mut FeatureLayer, renames: &[(String, &'static str)]) -> usize {
    let mut applied = 0;
    for (from, to) in renames {
        if layer.has_column(to) {
            debug!("{} already has '{}', keeping '{}'", layer.name, to, from);
            continue;
        }
        if layer.rename_column(from, to) {
            debug!("Renamed '{}' to '{}'", from, to);
            applied += 1;
        }
    }
    applied
}

/// Rename headers by pattern.
///
/// Each canonical name is assigned to the first matching column only; later
/// matches keep their original header. Returns the number of renames.
pub fn auto_standardize(layer: &mut FeatureLayer) -> usize {
    let mut renames: Vec<(String, &'static str)> = Vec::new();
    for column in layer.columns() {
        let target = PATTERNS
            .iter()
            .find(|(regex, _)| regex.is_match(column))
            .map(|(_, target)| *target);
        if let Some(target) = target {
            if !renames.iter().any(|(_, t)| *t == target) {
                renames.push((column.clone(), target));
            }
        }
    }
    let applied = apply(layer, &renames);
    info!("Pattern-standardized {} columns in {}", applied, layer.name);
    applied
}

/// Apply a country's fixed mapping, falling back to the patterns when the
/// country has none. Returns the number of renames.
pub fn standardize_columns(layer: &mut FeatureLayer, country: &str) -> usize {
    let Some(mapping) = Jurisdiction::from_name(country).and_then(name_mapping) else {
        debug!("No fixed mapping for '{}', using patterns", country);
        return auto_standardize(layer);
    };
    let renames: Vec<(String, &'static str)> = mapping
        .iter()
        .map(|(from, to)| (from.to_string(), *to))
        .collect();
    let applied = apply(layer, &renames);
    info!("Standardized {} columns in {} for {}", applied, layer.name, country);
    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(columns: &[&str]) -> FeatureLayer {
        FeatureLayer::new("t", columns.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn test_australian_mapping() {
        let mut l = layer(&["LGA_CODE24", "LGA_NAME24", "STE_NAME21", "AREASQKM"]);
        assert_eq!(standardize_columns(&mut l, "Australia"), 3);
        assert_eq!(l.columns(), &["region_code", "region_name", "state_name", "AREASQKM"]);
    }

    #[test]
    fn test_new_zealand_mapping_case_insensitive_country() {
        let mut l = layer(&["TA2024_V1_", "TA2024_NAM", "REGC2024_N"]);
        standardize_columns(&mut l, "  new   ZEALAND ");
        assert_eq!(l.columns(), &["region_code", "region_name", "state_name"]);
    }

    #[test]
    fn test_png_mapping() {
        let mut l = layer(&["ADM1_EN", "ADM2_EN", "ADM2_PCODE"]);
        standardize_columns(&mut l, "Papua New Guinea");
        assert_eq!(l.columns(), &["state_name", "region_name", "region_code"]);
    }

    #[test]
    fn test_unknown_country_uses_patterns() {
        let mut l = layer(&["SAL_CODE21", "SAL_NAME21", "STE_NAME21"]);
        assert_eq!(standardize_columns(&mut l, "Atlantis"), 3);
        assert_eq!(l.columns(), &["region_code", "region_name", "state_name"]);
    }

    #[test]
    fn test_first_match_wins() {
        let mut l = layer(&["LGA_NAME24", "SAL_NAME21"]);
        auto_standardize(&mut l);
        assert_eq!(l.columns(), &["region_name", "SAL_NAME21"]);
    }

    #[test]
    fn test_existing_canonical_column_kept() {
        let mut l = layer(&["region_name", "LGA_NAME24"]);
        assert_eq!(auto_standardize(&mut l), 0);
        assert_eq!(l.columns(), &["region_name", "LGA_NAME24"]);
    }
}
