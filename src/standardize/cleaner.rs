//! ABS table cleaning and capital-region filtering.

use tracing::{info, warn};

use super::names::{sanitize_legal_name, split_name, CENTRE};
use super::scope::CapitalCity;
use crate::error::{GeoError, Result};
use crate::models::{columns, AttributeValue, FeatureLayer};

pub const SAL_NAME: &str = "sal_name";

/// Clean a suburb table published by the Australian Bureau of Statistics.
///
/// `code` is a state code (`NSW`) or a city code (`SYD`) of an in-scope
/// capital. Returns a copy with `city_name`, `state_code`, `sal_name_clean`,
/// `base_name`, `direction` and `is_centre` appended.
pub fn clean_abs_table(layer: &FeatureLayer, code: &str) -> Result<FeatureLayer> {
    let capital = CapitalCity::lookup(code)
        .filter(|c| !c.gccsa_code.eq_ignore_ascii_case(code.trim()))
        .ok_or_else(|| GeoError::OutOfScope(code.trim().to_uppercase()))?;
    if layer.is_empty() {
        return Err(GeoError::EmptyData(format!("{} has no rows", layer.name)));
    }
    if !layer.has_column(SAL_NAME) {
        return Err(GeoError::parse(
            &layer.name,
            "clean",
            format!("column '{}' not found", SAL_NAME),
        ));
    }

    let mut out = layer.clone();
    for row in 0..out.len() {
        let cleaned = match out.get(row, SAL_NAME) {
            Some(AttributeValue::Text(raw)) => AttributeValue::Text(sanitize_legal_name(raw)),
            Some(other) => {
                warn!("Row {}: non-text {} {:?} left as is", row, SAL_NAME, other);
                other.clone()
            }
            None => AttributeValue::Null,
        };
        let (base, direction) = match &cleaned {
            AttributeValue::Null => (AttributeValue::Null, CENTRE.to_string()),
            value => {
                let (base, direction) = split_name(&value.to_string());
                (AttributeValue::Text(base), direction)
            }
        };
        let is_centre = i64::from(direction == CENTRE);

        out.set(row, "city_name", capital.city_name.into());
        out.set(row, "state_code", capital.state_code.into());
        out.set(row, "sal_name_clean", cleaned);
        out.set(row, "base_name", base);
        out.set(row, "direction", direction.into());
        out.set(row, "is_centre", is_centre.into());
    }

    info!(
        "Cleaned {} rows of {} for {}",
        out.len(),
        layer.name,
        capital.city_name
    );
    Ok(out)
}

/// Keep rows whose `region_name` contains any of `names` (case-insensitive)
pub fn filter_by_names(layer: &mut FeatureLayer, names: &[String]) {
    let needles: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
    let Some(idx) = layer.column_index(columns::REGION_NAME) else {
        warn!("{} has no {} column, nothing kept", layer.name, columns::REGION_NAME);
        layer.retain(|_, _| false);
        return;
    };
    let before = layer.len();
    layer.retain(|_, feature| match &feature.attributes[idx] {
        AttributeValue::Null => false,
        value => {
            let haystack = value.to_string().to_lowercase();
            needles.iter().any(|n| haystack.contains(n.as_str()))
        }
    });
    info!("Kept {} of {} rows matching {:?}", layer.len(), before, names);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Feature;

    fn sal_table() -> FeatureLayer {
        let mut layer = FeatureLayer::new("sal.csv", vec![SAL_NAME.into(), "pop".into()]);
        let rows = [("North Sydney", 100i64), ("City of Sydney", 200), ("Parramatta", 300)];
        for (name, pop) in rows {
            layer.push(Feature::new(None, vec![name.into(), pop.into()]));
        }
        layer
    }

    #[test]
    fn test_clean_by_state_code() {
        let cleaned = clean_abs_table(&sal_table(), "nsw").unwrap();
        assert_eq!(cleaned.len(), 3);
        assert_eq!(cleaned.text(0, "city_name").as_deref(), Some("Sydney"));
        assert_eq!(cleaned.text(0, "state_code").as_deref(), Some("NSW"));
        assert_eq!(cleaned.text(0, "base_name").as_deref(), Some("Sydney"));
        assert_eq!(cleaned.text(0, "direction").as_deref(), Some("North"));
        assert_eq!(cleaned.get(0, "is_centre"), Some(&AttributeValue::Integer(0)));
        assert_eq!(cleaned.text(1, "sal_name_clean").as_deref(), Some("Sydney"));
        assert_eq!(cleaned.get(2, "is_centre"), Some(&AttributeValue::Integer(1)));
    }

    #[test]
    fn test_clean_by_city_code() {
        let cleaned = clean_abs_table(&sal_table(), "MEL").unwrap();
        assert_eq!(cleaned.text(0, "city_name").as_deref(), Some("Melbourne"));
        assert_eq!(cleaned.text(0, "state_code").as_deref(), Some("VIC"));
    }

    #[test]
    fn test_out_of_scope() {
        assert!(matches!(
            clean_abs_table(&sal_table(), "PER"),
            Err(GeoError::OutOfScope(_))
        ));
    }

    #[test]
    fn test_empty_and_missing_column() {
        let empty = FeatureLayer::new("e", vec![SAL_NAME.into()]);
        assert!(matches!(
            clean_abs_table(&empty, "SYD"),
            Err(GeoError::EmptyData(_))
        ));

        let mut wrong = FeatureLayer::new("w", vec!["name".into()]);
        wrong.push(Feature::new(None, vec!["x".into()]));
        assert!(matches!(
            clean_abs_table(&wrong, "SYD"),
            Err(GeoError::ParseFailure { .. })
        ));
    }

    #[test]
    fn test_filter_by_names() {
        let mut layer = FeatureLayer::new("gcc", vec![columns::REGION_NAME.into()]);
        for name in ["Greater Sydney", "Rest of NSW", "Greater Melbourne", "Greater Perth"] {
            layer.push(Feature::new(None, vec![name.into()]));
        }
        filter_by_names(&mut layer, &["sydney".into(), "MELBOURNE".into()]);
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.region_name(1).as_deref(), Some("Greater Melbourne"));
    }
}
