//! Derived attributes: planar area and representative point.

use geo::{Area, BooleanOps, Centroid, Geometry, InteriorPoint, MultiPolygon, Validation};
use tracing::{debug, info, warn};

use crate::crs::{Crs, Reprojector};
use crate::error::{GeoError, Result};
use crate::io::reproject;
use crate::models::FeatureLayer;

/// Which point stands in for a feature's centre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CentroidStrategy {
    /// Interior point, always inside the geometry
    #[default]
    Representative,
    /// Centre of mass, which may fall outside concave shapes
    Centroid,
}

impl std::str::FromStr for CentroidStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "representative" | "interior" => Ok(CentroidStrategy::Representative),
            "centroid" => Ok(CentroidStrategy::Centroid),
            other => Err(format!("unknown centroid strategy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CalcOptions {
    /// Projected system the measurements are taken in
    pub area_crs: Crs,
    /// System the layer (geometry and centroid) is returned in
    pub output_crs: Crs,
    pub strategy: CentroidStrategy,
}

impl Default for CalcOptions {
    fn default() -> Self {
        Self {
            area_crs: Crs::WEB_MERCATOR,
            output_crs: Crs::WGS84,
            strategy: CentroidStrategy::default(),
        }
    }
}

/// Fill `area_km2` and `centroid` for every feature with geometry.
///
/// Measurements are taken on a copy projected to `area_crs`; the centroid is
/// projected back and the layer is left in `output_crs`.
pub fn add_calculation(layer: &mut FeatureLayer, options: &CalcOptions) -> Result<()> {
    let source = layer
        .crs()
        .ok_or_else(|| GeoError::MissingReferenceSystem(layer.name.clone()))?;
    if options.area_crs.is_geographic() {
        return Err(GeoError::parse(
            &layer.name,
            "measure",
            format!("{} is not a projected system", options.area_crs),
        ));
    }

    let to_metric = Reprojector::new(source, options.area_crs)?;
    let from_metric = Reprojector::new(options.area_crs, source)?;
    info!(
        "Calculating area and {:?} point of {} features in {}",
        options.strategy,
        layer.len(),
        options.area_crs
    );

    let name = layer.name.clone();
    for (row, feature) in layer.features_mut().iter_mut().enumerate() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let metric = to_metric.project(geometry)?;
        feature.area_km2 = Some(metric.unsigned_area() / 1e6);

        let point = match options.strategy {
            CentroidStrategy::Representative => metric.interior_point(),
            CentroidStrategy::Centroid => metric.centroid(),
        };
        feature.centroid = match point {
            Some(p) => Some(from_metric.project_coord(p.0)?.into()),
            None => {
                debug!("{} row {}: empty geometry has no centroid", name, row);
                None
            }
        };
    }

    if source != options.output_crs {
        reproject(layer, options.output_crs)?;
    }
    Ok(())
}

fn repair(geometry: &Geometry<f64>) -> Option<Geometry<f64>> {
    let polygons = match geometry {
        Geometry::Polygon(p) if !p.is_valid() => MultiPolygon::new(vec![p.clone()]),
        Geometry::MultiPolygon(mp) if !mp.is_valid() => mp.clone(),
        _ => return None,
    };
    Some(Geometry::MultiPolygon(polygons.union(&MultiPolygon::new(vec![]))))
}

/// Re-node invalid polygons; returns how many features were rewritten
pub fn repair_geometries(layer: &mut FeatureLayer) -> usize {
    let mut repaired = 0;
    for (row, feature) in layer.features_mut().iter_mut().enumerate() {
        if let Some(fixed) = feature.geometry.as_ref().and_then(repair) {
            debug!("Repaired geometry at row {}", row);
            feature.geometry = Some(fixed);
            repaired += 1;
        }
    }
    if repaired > 0 {
        warn!("Repaired {} invalid geometries in {}", repaired, layer.name);
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Feature;
    use geo::{point, polygon, Contains, Rect};

    fn square_layer(crs: Crs, geometry: Geometry<f64>) -> FeatureLayer {
        let mut layer = FeatureLayer::new("sq", vec![]).with_crs(Some(crs));
        layer.push(Feature::new(Some(geometry), vec![]));
        layer
    }

    #[test]
    fn test_square_kilometre() {
        let square = Rect::new((0.0, 0.0), (1000.0, 1000.0)).to_polygon().into();
        let mut layer = square_layer(Crs::WEB_MERCATOR, square);
        let options = CalcOptions {
            output_crs: Crs::WEB_MERCATOR,
            ..Default::default()
        };
        add_calculation(&mut layer, &options).unwrap();

        let feature = &layer.features()[0];
        assert!((feature.area_km2.unwrap() - 1.0).abs() < 1e-9);
        let c = feature.centroid.unwrap();
        assert!((c.x() - 500.0).abs() < 1e-6 && (c.y() - 500.0).abs() < 1e-6);
    }

    #[test]
    fn test_output_in_wgs84_by_default() {
        let square = Rect::new((144.9, -37.9), (145.0, -37.8)).to_polygon().into();
        let mut layer = square_layer(Crs::GDA2020, square);
        add_calculation(&mut layer, &CalcOptions::default()).unwrap();
        assert_eq!(layer.crs(), Some(Crs::WGS84));
        let c = layer.features()[0].centroid.unwrap();
        assert!(c.x() > 144.9 && c.x() < 145.0 && c.y() > -37.9 && c.y() < -37.8);
    }

    #[test]
    fn test_area_invariant_under_round_trip() {
        let zone55 = Crs::from_epsg(7855).unwrap();
        let square: Geometry<f64> =
            Rect::new((320_000.0, 5_810_000.0), (325_000.0, 5_815_000.0)).to_polygon().into();
        let options = CalcOptions {
            area_crs: zone55,
            output_crs: zone55,
            ..Default::default()
        };

        let mut direct = square_layer(zone55, square.clone());
        add_calculation(&mut direct, &options).unwrap();

        let mut round_trip = square_layer(zone55, square);
        reproject(&mut round_trip, Crs::from_epsg(7856).unwrap()).unwrap();
        reproject(&mut round_trip, zone55).unwrap();
        add_calculation(&mut round_trip, &options).unwrap();

        let a = direct.features()[0].area_km2.unwrap();
        let b = round_trip.features()[0].area_km2.unwrap();
        assert!((a - 25.0).abs() < 1e-9);
        assert!((a - b).abs() / a < 1e-6, "{} vs {}", a, b);
    }

    #[test]
    fn test_points_have_zero_area() {
        let mut layer = square_layer(Crs::WEB_MERCATOR, point!(x: 10.0, y: 20.0).into());
        let options = CalcOptions {
            output_crs: Crs::WEB_MERCATOR,
            ..Default::default()
        };
        add_calculation(&mut layer, &options).unwrap();
        assert_eq!(layer.features()[0].area_km2, Some(0.0));
    }

    #[test]
    fn test_representative_point_inside_concave_shape() {
        // U shape whose centre of mass sits in the notch
        let u = polygon![
            (x: 0.0, y: 0.0), (x: 3000.0, y: 0.0), (x: 3000.0, y: 3000.0),
            (x: 2000.0, y: 3000.0), (x: 2000.0, y: 1000.0), (x: 1000.0, y: 1000.0),
            (x: 1000.0, y: 3000.0), (x: 0.0, y: 3000.0), (x: 0.0, y: 0.0),
        ];
        let mut layer = square_layer(Crs::WEB_MERCATOR, u.clone().into());
        let options = CalcOptions {
            output_crs: Crs::WEB_MERCATOR,
            ..Default::default()
        };
        add_calculation(&mut layer, &options).unwrap();
        assert!(u.contains(&layer.features()[0].centroid.unwrap()));

        let mut layer = square_layer(Crs::WEB_MERCATOR, u.clone().into());
        let options = CalcOptions {
            strategy: CentroidStrategy::Centroid,
            ..options
        };
        add_calculation(&mut layer, &options).unwrap();
        assert!(!u.contains(&layer.features()[0].centroid.unwrap()));
    }

    #[test]
    fn test_missing_crs() {
        let mut layer = FeatureLayer::new("bare", vec![]);
        assert!(matches!(
            add_calculation(&mut layer, &CalcOptions::default()),
            Err(GeoError::MissingReferenceSystem(_))
        ));
    }

    #[test]
    fn test_repair_bowtie() {
        let bowtie = polygon![
            (x: 0.0, y: 0.0), (x: 2.0, y: 2.0), (x: 2.0, y: 0.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0),
        ];
        let valid = Rect::new((5.0, 5.0), (6.0, 6.0)).to_polygon();
        let mut layer = FeatureLayer::new("t", vec![]);
        layer.push(Feature::new(Some(bowtie.into()), vec![]));
        layer.push(Feature::new(Some(valid.clone().into()), vec![]));

        assert_eq!(repair_geometries(&mut layer), 1);
        // Both lobes survive; the raw ring's signed lobes cancel out
        let fixed = layer.features()[0].geometry.as_ref().unwrap();
        assert!(matches!(fixed, Geometry::MultiPolygon(_)));
        assert!((fixed.unsigned_area() - 2.0).abs() < 1e-9);
        assert_eq!(layer.features()[1].geometry, Some(valid.into()));
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("centroid".parse::<CentroidStrategy>(), Ok(CentroidStrategy::Centroid));
        assert!("middle".parse::<CentroidStrategy>().is_err());
    }
}
