//! Well-Known-Binary encoding for GeoPackage blobs and GeoParquet columns.
//!
//! Writes little-endian ISO WKB in two dimensions. Z and M ordinates are
//! dropped on read.

use geo::{Geometry, LineString};
use geo_traits::to_geo::ToGeoGeometry;
use wkb::writer::{write_geometry, WriteOptions};
use wkb::Endianness;

use crate::error::{GeoError, Result};

/// Rewrite the `geo`-only shapes as their OGC equivalents
fn ogc_shape(geometry: &Geometry<f64>) -> Option<Geometry<f64>> {
    match geometry {
        Geometry::Line(l) => Some(LineString::new(vec![l.start, l.end]).into()),
        Geometry::Rect(r) => Some(r.to_polygon().into()),
        Geometry::Triangle(t) => Some(t.to_polygon().into()),
        _ => None,
    }
}

pub fn write_wkb(geometry: &Geometry<f64>) -> Result<Vec<u8>> {
    let converted = ogc_shape(geometry);
    let geometry = converted.as_ref().unwrap_or(geometry);

    let mut out = Vec::new();
    let options = WriteOptions {
        endianness: Endianness::LittleEndian,
    };
    write_geometry(&mut out, geometry, &options)
        .map_err(|e| GeoError::parse("geometry", "encode WKB", e))?;
    Ok(out)
}

/// Decode a WKB buffer; `source` names the file for error messages
pub fn read_wkb(bytes: &[u8], source: &str) -> Result<Geometry<f64>> {
    let parsed =
        wkb::reader::read_wkb(bytes).map_err(|e| GeoError::parse(source, "decode WKB", e))?;
    parsed
        .try_to_geometry()
        .ok_or_else(|| GeoError::parse(source, "decode WKB", "empty point"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon, MultiPolygon, Rect};

    #[test]
    fn test_point_layout() {
        let bytes = write_wkb(&point!(x: 1.0, y: 2.0).into()).unwrap();
        assert_eq!(bytes.len(), 21);
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..5], &1u32.to_le_bytes());
        assert_eq!(&bytes[5..13], &1.0f64.to_le_bytes());
    }

    #[test]
    fn test_multipolygon_with_hole_round_trip() {
        let poly = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 0.0)],
            interiors: [[(x: 1.0, y: 1.0), (x: 2.0, y: 1.0), (x: 2.0, y: 2.0), (x: 1.0, y: 1.0)]],
        );
        let original = Geometry::MultiPolygon(MultiPolygon::new(vec![poly]));
        let decoded = read_wkb(&write_wkb(&original).unwrap(), "test").unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_rect_written_as_polygon() {
        let rect = Rect::new((0.0, 0.0), (1.0, 1.0));
        let decoded = read_wkb(&write_wkb(&rect.into()).unwrap(), "test").unwrap();
        assert_eq!(decoded, Geometry::Polygon(rect.to_polygon()));
    }

    #[test]
    fn test_big_endian_point_z() {
        // Big-endian ISO PointZ (1001)
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&1001u32.to_be_bytes());
        for v in [3.0f64, 4.0, 99.0] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        let decoded = read_wkb(&bytes, "test").unwrap();
        assert_eq!(decoded, Geometry::Point(point!(x: 3.0, y: 4.0)));
    }
}
