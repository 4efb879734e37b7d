//! PROJJSON descriptions of the registry systems, for GeoParquet `crs`.

use serde_json::{json, Value};

use super::{Crs, CrsKind, Datum};

const SCHEMA: &str = "https://proj.org/schemas/v0.7/projjson.schema.json";

fn datum_names(datum: Datum) -> (&'static str, &'static str) {
    // (CRS name, datum name)
    match datum {
        Datum::Wgs84 => ("WGS 84", "World Geodetic System 1984"),
        Datum::Gda94 => ("GDA94", "Geocentric Datum of Australia 1994"),
        Datum::Gda2020 => ("GDA2020", "Geocentric Datum of Australia 2020"),
        Datum::Nzgd2000 => ("NZGD2000", "New Zealand Geodetic Datum 2000"),
        Datum::Png94 => ("PNG94", "Papua New Guinea Geodetic Datum 1994"),
    }
}

fn id(code: u32) -> Value {
    json!({ "authority": "EPSG", "code": code })
}

fn axis(name: &str, abbreviation: &str, direction: &str, unit: &str) -> Value {
    json!({
        "name": name,
        "abbreviation": abbreviation,
        "direction": direction,
        "unit": unit,
    })
}

fn parameter(name: &str, value: f64, unit: &str, code: u32) -> Value {
    json!({ "name": name, "value": value, "unit": unit, "id": id(code) })
}

fn geographic(datum: Datum) -> Value {
    let (name, datum_name) = datum_names(datum);
    let ellipsoid = datum.ellipsoid();
    json!({
        "type": "GeographicCRS",
        "name": name,
        "datum": {
            "type": "GeodeticReferenceFrame",
            "name": datum_name,
            "ellipsoid": {
                "name": ellipsoid.name.replace('_', " "),
                "semi_major_axis": ellipsoid.semi_major,
                "inverse_flattening": ellipsoid.inverse_flattening,
            },
        },
        "coordinate_system": {
            "subtype": "ellipsoidal",
            "axis": [
                axis("Geodetic latitude", "Lat", "north", "degree"),
                axis("Geodetic longitude", "Lon", "east", "degree"),
            ],
        },
        "id": id(datum.geographic_epsg()),
    })
}

fn projected(crs: &Crs, name: String, conversion: Value) -> Value {
    json!({
        "$schema": SCHEMA,
        "type": "ProjectedCRS",
        "name": name,
        "base_crs": geographic(crs.datum()),
        "conversion": conversion,
        "coordinate_system": {
            "subtype": "Cartesian",
            "axis": [
                axis("Easting", "E", "east", "metre"),
                axis("Northing", "N", "north", "metre"),
            ],
        },
        "id": id(crs.epsg()),
    })
}

/// Full PROJJSON object for a registry system
pub fn projjson(crs: &Crs) -> Value {
    let (base_name, _) = datum_names(crs.datum());
    match crs.kind() {
        CrsKind::Geographic => {
            let mut value = geographic(crs.datum());
            value["$schema"] = json!(SCHEMA);
            value
        }
        CrsKind::WebMercator => projected(
            crs,
            "WGS 84 / Pseudo-Mercator".to_string(),
            json!({
                "name": "Popular Visualisation Pseudo-Mercator",
                "method": {
                    "name": "Popular Visualisation Pseudo Mercator",
                    "id": id(1024),
                },
                "parameters": [
                    parameter("Latitude of natural origin", 0.0, "degree", 8801),
                    parameter("Longitude of natural origin", 0.0, "degree", 8802),
                    parameter("False easting", 0.0, "metre", 8806),
                    parameter("False northing", 0.0, "metre", 8807),
                ],
            }),
        ),
        CrsKind::TransverseMercator(tm) => {
            let (name, conversion_name) = if crs.epsg() == 2193 {
                (
                    format!("{} / New Zealand Transverse Mercator 2000", base_name),
                    "New Zealand Transverse Mercator 2000".to_string(),
                )
            } else {
                let zone = match crs.datum() {
                    Datum::Gda2020 => crs.epsg() - 7800,
                    _ => crs.epsg() - 28300,
                };
                (
                    format!("{} / MGA zone {}", base_name, zone),
                    format!("Map Grid of Australia zone {}", zone),
                )
            };
            projected(
                crs,
                name,
                json!({
                    "name": conversion_name,
                    "method": { "name": "Transverse Mercator", "id": id(9807) },
                    "parameters": [
                        parameter("Latitude of natural origin", 0.0, "degree", 8801),
                        parameter(
                            "Longitude of natural origin",
                            tm.central_meridian(),
                            "degree",
                            8802,
                        ),
                        parameter("Scale factor at natural origin", tm.scale(), "unity", 8805),
                        parameter("False easting", tm.false_easting(), "metre", 8806),
                        parameter("False northing", tm.false_northing(), "metre", 8807),
                    ],
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geographic_members() {
        let value = projjson(&Crs::GDA2020);
        assert_eq!(value["type"], "GeographicCRS");
        assert_eq!(value["name"], "GDA2020");
        assert_eq!(value["datum"]["ellipsoid"]["name"], "GRS 1980");
        assert_eq!(value["coordinate_system"]["axis"].as_array().unwrap().len(), 2);
        assert_eq!(value["id"]["code"], 7844);
    }

    #[test]
    fn test_mga_zone() {
        let value = projjson(&Crs::from_epsg(7855).unwrap());
        assert_eq!(value["type"], "ProjectedCRS");
        assert_eq!(value["name"], "GDA2020 / MGA zone 55");
        assert_eq!(value["base_crs"]["id"]["code"], 7844);
        assert_eq!(value["conversion"]["method"]["id"]["code"], 9807);
        assert_eq!(value["conversion"]["parameters"][1]["value"], 147.0);
        assert_eq!(value["coordinate_system"]["subtype"], "Cartesian");
        assert_eq!(value["id"]["code"], 7855);
    }

    #[test]
    fn test_every_registry_system_is_typed() {
        for code in [4326, 4283, 7844, 4167, 5546, 3857, 28356, 2193] {
            let value = projjson(&Crs::from_epsg(code).unwrap());
            assert!(value["type"].is_string(), "EPSG:{}", code);
            assert!(value.get("coordinate_system").is_some(), "EPSG:{}", code);
            assert_eq!(value["id"]["code"], code, "EPSG:{}", code);
        }
    }
}
