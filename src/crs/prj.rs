//! `.prj` (ESRI WKT) detection and generation.

use std::sync::LazyLock;

use regex::Regex;

use super::{Crs, CrsKind};

static AUTHORITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"AUTHORITY\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#).expect("valid regex")
});
static MGA_2020: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)GDA\s*2020.*MGA.*zone[\s_]*(\d{2})").expect("valid regex")
});
static MGA_1994: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)GDA[\s_]*(?:19)?94.*MGA.*zone[\s_]*(\d{2})").expect("valid regex")
});

/// Find the EPSG code described by a WKT string.
///
/// An explicit top-level `AUTHORITY["EPSG", ...]` wins; otherwise common ESRI
/// names are recognised. Returns `None` for anything unrecognised.
pub fn detect_epsg(wkt: &str) -> Option<u32> {
    // The CRS authority is the last one in the string (inner ones belong to
    // datum, spheroid and units)
    if let Some(code) = AUTHORITY
        .captures_iter(wkt)
        .last()
        .and_then(|c| c[1].parse::<u32>().ok())
    {
        return Some(code);
    }

    let compact: String = wkt.chars().filter(|c| !c.is_whitespace()).collect();
    let upper = compact.to_uppercase();

    if upper.starts_with("PROJCS") || upper.starts_with("PROJCRS") {
        if let Some(zone) = MGA_2020.captures(wkt).and_then(|c| c[1].parse::<u32>().ok()) {
            return Some(7800 + zone);
        }
        if let Some(zone) = MGA_1994.captures(wkt).and_then(|c| c[1].parse::<u32>().ok()) {
            return Some(28300 + zone);
        }
        if upper.contains("NEW_ZEALAND_TRANSVERSE_MERCATOR")
            || upper.contains("NEWZEALANDTRANSVERSEMERCATOR")
        {
            return Some(2193);
        }
        if upper.contains("WEB_MERCATOR") || upper.contains("PSEUDO-MERCATOR") {
            return Some(3857);
        }
        return None;
    }

    if upper.contains("GDA2020") {
        Some(7844)
    } else if upper.contains("GDA_1994") || upper.contains("GDA94") {
        Some(4283)
    } else if upper.contains("NZGD_2000") || upper.contains("NZGD2000") {
        Some(4167)
    } else if upper.contains("PNG94") || upper.contains("PAPUA_NEW_GUINEA_1994") {
        Some(5546)
    } else if upper.contains("WGS_1984") || upper.contains("WGS84") {
        Some(4326)
    } else {
        None
    }
}

fn geogcs(crs: &Crs) -> String {
    let datum = crs.datum();
    let ellipsoid = datum.ellipsoid();
    format!(
        r#"GEOGCS["GCS_{name}",DATUM["D_{name}",SPHEROID["{ellipsoid}",{a:.1},{rf}]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#,
        name = datum.wkt_name(),
        ellipsoid = ellipsoid.name,
        a = ellipsoid.semi_major,
        rf = ellipsoid.inverse_flattening,
    )
}

/// ESRI-flavoured WKT for a `.prj` sidecar or a GeoPackage SRS row
pub fn esri_wkt(crs: &Crs) -> String {
    match crs.kind() {
        CrsKind::Geographic => geogcs(crs),
        CrsKind::WebMercator => format!(
            r#"PROJCS["{}",{},PROJECTION["Mercator_Auxiliary_Sphere"],PARAMETER["False_Easting",0.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",0.0],PARAMETER["Standard_Parallel_1",0.0],PARAMETER["Auxiliary_Sphere_Type",0.0],UNIT["Meter",1.0]]"#,
            crs.name(),
            geogcs(crs)
        ),
        CrsKind::TransverseMercator(tm) => format!(
            r#"PROJCS["{}",{},PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",{:.1}],PARAMETER["False_Northing",{:.1}],PARAMETER["Central_Meridian",{:.1}],PARAMETER["Scale_Factor",{}],PARAMETER["Latitude_Of_Origin",0.0],UNIT["Meter",1.0]]"#,
            crs.name(),
            geogcs(crs),
            tm.false_easting(),
            tm.false_northing(),
            tm.central_meridian(),
            tm.scale()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABS_GDA2020: &str = r#"GEOGCS["GDA2020",DATUM["GDA2020",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

    #[test]
    fn test_detect_abs_prj() {
        assert_eq!(detect_epsg(ABS_GDA2020), Some(7844));
    }

    #[test]
    fn test_detect_authority_prefers_last() {
        let wkt = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],AUTHORITY["EPSG","4326"]]"#;
        assert_eq!(detect_epsg(wkt), Some(4326));
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_epsg(r#"GEOGCS["Tokyo"]"#), None);
    }

    #[test]
    fn test_generated_wkt_is_detectable() {
        for code in [4326, 4283, 7844, 4167, 5546, 3857, 7855, 28356, 2193] {
            let crs = Crs::from_epsg(code).unwrap();
            assert_eq!(detect_epsg(&esri_wkt(&crs)), Some(code), "EPSG:{}", code);
        }
    }
}
