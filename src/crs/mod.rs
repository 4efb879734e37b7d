//! Coordinate reference systems used by Oceania boundary datasets.
//!
//! Each supported EPSG code resolves to a [`Crs`] carrying its datum and
//! projection. Reprojection goes through geographic coordinates; datum shifts
//! between the ITRF-aligned datums listed here are not applied (they agree to
//! within a couple of metres). Build with the `proj` feature to delegate to
//! libproj instead.

mod prj;
mod projection;
mod projjson;

pub use prj::{detect_epsg, esri_wkt};
pub use projjson::projjson;
pub use projection::{Reprojector, TransverseMercator};

use std::fmt;

use crate::error::{GeoError, Result};

/// Geodetic datum of a reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datum {
    Wgs84,
    Gda94,
    Gda2020,
    Nzgd2000,
    Png94,
}

/// Reference ellipsoid parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub name: &'static str,
    pub semi_major: f64,
    pub inverse_flattening: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        name: "WGS_1984",
        semi_major: 6_378_137.0,
        inverse_flattening: 298.257_223_563,
    };

    pub const GRS80: Ellipsoid = Ellipsoid {
        name: "GRS_1980",
        semi_major: 6_378_137.0,
        inverse_flattening: 298.257_222_101,
    };

    pub fn flattening(&self) -> f64 {
        1.0 / self.inverse_flattening
    }
}

impl Datum {
    pub fn ellipsoid(&self) -> Ellipsoid {
        match self {
            Datum::Wgs84 => Ellipsoid::WGS84,
            _ => Ellipsoid::GRS80,
        }
    }

    /// Name used in ESRI/OGC WKT (`GDA2020`, `NZGD_2000`, ...)
    pub fn wkt_name(&self) -> &'static str {
        match self {
            Datum::Wgs84 => "WGS_1984",
            Datum::Gda94 => "GDA_1994",
            Datum::Gda2020 => "GDA2020",
            Datum::Nzgd2000 => "NZGD_2000",
            Datum::Png94 => "PNG94",
        }
    }

    /// EPSG code of the geographic system on this datum
    pub fn geographic_epsg(&self) -> u32 {
        match self {
            Datum::Wgs84 => 4326,
            Datum::Gda94 => 4283,
            Datum::Gda2020 => 7844,
            Datum::Nzgd2000 => 4167,
            Datum::Png94 => 5546,
        }
    }
}

/// How planar coordinates relate to geographic ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CrsKind {
    /// Longitude/latitude in degrees
    Geographic,
    /// Spherical (pseudo) Mercator, EPSG:3857
    WebMercator,
    /// Transverse Mercator grid in metres (MGA, NZTM)
    TransverseMercator(TransverseMercator),
}

/// A resolved reference system.
#[derive(Debug, Clone, Copy)]
pub struct Crs {
    epsg: u32,
    datum: Datum,
    kind: CrsKind,
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        self.epsg == other.epsg
    }
}

impl Eq for Crs {}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl Crs {
    pub const WGS84: Crs = Crs::geographic(4326, Datum::Wgs84);
    pub const GDA2020: Crs = Crs::geographic(7844, Datum::Gda2020);
    pub const WEB_MERCATOR: Crs = Crs {
        epsg: 3857,
        datum: Datum::Wgs84,
        kind: CrsKind::WebMercator,
    };

    const fn geographic(epsg: u32, datum: Datum) -> Crs {
        Crs {
            epsg,
            datum,
            kind: CrsKind::Geographic,
        }
    }

    /// Resolve an EPSG code
    pub fn from_epsg(epsg: u32) -> Result<Crs> {
        let crs = match epsg {
            4326 => Crs::WGS84,
            4283 => Crs::geographic(4283, Datum::Gda94),
            7844 => Crs::GDA2020,
            4167 => Crs::geographic(4167, Datum::Nzgd2000),
            5546 => Crs::geographic(5546, Datum::Png94),
            // Older PNG94 datasets are labelled 5110
            5110 => Crs::geographic(5546, Datum::Png94),
            3857 => Crs::WEB_MERCATOR,
            // GDA2020 / MGA zones 46-59
            7846..=7859 => Crs::mga(epsg, Datum::Gda2020, (epsg - 7800) as u8),
            // GDA94 / MGA zones 48-58
            28348..=28358 => Crs::mga(epsg, Datum::Gda94, (epsg - 28300) as u8),
            // NZGD2000 / New Zealand Transverse Mercator 2000
            2193 => Crs {
                epsg,
                datum: Datum::Nzgd2000,
                kind: CrsKind::TransverseMercator(TransverseMercator::new(
                    Datum::Nzgd2000.ellipsoid(),
                    173.0,
                    0.9996,
                    1_600_000.0,
                    10_000_000.0,
                )),
            },
            other => return Err(GeoError::UnknownReferenceSystem(other)),
        };
        Ok(crs)
    }

    /// Parse `EPSG:7844`, `epsg:7844` or a bare `7844`
    pub fn parse(text: &str) -> Result<Crs> {
        let trimmed = text.trim();
        let code = trimmed
            .strip_prefix("EPSG:")
            .or_else(|| trimmed.strip_prefix("epsg:"))
            .unwrap_or(trimmed);
        let epsg = code.parse::<u32>().map_err(|e| {
            GeoError::parse(trimmed, "parse reference system", e)
        })?;
        Crs::from_epsg(epsg)
    }

    fn mga(epsg: u32, datum: Datum, zone: u8) -> Crs {
        let central_meridian = 6.0 * f64::from(zone) - 183.0;
        Crs {
            epsg,
            datum,
            kind: CrsKind::TransverseMercator(TransverseMercator::new(
                datum.ellipsoid(),
                central_meridian,
                0.9996,
                500_000.0,
                10_000_000.0,
            )),
        }
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    pub fn datum(&self) -> Datum {
        self.datum
    }

    pub fn kind(&self) -> CrsKind {
        self.kind
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self.kind, CrsKind::Geographic)
    }

    /// Human-readable name, also used as the WKT `PROJCS`/`GEOGCS` label
    pub fn name(&self) -> String {
        match self.kind {
            CrsKind::Geographic => format!("GCS_{}", self.datum.wkt_name()),
            CrsKind::WebMercator => "WGS_1984_Web_Mercator_Auxiliary_Sphere".to_string(),
            CrsKind::TransverseMercator(_) if self.epsg == 2193 => {
                "NZGD_2000_New_Zealand_Transverse_Mercator".to_string()
            }
            CrsKind::TransverseMercator(_) => {
                let zone = match self.datum {
                    Datum::Gda2020 => self.epsg - 7800,
                    _ => self.epsg - 28300,
                };
                format!("{}_MGA_Zone_{}", self.datum.wkt_name(), zone)
            }
        }
    }
}

/// Jurisdictions publishing boundary datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Jurisdiction {
    Australia,
    NewZealand,
    PapuaNewGuinea,
    Web,
}

impl Jurisdiction {
    pub fn all() -> &'static [Jurisdiction] {
        &[
            Jurisdiction::Australia,
            Jurisdiction::NewZealand,
            Jurisdiction::PapuaNewGuinea,
            Jurisdiction::Web,
        ]
    }

    /// Match a free-text country name, ignoring case and extra whitespace
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        match normalized.as_str() {
            "australia" | "au" | "aus" => Some(Jurisdiction::Australia),
            "new zealand" | "nz" | "nzl" => Some(Jurisdiction::NewZealand),
            "papua new guinea" | "png" => Some(Jurisdiction::PapuaNewGuinea),
            "web" | "global" | "wgs84" => Some(Jurisdiction::Web),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Jurisdiction::Australia => "Australia",
            Jurisdiction::NewZealand => "New Zealand",
            Jurisdiction::PapuaNewGuinea => "Papua New Guinea",
            Jurisdiction::Web => "Web",
        }
    }

    /// Authoritative reference system for data published by this jurisdiction
    pub fn crs(&self) -> Crs {
        match self {
            Jurisdiction::Australia => Crs::GDA2020,
            Jurisdiction::NewZealand => Crs::geographic(4167, Datum::Nzgd2000),
            Jurisdiction::PapuaNewGuinea => Crs::geographic(5546, Datum::Png94),
            Jurisdiction::Web => Crs::WGS84,
        }
    }
}

/// Regional CRS for a country name; unknown names get WGS84.
pub fn regional_crs(country: &str) -> Crs {
    Jurisdiction::from_name(country)
        .map(|j| j.crs())
        .unwrap_or(Crs::WGS84)
}
