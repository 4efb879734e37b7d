//! Native forward/inverse projections and the layer reprojector.

use geo::{Coord, Geometry, MapCoords};

use super::{Crs, CrsKind, Ellipsoid};
use crate::error::{GeoError, Result};

const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;
const WEB_MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// Transverse Mercator using the Krüger series to fourth order in n.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransverseMercator {
    central_meridian: f64,
    scale: f64,
    false_easting: f64,
    false_northing: f64,
    eccentricity: f64,
    rectifying_radius: f64,
    alpha: [f64; 4],
    beta: [f64; 4],
    delta: [f64; 4],
}

impl TransverseMercator {
    pub fn new(
        ellipsoid: Ellipsoid,
        central_meridian: f64,
        scale: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let f = ellipsoid.flattening();
        let n = f / (2.0 - f);
        let n2 = n * n;
        let n3 = n2 * n;
        let n4 = n3 * n;

        let rectifying_radius =
            ellipsoid.semi_major / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0);

        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0,
            61.0 * n3 / 240.0 - 103.0 * n4 / 140.0,
            49561.0 * n4 / 161280.0,
        ];
        let beta = [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0,
            n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0,
            17.0 * n3 / 480.0 - 37.0 * n4 / 840.0,
            4397.0 * n4 / 161280.0,
        ];
        let delta = [
            2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3 + 116.0 * n4 / 45.0,
            7.0 * n2 / 3.0 - 8.0 * n3 / 5.0 - 227.0 * n4 / 45.0,
            56.0 * n3 / 15.0 - 136.0 * n4 / 35.0,
            4279.0 * n4 / 630.0,
        ];

        Self {
            central_meridian,
            scale,
            false_easting,
            false_northing,
            eccentricity: (f * (2.0 - f)).sqrt(),
            rectifying_radius,
            alpha,
            beta,
            delta,
        }
    }

    pub fn central_meridian(&self) -> f64 {
        self.central_meridian
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn false_easting(&self) -> f64 {
        self.false_easting
    }

    pub fn false_northing(&self) -> f64 {
        self.false_northing
    }

    /// Degrees to grid metres
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let phi = lat.to_radians();
        let lambda = (lon - self.central_meridian).to_radians();
        let e = self.eccentricity;

        let sin_phi = phi.sin();
        let t = (sin_phi.atanh() - e * (e * sin_phi).atanh()).sinh();
        let xi_prime = t.atan2(lambda.cos());
        let eta_prime = (lambda.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut xi = xi_prime;
        let mut eta = eta_prime;
        for (j, a) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi += a * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta += a * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        let scaled = self.scale * self.rectifying_radius;
        (
            self.false_easting + scaled * eta,
            self.false_northing + scaled * xi,
        )
    }

    /// Grid metres to degrees
    pub fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let scaled = self.scale * self.rectifying_radius;
        let xi = (northing - self.false_northing) / scaled;
        let eta = (easting - self.false_easting) / scaled;

        let mut xi_prime = xi;
        let mut eta_prime = eta;
        for (j, b) in self.beta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi_prime -= b * (k * xi).sin() * (k * eta).cosh();
            eta_prime -= b * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_prime.sin() / eta_prime.cosh()).asin();
        let mut phi = chi;
        for (j, d) in self.delta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            phi += d * (k * chi).sin();
        }

        let lambda = eta_prime.sinh().atan2(xi_prime.cos());
        (
            self.central_meridian + lambda.to_degrees(),
            phi.to_degrees(),
        )
    }
}

#[cfg_attr(feature = "proj", allow(dead_code))]
fn web_mercator_forward(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-WEB_MERCATOR_MAX_LAT, WEB_MERCATOR_MAX_LAT);
    let x = WEB_MERCATOR_RADIUS * lon.to_radians();
    let y = WEB_MERCATOR_RADIUS
        * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0)
            .tan()
            .ln();
    (x, y)
}

#[cfg_attr(feature = "proj", allow(dead_code))]
fn web_mercator_inverse(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WEB_MERCATOR_RADIUS).to_degrees();
    let lat = (2.0 * (y / WEB_MERCATOR_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2)
        .to_degrees();
    (lon, lat)
}

#[cfg_attr(feature = "proj", allow(dead_code))]
fn to_geographic(crs: &Crs, coord: Coord<f64>) -> (f64, f64) {
    match crs.kind() {
        CrsKind::Geographic => (coord.x, coord.y),
        CrsKind::WebMercator => web_mercator_inverse(coord.x, coord.y),
        CrsKind::TransverseMercator(tm) => tm.inverse(coord.x, coord.y),
    }
}

#[cfg_attr(feature = "proj", allow(dead_code))]
fn from_geographic(crs: &Crs, lon: f64, lat: f64) -> (f64, f64) {
    match crs.kind() {
        CrsKind::Geographic => (lon, lat),
        CrsKind::WebMercator => web_mercator_forward(lon, lat),
        CrsKind::TransverseMercator(tm) => tm.forward(lon, lat),
    }
}

/// Transforms coordinates between two reference systems.
pub struct Reprojector {
    from: Crs,
    to: Crs,
    #[cfg(feature = "proj")]
    proj: proj::Proj,
}

impl Reprojector {
    pub fn new(from: Crs, to: Crs) -> Result<Self> {
        #[cfg(feature = "proj")]
        let proj = proj::Proj::new_known_crs(&from.to_string(), &to.to_string(), None)
            .map_err(|e| GeoError::parse(from.to_string(), "create transform", e))?;

        Ok(Self {
            from,
            to,
            #[cfg(feature = "proj")]
            proj,
        })
    }

    pub fn source(&self) -> Crs {
        self.from
    }

    pub fn target(&self) -> Crs {
        self.to
    }

    /// True when no coordinate needs to change
    pub fn is_identity(&self) -> bool {
        if self.from == self.to {
            return true;
        }
        // Datum shifts are only applied by libproj
        cfg!(not(feature = "proj")) && self.from.is_geographic() && self.to.is_geographic()
    }

    #[cfg(not(feature = "proj"))]
    pub fn project_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let (lon, lat) = to_geographic(&self.from, coord);
        let (x, y) = from_geographic(&self.to, lon, lat);
        if !x.is_finite() || !y.is_finite() {
            return Err(GeoError::parse(
                self.from.to_string(),
                "reproject",
                format!("({}, {}) has no image in {}", coord.x, coord.y, self.to),
            ));
        }
        Ok(Coord { x, y })
    }

    #[cfg(feature = "proj")]
    pub fn project_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let (x, y) = self
            .proj
            .convert((coord.x, coord.y))
            .map_err(|e| GeoError::parse(self.from.to_string(), "reproject", e))?;
        Ok(Coord { x, y })
    }

    pub fn project(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>> {
        if self.is_identity() {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|c| self.project_coord(c))
    }
}
