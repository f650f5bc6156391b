//! Geodesy helpers for the path model.
//!
//! Positions are plain latitude/longitude degrees on a spherical Earth. Local
//! planar offsets (random walk, disk sampling) are converted back to degrees
//! with latitude-dependent meters-per-degree scale factors.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Miles per hour to meters per second.
pub const MPH_TO_MPS: f64 = 0.44704;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        LatLon { lat, lon }
    }

    /// Offset by planar meters (`east`, `north`) using the given scale factors.
    pub fn offset_by(&self, east_m: f64, north_m: f64, scale: ScaleFactors) -> LatLon {
        LatLon {
            lat: (self.lat + north_m / scale.m_per_deg_lat).clamp(-90.0, 90.0),
            lon: wrap_lon(self.lon + east_m / scale.m_per_deg_lon),
        }
    }
}

/// Wrap a longitude into `[-180, 180)`.
pub fn wrap_lon(lon_deg: f64) -> f64 {
    (lon_deg + 180.0).rem_euclid(360.0) - 180.0
}

/// Meters per degree of latitude and longitude at some latitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub m_per_deg_lat: f64,
    pub m_per_deg_lon: f64,
}

impl Default for ScaleFactors {
    fn default() -> Self {
        scale_factors(0.0)
    }
}

/// Meters per degree at `lat_deg` on the WGS84 ellipsoid.
///
/// Latitude uses the truncated series
/// `111132.954 - 559.822 cos 2φ - 1.175 cos 4φ`; longitude uses the radius of
/// the parallel, `a cos φ / sqrt(1 - e² sin² φ)`.
pub fn scale_factors(lat_deg: f64) -> ScaleFactors {
    const WGS84_A: f64 = 6_378_137.0;
    const WGS84_E: f64 = 0.081_819_22;

    let lat = lat_deg.to_radians();
    let b = WGS84_E * lat.sin();
    let radius = WGS84_A * lat.cos() / (1.0 - b * b).sqrt();

    ScaleFactors {
        m_per_deg_lat: 111_132.954 - 559.822 * (2.0 * lat).cos() - 1.175 * (4.0 * lat).cos(),
        m_per_deg_lon: 1.0_f64.to_radians() * radius,
    }
}

/// Project `distance_m` from `origin` along the initial bearing `heading_deg`.
pub fn forward_haversine(origin: LatLon, heading_deg: f64, distance_m: f64) -> LatLon {
    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lon.to_radians();
    let bearing = heading_deg.to_radians();
    let angular = distance_m / EARTH_RADIUS_M;

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    LatLon {
        lat: lat2.to_degrees(),
        lon: wrap_lon(lon2.to_degrees()),
    }
}

/// Great-circle distance between two points in meters.
pub fn haversine_distance(a: LatLon, b: LatLon) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Move from `origin` toward a target `target_m` away along `heading_deg`.
///
/// Distance covered is `speed_mps * elapsed_ms / 1000`, clamped to the
/// target. Returns the new position and whether the target was reached.
pub fn advance_toward(
    origin: LatLon,
    heading_deg: f64,
    speed_mps: f64,
    target_m: f64,
    elapsed_ms: u64,
) -> (LatLon, bool) {
    let travelled = speed_mps * elapsed_ms as f64 / 1000.0;
    let reached = travelled >= target_m;
    let distance = if reached { target_m } else { travelled };
    (forward_haversine(origin, heading_deg, distance), reached)
}

/// Uniformly sample a point inside the disk of `radius_m` around `center`.
pub fn random_point_in_disk<R: Rng + ?Sized>(rng: &mut R, center: LatLon, radius_m: f64) -> LatLon {
    let u: f64 = rng.gen();
    let v: f64 = rng.gen();
    let r = radius_m * u.sqrt();
    let theta = 2.0 * std::f64::consts::PI * v;
    center.offset_by(r * theta.cos(), r * theta.sin(), scale_factors(center.lat))
}
