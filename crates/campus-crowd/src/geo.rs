//! Great-circle distance and the distance kernel used for area estimates.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Haversine distance to `other` in meters.
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let p1 = self.lat.to_radians();
        let p2 = other.lat.to_radians();
        let dphi = (other.lat - self.lat).to_radians();
        let dl = (other.lng - self.lng).to_radians();
        let a = (dphi / 2.0).sin().powi(2) + p1.cos() * p2.cos() * (dl / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

/// Gaussian weight `exp(-d² / 2σ²)` for a sample `distance_m` away.
pub fn gaussian_weight(distance_m: f64, sigma_m: f64) -> f64 {
    (-(distance_m * distance_m) / (2.0 * sigma_m * sigma_m)).exp()
}
