//! Spherical geometry and the nearest-tile index built on the store's geo set.

mod index;

pub use index::{NearestTile, SpatialIndex, TILE_GEO_KEY};

use serde::{Deserialize, Serialize};

/// Mean Earth radius used for geo distances, matching what geo stores assume.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometres covered by one degree of latitude.
pub const KM_PER_DEGREE: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    pub lat: f64,
    pub lon: f64,
}

impl GeoCoord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Position of a direction vector from the sphere's centre. The pole axis
    /// is `y`; longitude is measured from `z` towards `x`, rotated a quarter
    /// turn so the tiling's seam sits away from the prime meridian.
    pub fn from_direction(point: [f64; 3]) -> Self {
        let [x, y, z] = point;
        let norm = (x * x + y * y + z * z).sqrt();
        if norm == 0.0 {
            return Self::new(0.0, 0.0);
        }
        let phi = (y / norm).clamp(-1.0, 1.0).acos();
        let lat = 90.0 - phi.to_degrees();
        let theta = x.atan2(z).to_degrees() + 90.0;
        Self::new(lat, wrap_longitude(theta))
    }

    /// Great-circle initial bearing from `self` to `other`, in `[0, 360)`.
    pub fn bearing_to(&self, other: &GeoCoord) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlon = (other.lon - self.lon).to_radians();
        let y = dlon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        let bearing = y.atan2(x).to_degrees();
        (bearing + 360.0) % 360.0
    }

    /// Haversine distance in kilometres.
    pub fn distance_km(&self, other: &GeoCoord) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }
}

/// Wraps a longitude into `[-180, 180)`.
pub fn wrap_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}
