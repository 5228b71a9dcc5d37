//! Core data types for panorama requests and locations.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Heading in degrees. Conventionally in `[0, 360)`, not validated.
pub type Angle = i32;

/// A decoded panorama image, shared between the cache and its readers.
pub type Panorama = Arc<DynamicImage>;

/// A latitude/longitude pair in degrees.
///
/// Equality and hashing use the exact bit pattern of both coordinates, so two
/// locations only collide as cache keys when they are byte-identical.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle (haversine) distance to `other`, in metres.
    pub fn distance(&self, other: &Location) -> f64 {
        let lat_delta = (other.latitude - self.latitude).to_radians();
        let lng_delta = (other.longitude - self.longitude).to_radians();

        let a = (lat_delta / 2.0).sin().powi(2)
            + self.latitude.to_radians().cos()
                * other.latitude.to_radians().cos()
                * (lng_delta / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c * 1000.0
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.latitude.to_bits() == other.latitude.to_bits()
            && self.longitude.to_bits() == other.longitude.to_bits()
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.latitude.to_bits().hash(state);
        self.longitude.to_bits().hash(state);
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// A location plus a heading: the unit of fetching and cache lookup.
///
/// Raw requests carry an approximate location; once resolved, the location is
/// the canonical panorama position and doubles as the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRequest {
    pub location: Location,
    pub angle: Angle,
}

impl ImageRequest {
    pub fn new(location: Location, angle: Angle) -> Self {
        Self { location, angle }
    }

    /// Key under which this request is persisted in a blob store.
    pub fn store_key(&self) -> String {
        format!("{},{}", self.location, self.angle)
    }
}

/// Errors that can occur while resolving, fetching or storing panoramas.
#[derive(thiserror::Error, Debug)]
pub enum StreetError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned status {status}")]
    BadStatus { endpoint: &'static str, status: u16 },

    #[error("Malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error("No panorama near {location}: status {status}")]
    PanoramaUnavailable { location: Location, status: String },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Convenience result type.
pub type StreetResult<T> = Result<T, StreetError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_distance_zero_for_same_point() {
        let a = Location::new(10.0, 10.0);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        let a = Location::new(0.0, 0.0);
        let b = Location::new(1.0, 0.0);
        // One degree of arc on a 6371 km sphere.
        let expected = EARTH_RADIUS_KM * 1000.0 * std::f64::consts::PI / 180.0;
        assert!((a.distance(&b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = Location::new(52.5200, 13.4050);
        let b = Location::new(48.8566, 2.3522);
        let d1 = a.distance(&b);
        let d2 = b.distance(&a);
        assert!((d1 - d2).abs() < 1e-6);
        // Berlin to Paris, roughly 878 km.
        assert!(d1 > 870_000.0 && d1 < 885_000.0);
    }

    #[test]
    fn test_location_equality_is_exact() {
        let a = Location::new(10.001, 10.001);
        let b = Location::new(10.001, 10.001);
        let c = Location::new(10.001, 10.001 + 1e-12);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Location> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_store_key_format() {
        let req = ImageRequest::new(Location::new(10.001, -3.5), 90);
        assert_eq!(req.store_key(), "10.001000,-3.500000,90");
    }

    #[test]
    fn test_location_json_field_names() {
        let loc: Location = serde_json::from_str(r#"{"lat": 1.5, "lng": 2.5}"#).unwrap();
        assert_eq!(loc, Location::new(1.5, 2.5));
    }
}
