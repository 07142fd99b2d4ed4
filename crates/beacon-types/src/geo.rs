use serde::{Deserialize, Serialize};

/// A WGS84 coordinate. Latitude in [-90, 90], longitude in [-180, 180].
///
/// "No position" is always `Option<GeoPoint>::None`; there is no sentinel
/// coordinate, and (0, 0) is an ordinary valid point in the Gulf of Guinea.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Returns `None` for out-of-range or non-finite input. Never clamps.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let point = Self {
            latitude,
            longitude,
        };
        point.is_valid().then_some(point)
    }

    /// Deserialized points bypass [`GeoPoint::new`], so boundary code must
    /// re-check before trusting them.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Travel profile for route computation. The shipped client only asks for
/// driving; the contract carries the full enumerated set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
    Cycling,
}

impl TravelMode {
    /// Profile segment of the provider's request path.
    pub fn profile(&self) -> &'static str {
        match self {
            Self::Driving => "driving",
            Self::Walking => "walking",
            Self::Cycling => "cycling",
        }
    }
}
