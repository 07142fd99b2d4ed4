use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::{GeoPoint, TravelMode};
use crate::models::{LastLocation, TrackedUser};

// -- Roster --

#[derive(Debug, Serialize)]
pub struct RosterEntry {
    pub id: Uuid,
    pub name: String,
    pub mobile_number: String,
    pub email: Option<String>,
    pub age: u32,
    pub gender: String,
    pub is_online: bool,
    pub last_location: Option<LastLocation>,
}

impl From<TrackedUser> for RosterEntry {
    fn from(user: TrackedUser) -> Self {
        Self {
            id: user.profile.id,
            name: user.profile.name,
            mobile_number: user.profile.mobile_number,
            email: user.profile.email,
            age: user.profile.age,
            gender: user.profile.gender,
            is_online: user.is_online,
            last_location: user.last_location,
        }
    }
}

// -- Alerts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishAlertRequest {
    pub name: String,
    pub email: String,
    pub mobile_number: String,
    pub message: String,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Serialize)]
pub struct PublishAlertResponse {
    /// How many subscribers the alert was offered to. Informational only;
    /// delivery is best-effort and unacknowledged.
    pub offered_to: usize,
}

// -- Routing --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteRequest {
    pub origin: Option<GeoPoint>,
    pub destination: Option<GeoPoint>,
    #[serde(default)]
    pub mode: TravelMode,
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub path: Vec<GeoPoint>,
}
