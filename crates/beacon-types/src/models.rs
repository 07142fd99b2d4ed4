use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// Directory profile of a tracked user. Created out-of-band by the
/// registration flow; this service only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub mobile_number: String,
    pub email: Option<String>,
    pub age: u32,
    pub gender: String,
}

/// Latest accepted position report. Replaced wholesale on each update;
/// `recorded_at` never moves backwards for a given user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LastLocation {
    #[serde(flatten)]
    pub point: GeoPoint,
    pub recorded_at: DateTime<Utc>,
}

/// A directory user plus their live state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedUser {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub is_online: bool,
    pub last_location: Option<LastLocation>,
}
