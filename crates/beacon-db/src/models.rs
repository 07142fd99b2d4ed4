//! Database row types — these map directly to SQLite rows.
//! Distinct from the beacon-types domain models to keep the DB layer flat.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use beacon_types::geo::GeoPoint;
use beacon_types::models::{LastLocation, TrackedUser, UserProfile};

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub mobile_number: String,
    pub email: Option<String>,
    pub age: i64,
    pub gender: String,
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub last_seen_at: Option<String>,
    pub created_at: String,
}

impl UserRow {
    /// Convert to the domain model. A corrupt row is an error, never a
    /// defaulted value: the roster must not contain made-up data.
    /// Live state starts offline; the store overlays the rest.
    pub fn into_domain(self) -> Result<TrackedUser> {
        let id: Uuid = self
            .id
            .parse()
            .with_context(|| format!("corrupt user id '{}'", self.id))?;

        let age = u32::try_from(self.age)
            .with_context(|| format!("corrupt age {} for user {}", self.age, id))?;

        let last_location = match (self.last_latitude, self.last_longitude, self.last_seen_at) {
            (Some(lat), Some(lng), Some(ts)) => {
                let point = GeoPoint::new(lat, lng).with_context(|| {
                    format!("corrupt stored coordinate ({lat}, {lng}) for user {id}")
                })?;
                let recorded_at = DateTime::parse_from_rfc3339(&ts)
                    .with_context(|| format!("corrupt last_seen_at '{ts}' for user {id}"))?
                    .with_timezone(&Utc);
                Some(LastLocation { point, recorded_at })
            }
            (None, None, None) => None,
            _ => anyhow::bail!("partial last-location columns for user {id}"),
        };

        Ok(TrackedUser {
            profile: UserProfile {
                id,
                name: self.name,
                mobile_number: self.mobile_number,
                email: self.email,
                age,
                gender: self.gender,
            },
            is_online: false,
            last_location,
        })
    }
}
