use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// Events sent server-to-client over the alert channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChannelEvent {
    /// Handshake accepted; the connection is open. `user_id` echoes the
    /// identify for trackers and is absent for anonymous viewers.
    Ready { user_id: Option<Uuid> },

    /// An emergency alert. Fanned out to every open connection,
    /// best-effort, never persisted.
    SosAlert {
        name: String,
        email: String,
        mobile_number: String,
        message: String,
        location: Option<GeoPoint>,
    },

    /// A tracked user came online or went offline.
    PresenceUpdate {
        user_id: Uuid,
        name: String,
        online: bool,
    },
}

/// Commands sent client-to-server over the alert channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChannelCommand {
    /// Open the connection. With a user id the peer is a tracked user and
    /// goes online; without one it is an anonymous viewer.
    Identify { user_id: Option<Uuid> },

    /// Report the tracked user's current position. Viewers never send this.
    UpdateLocation {
        latitude: f64,
        longitude: f64,
        recorded_at: DateTime<Utc>,
    },
}
