//! In-memory live state for tracked users.
//!
//! The roster is the only mutable shared resource in the service. All
//! writes go through [`RosterStore::upsert_location`] and
//! [`RosterStore::set_online`], which keeps the staleness invariant in one
//! place instead of trusting callers. Reads run in parallel; writes are
//! serialized by the lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use beacon_types::geo::GeoPoint;
use beacon_types::models::{LastLocation, TrackedUser};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The report is older than what is already stored; the stored value wins.
    #[error("stale location report")]
    StaleTimestamp,
    /// The user is not in the directory.
    #[error("unknown user {0}")]
    UnknownUser(Uuid),
}

#[derive(Clone)]
pub struct RosterStore {
    inner: Arc<RwLock<HashMap<Uuid, TrackedUser>>>,
}

impl RosterStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Seed the store from the directory, replacing any existing entries.
    /// Everyone starts offline, with whatever last location the directory
    /// retained.
    pub async fn load_directory(&self, users: Vec<TrackedUser>) {
        let mut map = self.inner.write().await;
        map.clear();
        for user in users {
            map.insert(user.profile.id, user);
        }
    }

    /// Replace a user's last known location and mark them online.
    ///
    /// A report strictly older than the stored one is rejected and the
    /// stored value is untouched. An equal timestamp is accepted and the
    /// location replaced wholesale, never merged.
    pub async fn upsert_location(
        &self,
        user_id: Uuid,
        point: GeoPoint,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut map = self.inner.write().await;
        let user = map
            .get_mut(&user_id)
            .ok_or(StoreError::UnknownUser(user_id))?;

        if let Some(existing) = &user.last_location {
            if recorded_at < existing.recorded_at {
                return Err(StoreError::StaleTimestamp);
            }
        }

        user.last_location = Some(LastLocation { point, recorded_at });
        user.is_online = true;
        Ok(())
    }

    /// Flip the online flag, independent of location: online with no
    /// location yet, or offline while retaining the last one, are both
    /// legal. Returns whether the flag actually changed so callers can
    /// suppress duplicate presence events.
    pub async fn set_online(&self, user_id: Uuid, online: bool) -> Result<bool, StoreError> {
        let mut map = self.inner.write().await;
        let user = map
            .get_mut(&user_id)
            .ok_or(StoreError::UnknownUser(user_id))?;
        let changed = user.is_online != online;
        user.is_online = online;
        Ok(changed)
    }

    pub async fn get(&self, user_id: Uuid) -> Option<TrackedUser> {
        self.inner.read().await.get(&user_id).cloned()
    }

    /// Point-in-time copy of the roster. The read lock is held only for
    /// the duration of the clone; writers are never blocked longer.
    pub async fn snapshot(&self) -> Vec<TrackedUser> {
        self.inner.read().await.values().cloned().collect()
    }
}

impl Default for RosterStore {
    fn default() -> Self {
        Self::new()
    }
}
