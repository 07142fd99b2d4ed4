use std::collections::HashMap;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::error;
use uuid::Uuid;

use beacon_types::api::RosterEntry;
use beacon_types::models::TrackedUser;

use crate::AppState;

/// GET /users — the full roster: every directory user with live state
/// overlaid. No filtering or pagination at this scope.
///
/// A directory read failure or a corrupt row fails the whole request with
/// 503; the roster is never returned partially.
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.get_all_users())
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        })?
        .map_err(|e| {
            error!("directory read failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        })?;

    let live: HashMap<Uuid, TrackedUser> = state
        .store
        .snapshot()
        .await
        .into_iter()
        .map(|user| (user.profile.id, user))
        .collect();

    let mut roster = Vec::with_capacity(rows.len());
    for row in rows {
        let mut user = row.into_domain().map_err(|e| {
            error!("corrupt directory row: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        })?;
        if let Some(live_user) = live.get(&user.profile.id) {
            user.is_online = live_user.is_online;
            // The store may be ahead of the directory write-through.
            if live_user.last_location.is_some() {
                user.last_location = live_user.last_location;
            }
        }
        roster.push(RosterEntry::from(user));
    }

    Ok(Json(roster))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use beacon_db::Database;
    use beacon_gateway::dispatcher::{AlertDispatcher, DEFAULT_CHANNEL_CAPACITY};
    use beacon_roster::RosterStore;
    use beacon_routing::advisor::RouteAdvisor;
    use beacon_types::geo::GeoPoint;
    use chrono::Utc;

    async fn state_with_directory() -> (AppState, Uuid, Uuid) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let online_id = Uuid::new_v4();
        let offline_id = Uuid::new_v4();
        db.create_user(
            &online_id.to_string(),
            "Asha",
            "+15550100",
            Some("asha@example.com"),
            29,
            "female",
        )
        .unwrap();
        db.create_user(&offline_id.to_string(), "Noor", "+15550101", None, 34, "female")
            .unwrap();

        let store = RosterStore::new();
        let users = db
            .get_all_users()
            .unwrap()
            .into_iter()
            .map(|row| row.into_domain().unwrap())
            .collect();
        store.load_directory(users).await;

        let state = AppState {
            db,
            store,
            dispatcher: AlertDispatcher::new(DEFAULT_CHANNEL_CAPACITY),
            advisor: RouteAdvisor::new("http://127.0.0.1:1", Duration::from_millis(200)),
        };
        (state, online_id, offline_id)
    }

    async fn fetch_roster(state: AppState) -> serde_json::Value {
        let response = list_users(State(state)).await.unwrap().into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn roster_overlays_live_state_on_directory_rows() {
        let (state, online_id, offline_id) = state_with_directory().await;

        state
            .store
            .upsert_location(online_id, GeoPoint::new(37.0, -122.0).unwrap(), Utc::now())
            .await
            .unwrap();

        let roster = fetch_roster(state).await;
        let entries = roster.as_array().unwrap();
        assert_eq!(entries.len(), 2);

        let by_id = |id: Uuid| {
            entries
                .iter()
                .find(|e| e["id"] == id.to_string())
                .unwrap()
                .clone()
        };

        let online = by_id(online_id);
        assert_eq!(online["is_online"], true);
        assert_eq!(online["last_location"]["latitude"], 37.0);

        let offline = by_id(offline_id);
        assert_eq!(offline["is_online"], false);
        assert!(offline["last_location"].is_null());
    }

    #[tokio::test]
    async fn corrupt_directory_row_fails_the_whole_request() {
        let (state, _, _) = state_with_directory().await;
        state
            .db
            .create_user("not-a-uuid", "Ghost", "+15550102", None, 40, "male")
            .unwrap();

        let result = list_users(State(state)).await;
        assert!(matches!(result, Err(StatusCode::SERVICE_UNAVAILABLE)));
    }
}
