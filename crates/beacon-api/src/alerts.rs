use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use beacon_types::api::{PublishAlertRequest, PublishAlertResponse};
use beacon_types::events::ChannelEvent;

use crate::AppState;

/// POST /alerts — publish an emergency alert to every open channel
/// connection. The 202 acknowledges acceptance, not delivery: fan-out is
/// best-effort and the event is never persisted.
pub async fn publish_alert(
    State(state): State<AppState>,
    Json(req): Json<PublishAlertRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.message.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if let Some(location) = &req.location {
        if !location.is_valid() {
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    let name = req.name.clone();
    let offered_to = state.dispatcher.publish(ChannelEvent::SosAlert {
        name: req.name,
        email: req.email,
        mobile_number: req.mobile_number,
        message: req.message,
        location: req.location,
    });

    info!("sos alert from {} offered to {} subscribers", name, offered_to);

    Ok((
        StatusCode::ACCEPTED,
        Json(PublishAlertResponse { offered_to }),
    ))
}
