use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use beacon_routing::advisor::RouteError;
use beacon_types::api::{RouteRequest, RouteResponse};

use crate::AppState;

/// POST /route — directions between two coordinates via the external
/// provider. Each failure keeps its own status and reason so the client
/// can message it distinctly.
pub async fn compute_route(State(state): State<AppState>, Json(req): Json<RouteRequest>) -> Response {
    match state
        .advisor
        .compute_route(req.origin, req.destination, req.mode)
        .await
    {
        Ok(route) => Json(RouteResponse {
            distance_meters: route.distance_meters,
            duration_seconds: route.duration_seconds,
            path: route.path,
        })
        .into_response(),
        Err(RouteError::MissingEndpoint) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "missing_endpoint" })),
        )
            .into_response(),
        Err(RouteError::NoRoute) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "no_route" }))).into_response()
        }
        Err(RouteError::ProviderUnavailable) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": "provider_unavailable" })),
        )
            .into_response(),
    }
}
