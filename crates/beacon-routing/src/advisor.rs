//! Boundary to the external directions provider.
//!
//! Speaks the OSRM HTTP API: `GET {base}/route/v1/{profile}/{a};{b}` with
//! GeoJSON geometry. The provider does the computing; this side validates
//! endpoints, bounds the wait, and normalizes the outcome into a typed
//! result the caller can message distinctly.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use beacon_types::geo::{GeoPoint, TravelMode};

use crate::position::PositionSource;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    /// An endpoint was absent or not a usable coordinate. Decided locally,
    /// before the provider is contacted.
    #[error("missing route endpoint")]
    MissingEndpoint,
    /// The provider answered but found no route between the endpoints.
    #[error("no route between endpoints")]
    NoRoute,
    /// The provider could not be reached, timed out, or answered garbage.
    #[error("routing provider unavailable")]
    ProviderUnavailable,
}

/// A computed route, decoded from the provider's response.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    /// Path vertices in travel order.
    pub path: Vec<GeoPoint>,
}

#[derive(Clone)]
pub struct RouteAdvisor {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl RouteAdvisor {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Compute a route between two endpoints.
    ///
    /// Both endpoints are validated before the provider is contacted, and
    /// the whole round trip is bounded by the configured timeout, so this
    /// never hangs. Identical inputs may be recomputed freely; nothing is
    /// cached.
    pub async fn compute_route(
        &self,
        origin: Option<GeoPoint>,
        destination: Option<GeoPoint>,
        mode: TravelMode,
    ) -> Result<Route, RouteError> {
        let origin = origin
            .filter(GeoPoint::is_valid)
            .ok_or(RouteError::MissingEndpoint)?;
        let destination = destination
            .filter(GeoPoint::is_valid)
            .ok_or(RouteError::MissingEndpoint)?;

        // OSRM takes coordinates longitude-first.
        let url = format!(
            "{}/route/v1/{}/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url,
            mode.profile(),
            origin.longitude,
            origin.latitude,
            destination.longitude,
            destination.latitude,
        );

        let (status, body) = match tokio::time::timeout(self.timeout, self.fetch(&url)).await {
            Ok(fetched) => fetched?,
            Err(_) => {
                warn!("routing provider timed out after {:?}", self.timeout);
                return Err(RouteError::ProviderUnavailable);
            }
        };

        match body.code.as_str() {
            "Ok" => {
                let route = body.routes.into_iter().next().ok_or(RouteError::NoRoute)?;
                decode_route(route)
            }
            // NoSegment: an endpoint could not be snapped to the road network.
            "NoRoute" | "NoSegment" => Err(RouteError::NoRoute),
            other => {
                warn!("routing provider error code {} (status {})", other, status);
                Err(RouteError::ProviderUnavailable)
            }
        }
    }

    /// Resolve the viewer's position through `source`, then route to
    /// `destination`. A position that cannot be fixed fails fast with
    /// `MissingEndpoint` before the provider is contacted; a default
    /// coordinate is never substituted for a missing fix.
    pub async fn route_from_source<S: PositionSource>(
        &self,
        source: &S,
        destination: Option<GeoPoint>,
        mode: TravelMode,
    ) -> Result<Route, RouteError> {
        let origin = match source.current_position().await {
            Ok(point) => point,
            Err(e) => {
                warn!("position fix unavailable: {}", e);
                return Err(RouteError::MissingEndpoint);
            }
        };
        self.compute_route(Some(origin), destination, mode).await
    }

    async fn fetch(&self, url: &str) -> Result<(reqwest::StatusCode, ProviderResponse), RouteError> {
        let response = self.http.get(url).send().await.map_err(|e| {
            warn!("routing provider request failed: {}", e);
            RouteError::ProviderUnavailable
        })?;

        let status = response.status();
        // OSRM reports routing failures such as NoRoute with a 400 and a
        // code in the body, so decode the body before judging the status.
        let body = response.json::<ProviderResponse>().await.map_err(|e| {
            warn!("undecodable routing provider response (status {}): {}", status, e);
            RouteError::ProviderUnavailable
        })?;

        Ok((status, body))
    }
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    code: String,
    #[serde(default)]
    routes: Vec<ProviderRoute>,
}

#[derive(Debug, Deserialize)]
struct ProviderRoute {
    distance: f64,
    duration: f64,
    geometry: ProviderGeometry,
}

#[derive(Debug, Deserialize)]
struct ProviderGeometry {
    coordinates: Vec<[f64; 2]>,
}

fn decode_route(route: ProviderRoute) -> Result<Route, RouteError> {
    let mut path = Vec::with_capacity(route.geometry.coordinates.len());
    for [lon, lat] in route.geometry.coordinates {
        // GeoJSON is longitude-first.
        let point = GeoPoint::new(lat, lon).ok_or_else(|| {
            warn!("provider returned out-of-range vertex ({}, {})", lat, lon);
            RouteError::ProviderUnavailable
        })?;
        path.push(point);
    }

    Ok(Route {
        distance_meters: route.distance,
        duration_seconds: route.duration,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::PositionError;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    const A: GeoPoint = GeoPoint {
        latitude: 37.0,
        longitude: -122.0,
    };
    const B: GeoPoint = GeoPoint {
        latitude: 37.1,
        longitude: -122.1,
    };

    /// Serve `router` on an ephemeral port, returning its base URL.
    async fn spawn_provider(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn advisor(base_url: String) -> RouteAdvisor {
        RouteAdvisor::new(base_url, Duration::from_millis(500))
    }

    /// An advisor pointed at nothing; any contact attempt fails.
    fn unreachable_advisor() -> RouteAdvisor {
        advisor("http://127.0.0.1:1".into())
    }

    #[tokio::test]
    async fn missing_origin_fails_without_contacting_provider() {
        let result = unreachable_advisor()
            .compute_route(None, Some(B), TravelMode::Driving)
            .await;
        assert_eq!(result, Err(RouteError::MissingEndpoint));
    }

    #[tokio::test]
    async fn missing_destination_fails_without_contacting_provider() {
        let result = unreachable_advisor()
            .compute_route(Some(A), None, TravelMode::Driving)
            .await;
        assert_eq!(result, Err(RouteError::MissingEndpoint));
    }

    #[tokio::test]
    async fn out_of_range_endpoint_is_not_usable() {
        // Deserialized input can carry coordinates `GeoPoint::new` would refuse.
        let bogus = GeoPoint {
            latitude: 120.0,
            longitude: 0.0,
        };
        let result = unreachable_advisor()
            .compute_route(Some(bogus), Some(B), TravelMode::Driving)
            .await;
        assert_eq!(result, Err(RouteError::MissingEndpoint));
    }

    #[tokio::test]
    async fn ok_response_decodes_into_a_route() {
        let router = Router::new().route(
            "/route/v1/driving/{coords}",
            get(|| async {
                Json(json!({
                    "code": "Ok",
                    "routes": [{
                        "distance": 1234.5,
                        "duration": 600.0,
                        "geometry": { "coordinates": [[-122.0, 37.0], [-122.1, 37.1]] }
                    }]
                }))
            }),
        );
        let base = spawn_provider(router).await;

        let route = advisor(base)
            .compute_route(Some(A), Some(B), TravelMode::Driving)
            .await
            .unwrap();

        assert_eq!(route.distance_meters, 1234.5);
        assert_eq!(route.duration_seconds, 600.0);
        assert_eq!(route.path, vec![A, B]);
    }

    #[tokio::test]
    async fn no_route_code_maps_to_no_route() {
        let router = Router::new().route(
            "/route/v1/driving/{coords}",
            get(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "code": "NoRoute", "message": "Impossible route." })),
                )
            }),
        );
        let base = spawn_provider(router).await;

        let result = advisor(base)
            .compute_route(Some(A), Some(B), TravelMode::Driving)
            .await;
        assert_eq!(result, Err(RouteError::NoRoute));
    }

    #[tokio::test]
    async fn server_error_maps_to_provider_unavailable() {
        let router = Router::new().route(
            "/route/v1/driving/{coords}",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = spawn_provider(router).await;

        let result = advisor(base)
            .compute_route(Some(A), Some(B), TravelMode::Driving)
            .await;
        assert_eq!(result, Err(RouteError::ProviderUnavailable));
    }

    #[tokio::test]
    async fn slow_provider_maps_to_provider_unavailable() {
        let router = Router::new().route(
            "/route/v1/driving/{coords}",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "code": "Ok", "routes": [] }))
            }),
        );
        let base = spawn_provider(router).await;

        let result = RouteAdvisor::new(base, Duration::from_millis(100))
            .compute_route(Some(A), Some(B), TravelMode::Driving)
            .await;
        assert_eq!(result, Err(RouteError::ProviderUnavailable));
    }

    #[tokio::test]
    async fn out_of_range_vertex_fails_the_decode() {
        let router = Router::new().route(
            "/route/v1/driving/{coords}",
            get(|| async {
                Json(json!({
                    "code": "Ok",
                    "routes": [{
                        "distance": 1.0,
                        "duration": 1.0,
                        "geometry": { "coordinates": [[-122.0, 95.0]] }
                    }]
                }))
            }),
        );
        let base = spawn_provider(router).await;

        let result = advisor(base)
            .compute_route(Some(A), Some(B), TravelMode::Driving)
            .await;
        assert_eq!(result, Err(RouteError::ProviderUnavailable));
    }

    struct FixedSource(GeoPoint);

    impl PositionSource for FixedSource {
        async fn current_position(&self) -> Result<GeoPoint, PositionError> {
            Ok(self.0)
        }
    }

    struct NoFixSource;

    impl PositionSource for NoFixSource {
        async fn current_position(&self) -> Result<GeoPoint, PositionError> {
            Err(PositionError::Unavailable)
        }
    }

    #[tokio::test]
    async fn failed_position_fix_fails_fast() {
        // The unreachable base URL proves the provider is never contacted.
        let result = unreachable_advisor()
            .route_from_source(&NoFixSource, Some(B), TravelMode::Driving)
            .await;
        assert_eq!(result, Err(RouteError::MissingEndpoint));
    }

    #[tokio::test]
    async fn resolved_position_routes_normally() {
        let router = Router::new().route(
            "/route/v1/driving/{coords}",
            get(|| async {
                Json(json!({
                    "code": "Ok",
                    "routes": [{
                        "distance": 10.0,
                        "duration": 2.0,
                        "geometry": { "coordinates": [[-122.0, 37.0]] }
                    }]
                }))
            }),
        );
        let base = spawn_provider(router).await;

        let route = advisor(base)
            .route_from_source(&FixedSource(A), Some(B), TravelMode::Driving)
            .await
            .unwrap();
        assert_eq!(route.path, vec![A]);
    }
}
