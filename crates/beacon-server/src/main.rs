use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use beacon_api::{AppState, alerts, roster, routes};
use beacon_gateway::connection::{self, ChannelContext, TrackerSessions};
use beacon_gateway::dispatcher::{AlertDispatcher, DEFAULT_CHANNEL_CAPACITY};
use beacon_roster::RosterStore;
use beacon_routing::advisor::{self, RouteAdvisor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let host = std::env::var("BEACON_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("BEACON_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let db_path = std::env::var("BEACON_DB_PATH").unwrap_or_else(|_| "beacon.db".into());
    let routing_url = std::env::var("BEACON_ROUTING_URL")
        .unwrap_or_else(|_| "https://router.project-osrm.org".into());
    let routing_timeout_secs: u64 = std::env::var("BEACON_ROUTING_TIMEOUT_SECS")
        .unwrap_or_else(|_| advisor::DEFAULT_TIMEOUT.as_secs().to_string())
        .parse()?;
    let channel_capacity: usize = std::env::var("BEACON_CHANNEL_CAPACITY")
        .unwrap_or_else(|_| DEFAULT_CHANNEL_CAPACITY.to_string())
        .parse()?;

    // Open the user directory and seed the in-memory roster from it
    let db = Arc::new(beacon_db::Database::open(&PathBuf::from(&db_path))?);

    let store = RosterStore::new();
    let rows = {
        let db = db.clone();
        tokio::task::spawn_blocking(move || db.get_all_users()).await??
    };
    let mut users = Vec::with_capacity(rows.len());
    for row in rows {
        users.push(row.into_domain()?);
    }
    info!("Loaded {} tracked users from the directory", users.len());
    store.load_directory(users).await;

    // Shared state
    let dispatcher = AlertDispatcher::new(channel_capacity);
    let advisor = RouteAdvisor::new(routing_url, Duration::from_secs(routing_timeout_secs));

    let app_state = AppState {
        db: db.clone(),
        store: store.clone(),
        dispatcher: dispatcher.clone(),
        advisor,
    };
    let channel = ChannelContext {
        dispatcher,
        store,
        db,
        sessions: TrackerSessions::new(),
    };

    // Routes
    let rest_routes = Router::new()
        .route("/users", get(roster::list_users))
        .route("/alerts", post(alerts::publish_alert))
        .route("/route", post(routes::compute_route))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/channel", get(ws_upgrade))
        .with_state(channel);

    let app = Router::new()
        .merge(rest_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Beacon server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(
    State(channel): State<ChannelContext>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, channel))
}
