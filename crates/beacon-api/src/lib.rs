pub mod alerts;
pub mod roster;
pub mod routes;

use std::sync::Arc;

use beacon_db::Database;
use beacon_gateway::dispatcher::AlertDispatcher;
use beacon_roster::RosterStore;
use beacon_routing::advisor::RouteAdvisor;

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub store: RosterStore,
    pub dispatcher: AlertDispatcher,
    pub advisor: RouteAdvisor,
}
