//! HTTP API server (Axum)

pub mod error;
pub mod providers;
pub mod routes;
pub mod state;

use axum::Router;
use state::AppState;

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::context_routes())
        .merge(routes::session_routes())
        .with_state(state)
}
