//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The server exposes only operational endpoints: a liveness probe that never
//! touches the database and a database check that drives the connection
//! cache. Auth endpoints consumed by the session client live elsewhere.

pub mod health;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/test-db", get(health::test_db))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
