//! Database health route.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Body returned by `GET /test-db`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthResponse {
    fn connected() -> Self {
        Self { success: true, message: Some("database connected".into()), error: None }
    }

    fn failed(error: String) -> Self {
        Self { success: false, message: None, error: Some(error) }
    }
}

/// `GET /test-db`: obtain the shared connection and report the outcome.
pub async fn test_db(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.db.get().await {
        Ok(_) => (StatusCode::OK, Json(HealthResponse::connected())),
        Err(e) => {
            tracing::error!(error = %e, "database health check failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(HealthResponse::failed(e.to_string())))
        }
    }
}

#[cfg(test)]
#[path = "health_test.rs"]
mod tests;
