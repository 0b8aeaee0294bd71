//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! owns the single database connection cache for the process; handlers call
//! `state.db.get()` before touching the database.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::db::ConnectionCache;
use crate::db::postgres::PgConnector;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; the cache is Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<ConnectionCache<PgPool>>,
}

impl AppState {
    #[must_use]
    pub fn new(db: Arc<ConnectionCache<PgPool>>) -> Self {
        Self { db }
    }

    /// Build state for the configured `PostgreSQL` target. Does not connect.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        let connector = Arc::new(PgConnector::from_config(&config.database));
        let db = &config.database;
        let cache = ConnectionCache::<PgPool>::new(db.target.clone(), connector, db.connect_timeout);
        Self::new(Arc::new(cache))
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
