//! `PostgreSQL` connector backed by a SQLx pool.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::{Connector, DbError};
use crate::config::DatabaseConfig;

/// Opens a `PgPool` and eagerly establishes its first connection, so an
/// unreachable database fails the attempt instead of queueing queries.
#[derive(Debug, Clone)]
pub struct PgConnector {
    max_connections: u32,
    acquire_timeout: Duration,
}

impl PgConnector {
    #[must_use]
    pub fn new(max_connections: u32, acquire_timeout: Duration) -> Self {
        Self { max_connections, acquire_timeout }
    }

    #[must_use]
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(config.max_connections, config.connect_timeout)
    }
}

#[async_trait::async_trait]
impl Connector<PgPool> for PgConnector {
    async fn connect(&self, target: &str) -> Result<PgPool, DbError> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(target)
            .await
            .map_err(|e| DbError::Connect(e.to_string()))
    }
}
