//! Runtime configuration parsed from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! The server and the session client are configured independently. Both read
//! plain environment variables (a `.env` file is loaded by `main` first) and
//! fall back to defaults for anything unset or unparsable. Only the database
//! connection target has no default: its absence is tolerated at startup and
//! reported when something first needs the database.

use std::time::Duration;

/// Environment variable naming the database connection target.
pub const CONNECTION_TARGET_VAR: &str = "MONGODB_URI";

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_API_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_API_CONNECT_TIMEOUT_SECS: u64 = 5;

// =============================================================================
// SERVER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Connection target. `None` when `MONGODB_URI` is unset or blank.
    pub target: Option<String>,
    pub max_connections: u32,
    /// Upper bound on a single connection attempt.
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub database: DatabaseConfig,
}

impl ServerConfig {
    /// Build server config from the process environment.
    ///
    /// - `MONGODB_URI`: connection target (optional here, required at first use)
    /// - `PORT`: default 3000
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `DB_CONNECT_TIMEOUT_SECS`: default 10
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build server config from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let target = non_blank(lookup(CONNECTION_TARGET_VAR));
        let database = DatabaseConfig {
            target,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            connect_timeout: Duration::from_secs(parse_or(
                &lookup,
                "DB_CONNECT_TIMEOUT_SECS",
                DEFAULT_DB_CONNECT_TIMEOUT_SECS,
            )),
        };
        Self { port: parse_or(&lookup, "PORT", DEFAULT_PORT), database }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL without a trailing slash.
    pub base_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Build session-client config from the process environment.
    ///
    /// - `API_BASE_URL`: default `http://localhost:3000`
    /// - `API_REQUEST_TIMEOUT_SECS`: default 10
    /// - `API_CONNECT_TIMEOUT_SECS`: default 5
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = non_blank(lookup("API_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        Self {
            base_url,
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "API_REQUEST_TIMEOUT_SECS",
                DEFAULT_API_REQUEST_TIMEOUT_SECS,
            )),
            connect_timeout: Duration::from_secs(parse_or(
                &lookup,
                "API_CONNECT_TIMEOUT_SECS",
                DEFAULT_API_CONNECT_TIMEOUT_SECS,
            )),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
