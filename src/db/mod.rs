//! Lazily established, process-wide database connection.
//!
//! SYSTEM CONTEXT
//! ==============
//! Startup builds one `ConnectionCache` and hands it to request handlers via
//! `AppState`. Nothing connects at boot: the first handler that needs the
//! database triggers the attempt, and every later caller reuses the result.
//!
//! DESIGN
//! ======
//! The cache moves through `Uninitialized -> Pending -> Ready`. A pending
//! attempt is a `Shared` future, so callers that arrive while it is in flight
//! await the same attempt instead of opening their own. A failed attempt puts
//! the cache back to `Uninitialized` and every waiter sees the same error.
//!
//! Each attempt carries a generation number. A waiter only writes the outcome
//! back if the slot still holds its generation, so a slow waiter can never
//! clobber a newer attempt.

pub mod postgres;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced while obtaining the shared connection.
///
/// `Clone` because one failed attempt is reported to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DbError {
    /// No connection target was configured.
    #[error("MONGODB_URI not defined in environment variables")]
    NotConfigured,

    /// The driver could not reach or authenticate against the database.
    #[error("database connection failed: {0}")]
    Connect(String),

    /// The attempt did not finish within the configured bound.
    #[error("database connection timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

// =============================================================================
// CONNECTOR
// =============================================================================

/// Opens a fresh connection handle for a target string.
#[async_trait::async_trait]
pub trait Connector<H>: Send + Sync {
    async fn connect(&self, target: &str) -> Result<H, DbError>;
}

// =============================================================================
// CACHE
// =============================================================================

type Attempt<H> = Shared<BoxFuture<'static, Result<H, DbError>>>;

enum Slot<H> {
    Empty,
    Pending { generation: u64, attempt: Attempt<H> },
    Ready(H),
}

/// Observable lifecycle of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Uninitialized,
    Pending,
    Ready,
}

pub struct ConnectionCache<H> {
    target: Option<String>,
    connector: Arc<dyn Connector<H>>,
    connect_timeout: Duration,
    slot: Mutex<Slot<H>>,
    attempts: AtomicU64,
}

impl<H> ConnectionCache<H>
where
    H: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(target: Option<String>, connector: Arc<dyn Connector<H>>, connect_timeout: Duration) -> Self {
        Self { target, connector, connect_timeout, slot: Mutex::new(Slot::Empty), attempts: AtomicU64::new(0) }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.target.is_some()
    }

    #[must_use]
    pub fn status(&self) -> CacheStatus {
        match &*self.lock() {
            Slot::Empty => CacheStatus::Uninitialized,
            Slot::Pending { .. } => CacheStatus::Pending,
            Slot::Ready(_) => CacheStatus::Ready,
        }
    }

    /// Number of underlying connection attempts issued so far.
    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Return the shared connection, establishing it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotConfigured`] without attempting anything when no
    /// target is set, otherwise the error of the attempt this call joined.
    pub async fn get(&self) -> Result<H, DbError> {
        let Some(target) = self.target.as_deref() else {
            return Err(DbError::NotConfigured);
        };

        let (generation, attempt) = {
            let mut slot = self.lock();
            let (generation, attempt, fresh) = match &*slot {
                Slot::Ready(handle) => return Ok(handle.clone()),
                Slot::Pending { generation, attempt } => (*generation, attempt.clone(), false),
                Slot::Empty => {
                    let generation = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    (generation, self.start_attempt(target.to_owned(), generation), true)
                }
            };
            if fresh {
                *slot = Slot::Pending { generation, attempt: attempt.clone() };
            }
            (generation, attempt)
        };

        let result = attempt.await;

        let mut slot = self.lock();
        if matches!(&*slot, Slot::Pending { generation: current, .. } if *current == generation) {
            *slot = match &result {
                Ok(handle) => Slot::Ready(handle.clone()),
                Err(_) => Slot::Empty,
            };
        }
        result
    }

    /// Drop a ready connection so the next [`get`](Self::get) reconnects.
    ///
    /// Returns `false` (and changes nothing) unless the cache was `Ready`.
    pub fn invalidate(&self) -> bool {
        let mut slot = self.lock();
        if matches!(&*slot, Slot::Ready(_)) {
            *slot = Slot::Empty;
            tracing::info!("database connection invalidated");
            true
        } else {
            false
        }
    }

    fn start_attempt(&self, target: String, generation: u64) -> Attempt<H> {
        let connector = Arc::clone(&self.connector);
        let limit = self.connect_timeout;
        async move {
            match tokio::time::timeout(limit, connector.connect(&target)).await {
                Ok(Ok(handle)) => {
                    tracing::info!(attempt = generation, "database connected");
                    Ok(handle)
                }
                Ok(Err(e)) => {
                    tracing::error!(attempt = generation, error = %e, "database connection failed");
                    Err(e)
                }
                Err(_) => {
                    let e = DbError::Timeout(limit);
                    tracing::error!(attempt = generation, error = %e, "database connection failed");
                    Err(e)
                }
            }
        }
        .boxed()
        .shared()
    }

    fn lock(&self) -> MutexGuard<'_, Slot<H>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
