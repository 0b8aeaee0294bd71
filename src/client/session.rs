//! Client-side session manager.
//!
//! ARCHITECTURE
//! ============
//! `SessionManager` is the single owner of identity state on the client. It is
//! cheap to clone and every clone shares the same state, which is published
//! through a `watch` channel so views can react to transitions.
//!
//! Locally cached credentials give an immediate, optimistic answer; the
//! backend's `/auth/me` has the final word. Any doubt during verification
//! (network error, rejection, unreadable cache) ends in a signed-out state
//! with all cached credentials removed.
//!
//! TRADE-OFFS
//! ==========
//! Cleanup that must happen on every path (clearing `loading`, wiping
//! credentials on logout) lives in drop guards so it also runs when the
//! calling future is cancelled mid-request.

use std::sync::Arc;

use tokio::sync::watch;

use super::api::{ApiError, AuthApi};
use super::store::{ACCESS_TOKEN_KEY, CredentialStore, REFRESH_TOKEN_KEY, StoreError, USER_KEY, clear_credentials};
use super::types::{AuthStatus, LoginResponse, Session, User};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Backend rejection or transport failure, passed through untouched.
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs the wrapped closure when dropped.
struct OnDrop<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> OnDrop<F> {
    fn new(f: F) -> Self {
        Self(Some(f))
    }
}

impl<F: FnOnce()> Drop for OnDrop<F> {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

struct Inner {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn CredentialStore>,
    state: watch::Sender<Session>,
}

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Create a manager in the `Unknown`, loading state. Call
    /// [`check_status`](Self::check_status) to resolve it.
    #[must_use]
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<dyn CredentialStore>) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self { inner: Arc::new(Inner { api, store, state }) }
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.inner.state.borrow().current_user().cloned()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    /// Receive every subsequent session change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Reconcile cached credentials with the backend.
    ///
    /// Without a cached access token this returns immediately, signed out,
    /// without any network call. Otherwise a cached user (if any) is applied
    /// optimistically before `/auth/me` is asked. Failures are logged and
    /// leave the session signed out with credentials cleared. `loading` is
    /// false when this returns, whatever happened.
    pub async fn check_status(&self) -> Session {
        self.inner.state.send_if_modified(|s| !std::mem::replace(&mut s.loading, true));
        {
            let _loading = OnDrop::new(|| self.inner.state.send_modify(|s| s.loading = false));
            if let Err(e) = self.verify().await {
                tracing::warn!(error = %e, "session verification failed");
                clear_credentials(&*self.inner.store);
                self.set_status(AuthStatus::Unauthenticated);
            }
        }
        self.session()
    }

    async fn verify(&self) -> Result<(), SessionError> {
        let store = &self.inner.store;
        let Some(token) = store.get(ACCESS_TOKEN_KEY)? else {
            self.set_status(AuthStatus::Unauthenticated);
            return Ok(());
        };

        if let Some(raw) = store.get(USER_KEY)? {
            let cached: User = serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))?;
            self.set_status(AuthStatus::Optimistic(cached));
        }

        let user = self.inner.api.me(&token).await?;
        self.persist_user(&user)?;
        self.set_status(AuthStatus::Authenticated(user));
        Ok(())
    }

    /// Sign in and persist the returned credentials.
    ///
    /// # Errors
    ///
    /// Backend failures come back as [`SessionError::Api`] unchanged; nothing
    /// is persisted and the session is left as it was. A store failure comes
    /// back as [`SessionError::Store`] after any partially written
    /// credentials have been removed.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let LoginResponse { user, access_token, refresh_token } = self.inner.api.login(email, password).await?;

        if let Err(e) = self.persist_login(&user, access_token.as_deref(), refresh_token.as_deref()) {
            clear_credentials(&*self.inner.store);
            return Err(e.into());
        }

        self.set_status(AuthStatus::Authenticated(user.clone()));
        tracing::info!(user_id = %user.id, "signed in");
        Ok(user)
    }

    /// Sign out locally, telling the backend on a best-effort basis.
    ///
    /// Credentials are cleared and the session signed out even if the
    /// backend call fails or this future is dropped mid-request.
    pub async fn logout(&self) {
        let _cleanup = OnDrop::new(|| {
            clear_credentials(&*self.inner.store);
            self.set_status(AuthStatus::Unauthenticated);
        });

        let token = self.inner.store.get(ACCESS_TOKEN_KEY).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read access token for logout");
            None
        });
        if let Err(e) = self.inner.api.logout(token.as_deref()).await {
            tracing::error!(error = %e, "logout request failed");
        }
    }

    /// Create an account. Does not sign in; call [`login`](Self::login) next.
    ///
    /// # Errors
    ///
    /// Backend failures come back as [`SessionError::Api`] unchanged.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<(), SessionError> {
        self.inner.api.register(name, email, password).await?;
        Ok(())
    }

    fn persist_login(&self, user: &User, access: Option<&str>, refresh: Option<&str>) -> Result<(), StoreError> {
        let store = &self.inner.store;
        if let Some(token) = access.filter(|t| !t.is_empty()) {
            store.set(ACCESS_TOKEN_KEY, token)?;
        }
        if let Some(token) = refresh.filter(|t| !t.is_empty()) {
            store.set(REFRESH_TOKEN_KEY, token)?;
        }
        self.persist_user(user)
    }

    fn persist_user(&self, user: &User) -> Result<(), StoreError> {
        let raw = serde_json::to_string(user).map_err(|e| StoreError::Serialize(e.to_string()))?;
        self.inner.store.set(USER_KEY, &raw)
    }

    fn set_status(&self, status: AuthStatus) {
        self.inner.state.send_modify(|s| s.status = status);
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
