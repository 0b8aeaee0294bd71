//! Session-client data types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User record as returned by the backend.
///
/// Treated as opaque: only `id`, `name` and `email` are named, every other
/// field is carried through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `POST /auth/login` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Where the client stands with respect to identity.
///
/// `Unknown` is the only initial phase. A cached user moves it to
/// `Optimistic` until the backend confirms (`Authenticated`) or rejects
/// (`Unauthenticated`) it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthStatus {
    #[default]
    Unknown,
    Optimistic(User),
    Authenticated(User),
    Unauthenticated,
}

impl AuthStatus {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Optimistic(user) | Self::Authenticated(user) => Some(user),
            Self::Unknown | Self::Unauthenticated => None,
        }
    }
}

/// Snapshot of the session shared with the rest of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub status: AuthStatus,
    /// `true` until the current status check has finished.
    pub loading: bool,
}

impl Session {
    #[must_use]
    pub fn current_user(&self) -> Option<&User> {
        self.status.user()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self { status: AuthStatus::Unknown, loading: true }
    }
}
