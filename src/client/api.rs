//! Backend auth API used by the session manager.
//!
//! ERROR HANDLING
//! ==============
//! Every call returns an `ApiError` rather than panicking. Non-2xx responses
//! keep the backend's own message (from a JSON `message`/`error` field when
//! present) so callers can show it to the user as-is.

use std::time::Duration;

use super::types::{LoginResponse, User};
use crate::config::ClientConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// Transport failure: unreachable host, timeout, reset connection.
    #[error("request failed: {0}")]
    Request(String),

    #[error("request rejected with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The backend answered 2xx with a body we could not parse.
    #[error("response parse failed: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP status for rejections, `None` for every other failure.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// `GET /auth/me` → `{ user }`.
    async fn me(&self, access_token: &str) -> Result<User, ApiError>;

    /// `POST /auth/login` → `{ user, accessToken, refreshToken }`.
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;

    /// `POST /auth/logout`.
    async fn logout(&self, access_token: Option<&str>) -> Result<(), ApiError>;

    /// `POST /auth/register`.
    async fn register(&self, name: &str, email: &str, password: &str) -> Result<(), ApiError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

pub struct HttpAuthApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAuthApi {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::with_timeouts(&config.base_url, config.request_timeout, config.connect_timeout)
    }

    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn with_timeouts(base_url: &str, request: Duration, connect: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(request)
            .connect_timeout(connect)
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a request and return the body of a 2xx response.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::Status { status: status.as_u16(), message: rejection_message(&body, status) });
        }
        Ok(body)
    }
}

#[derive(serde::Deserialize)]
struct MeResponse {
    user: User,
}

#[async_trait::async_trait]
impl AuthApi for HttpAuthApi {
    async fn me(&self, access_token: &str) -> Result<User, ApiError> {
        let body = self
            .send(self.http.get(self.url("/auth/me")).bearer_auth(access_token))
            .await?;
        let parsed: MeResponse = serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(parsed.user)
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = self
            .http
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }));
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn logout(&self, access_token: Option<&str>) -> Result<(), ApiError> {
        let mut request = self.http.post(self.url("/auth/logout"));
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }
        self.send(request).await.map(|_| ())
    }

    async fn register(&self, name: &str, email: &str, password: &str) -> Result<(), ApiError> {
        let request = self
            .http
            .post(self.url("/auth/register"))
            .json(&serde_json::json!({ "name": name, "email": email, "password": password }));
        self.send(request).await.map(|_| ())
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Pick the human-readable message out of an error response body.
fn rejection_message(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(serde_json::Value::String(msg)) = map.get(key) {
                return msg.clone();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request rejected")
            .to_owned()
    } else {
        trimmed.to_owned()
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
