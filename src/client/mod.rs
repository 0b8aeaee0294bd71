//! Client-side session handling.
//!
//! DESIGN
//! ======
//! Split the way the application sees it: `types` for the shared session
//! model, `store` for credentials persisted between runs, `api` for the
//! backend auth endpoints, and `session` for the manager that ties them
//! together.

pub mod api;
pub mod session;
pub mod store;
pub mod types;

pub use api::{ApiError, AuthApi, HttpAuthApi};
pub use session::{SessionError, SessionManager};
pub use store::{CredentialStore, JsonFileStore, MemoryStore, StoreError};
pub use types::{AuthStatus, LoginResponse, Session, User};
