use std::sync::Mutex;

use serde_json::json;
use tokio::sync::Notify;
use tokio::time::{Duration, timeout};

use super::*;
use crate::client::store::{CREDENTIAL_KEYS, MemoryStore, StoreError};

// =============================================================================
// FAKE API
// =============================================================================

fn user(value: serde_json::Value) -> User {
    serde_json::from_value(value).unwrap()
}

fn unauthorized() -> ApiError {
    ApiError::Status { status: 401, message: "Not authorized".into() }
}

struct FakeApi {
    me: Result<User, ApiError>,
    login: Result<LoginResponse, ApiError>,
    logout: Result<(), ApiError>,
    register: Result<(), ApiError>,
    /// When set, `me` waits for a permit before answering.
    me_gate: Option<Arc<Notify>>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            me: Err(unauthorized()),
            login: Err(unauthorized()),
            logout: Ok(()),
            register: Ok(()),
            me_gate: None,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeApi {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl AuthApi for FakeApi {
    async fn me(&self, access_token: &str) -> Result<User, ApiError> {
        self.record(format!("me:{access_token}"));
        if let Some(gate) = &self.me_gate {
            gate.notified().await;
        }
        self.me.clone()
    }

    async fn login(&self, email: &str, _password: &str) -> Result<LoginResponse, ApiError> {
        self.record(format!("login:{email}"));
        self.login.clone()
    }

    async fn logout(&self, access_token: Option<&str>) -> Result<(), ApiError> {
        self.record(format!("logout:{}", access_token.unwrap_or("-")));
        self.logout.clone()
    }

    async fn register(&self, name: &str, email: &str, _password: &str) -> Result<(), ApiError> {
        self.record(format!("register:{name}:{email}"));
        self.register.clone()
    }
}

fn setup(api: FakeApi) -> (SessionManager, Arc<FakeApi>, Arc<MemoryStore>) {
    let api = Arc::new(api);
    let store = Arc::new(MemoryStore::new());
    let manager = SessionManager::new(api.clone(), store.clone());
    (manager, api, store)
}

fn seed_credentials(store: &MemoryStore, cached_user: Option<&str>) {
    store.set(ACCESS_TOKEN_KEY, "t-old").unwrap();
    store.set(REFRESH_TOKEN_KEY, "r-old").unwrap();
    if let Some(raw) = cached_user {
        store.set(USER_KEY, raw).unwrap();
    }
}

fn assert_credentials_cleared(store: &MemoryStore) {
    for key in CREDENTIAL_KEYS {
        assert_eq!(store.get(key).unwrap(), None, "{key} should be cleared");
    }
}

// =============================================================================
// check_status
// =============================================================================

#[tokio::test]
async fn check_status_without_token_makes_no_calls() {
    let (manager, api, _store) = setup(FakeApi::default());
    assert!(manager.is_loading());

    let session = manager.check_status().await;

    assert_eq!(session.status, AuthStatus::Unauthenticated);
    assert!(!session.loading);
    assert!(manager.current_user().is_none());
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn check_status_applies_cached_user_before_verification() {
    let gate = Arc::new(Notify::new());
    let verified = user(json!({ "id": 1, "name": "Ada Lovelace" }));
    let (manager, api, store) =
        setup(FakeApi { me: Ok(verified.clone()), me_gate: Some(gate.clone()), ..FakeApi::default() });
    seed_credentials(&store, Some(r#"{"id":1,"name":"Ada"}"#));

    let mut rx = manager.subscribe();
    let task = tokio::spawn({
        let manager = manager.clone();
        async move { manager.check_status().await }
    });

    let optimistic = timeout(Duration::from_secs(1), rx.wait_for(|s| matches!(s.status, AuthStatus::Optimistic(_))))
        .await
        .expect("optimistic state never published")
        .unwrap()
        .clone();
    assert_eq!(optimistic.current_user(), Some(&user(json!({ "id": 1, "name": "Ada" }))));
    assert!(optimistic.loading, "verification is still outstanding");

    gate.notify_one();
    let session = task.await.unwrap();

    assert_eq!(session.status, AuthStatus::Authenticated(verified.clone()));
    assert!(!session.loading);
    assert_eq!(api.calls(), vec!["me:t-old".to_owned()]);
    let persisted: User = serde_json::from_str(&store.get(USER_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(persisted, verified);
}

#[tokio::test]
async fn check_status_verifies_without_cached_user() {
    let verified = user(json!({ "id": "u1" }));
    let (manager, _api, store) = setup(FakeApi { me: Ok(verified.clone()), ..FakeApi::default() });
    seed_credentials(&store, None);

    let session = manager.check_status().await;

    assert_eq!(session.status, AuthStatus::Authenticated(verified));
    assert_eq!(store.get(USER_KEY).unwrap().as_deref(), Some(r#"{"id":"u1"}"#));
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("t-old"));
}

#[tokio::test]
async fn rejected_verification_clears_everything() {
    let (manager, _api, store) = setup(FakeApi::default());
    seed_credentials(&store, Some(r#"{"id":1}"#));

    let session = manager.check_status().await;

    assert_eq!(session.status, AuthStatus::Unauthenticated);
    assert!(!session.loading);
    assert_credentials_cleared(&store);
}

#[tokio::test]
async fn network_failure_during_verification_clears_everything() {
    let (manager, _api, store) =
        setup(FakeApi { me: Err(ApiError::Request("connection refused".into())), ..FakeApi::default() });
    seed_credentials(&store, Some(r#"{"id":1}"#));

    let session = manager.check_status().await;

    assert!(session.current_user().is_none());
    assert_credentials_cleared(&store);
}

#[tokio::test]
async fn malformed_response_clears_everything() {
    let (manager, _api, store) =
        setup(FakeApi { me: Err(ApiError::Decode("missing field `user`".into())), ..FakeApi::default() });
    seed_credentials(&store, None);

    manager.check_status().await;

    assert!(manager.current_user().is_none());
    assert_credentials_cleared(&store);
}

#[tokio::test]
async fn corrupt_cached_user_counts_as_failed_verification() {
    let (manager, api, store) = setup(FakeApi { me: Ok(user(json!({ "id": 1 }))), ..FakeApi::default() });
    seed_credentials(&store, Some("{ definitely not json"));

    let session = manager.check_status().await;

    assert_eq!(session.status, AuthStatus::Unauthenticated);
    assert!(api.calls().is_empty());
    assert_credentials_cleared(&store);
}

#[tokio::test]
async fn cancelled_check_still_clears_loading() {
    let gate = Arc::new(Notify::new());
    let (manager, _api, store) = setup(FakeApi { me_gate: Some(gate), ..FakeApi::default() });
    seed_credentials(&store, Some(r#"{"id":1}"#));

    let mut rx = manager.subscribe();
    let task = tokio::spawn({
        let manager = manager.clone();
        async move { manager.check_status().await }
    });
    timeout(Duration::from_secs(1), rx.wait_for(|s| matches!(s.status, AuthStatus::Optimistic(_))))
        .await
        .unwrap()
        .unwrap();

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert!(!manager.is_loading());
}

#[tokio::test]
async fn recheck_reports_loading_again() {
    let (manager, _api, _store) = setup(FakeApi::default());
    manager.check_status().await;
    assert!(!manager.is_loading());

    let mut rx = manager.subscribe();
    manager.check_status().await;
    assert!(rx.has_changed().unwrap());
    assert!(!manager.is_loading());
}

// =============================================================================
// login
// =============================================================================

#[tokio::test]
async fn login_persists_tokens_and_user() {
    let response = LoginResponse {
        user: user(json!({ "id": 1 })),
        access_token: Some("t1".into()),
        refresh_token: Some("r1".into()),
    };
    let (manager, api, store) = setup(FakeApi { login: Ok(response), ..FakeApi::default() });

    let signed_in = manager.login("a@b.com", "pw").await.unwrap();

    assert_eq!(signed_in, user(json!({ "id": 1 })));
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("t1"));
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));
    assert_eq!(store.get(USER_KEY).unwrap().as_deref(), Some(r#"{"id":1}"#));
    assert_eq!(manager.current_user(), Some(user(json!({ "id": 1 }))));
    assert_eq!(manager.session().status, AuthStatus::Authenticated(user(json!({ "id": 1 }))));
    assert_eq!(api.calls(), vec!["login:a@b.com".to_owned()]);
}

#[tokio::test]
async fn login_without_refresh_token_leaves_it_unset() {
    let response = LoginResponse { user: user(json!({ "id": 2 })), access_token: Some("t2".into()), refresh_token: None };
    let (manager, _api, store) = setup(FakeApi { login: Ok(response), ..FakeApi::default() });

    manager.login("c@d.com", "pw").await.unwrap();

    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("t2"));
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn login_failure_propagates_unchanged() {
    let rejection = ApiError::Status { status: 401, message: "Invalid credentials".into() };
    let (manager, _api, store) = setup(FakeApi { login: Err(rejection.clone()), ..FakeApi::default() });

    let err = manager.login("a@b.com", "wrong").await.unwrap_err();

    assert!(matches!(&err, SessionError::Api(e) if *e == rejection));
    assert_eq!(err.to_string(), rejection.to_string());
    assert_credentials_cleared(&store);
    assert_eq!(manager.session().status, AuthStatus::Unknown);
}

/// Rejects writes to one key; everything else goes to memory.
struct ReadOnlyKeyStore {
    inner: MemoryStore,
    locked_key: &'static str,
}

impl CredentialStore for ReadOnlyKeyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if key == self.locked_key {
            return Err(StoreError::Io("disk full".into()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }
}

#[tokio::test]
async fn login_store_failure_leaves_no_partial_credentials() {
    let response = LoginResponse {
        user: user(json!({ "id": 1 })),
        access_token: Some("t1".into()),
        refresh_token: Some("r1".into()),
    };
    let api = Arc::new(FakeApi { login: Ok(response), ..FakeApi::default() });
    let store = Arc::new(ReadOnlyKeyStore { inner: MemoryStore::new(), locked_key: USER_KEY });
    let manager = SessionManager::new(api, store.clone());

    let err = manager.login("a@b.com", "pw").await.unwrap_err();

    assert!(matches!(err, SessionError::Store(StoreError::Io(_))));
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
    assert_eq!(store.get(USER_KEY).unwrap(), None);
    assert!(manager.current_user().is_none());

    // Nothing left behind for the next start to verify.
    assert_eq!(manager.check_status().await.status, AuthStatus::Unauthenticated);
}

// =============================================================================
// logout
// =============================================================================

#[tokio::test]
async fn logout_clears_state_and_sends_token() {
    let (manager, api, store) = setup(FakeApi { me: Ok(user(json!({ "id": 1 }))), ..FakeApi::default() });
    seed_credentials(&store, Some(r#"{"id":1}"#));
    manager.check_status().await;
    assert!(manager.current_user().is_some());

    manager.logout().await;

    assert!(manager.current_user().is_none());
    assert_eq!(manager.session().status, AuthStatus::Unauthenticated);
    assert_credentials_cleared(&store);
    assert_eq!(api.calls().last().map(String::as_str), Some("logout:t-old"));
}

#[tokio::test]
async fn logout_clears_state_even_when_backend_fails() {
    let (manager, _api, store) =
        setup(FakeApi { logout: Err(ApiError::Request("network down".into())), ..FakeApi::default() });
    seed_credentials(&store, Some(r#"{"id":1}"#));

    manager.logout().await;

    assert!(manager.current_user().is_none());
    assert_credentials_cleared(&store);
}

#[tokio::test]
async fn logout_without_token_still_calls_backend() {
    let (manager, api, _store) = setup(FakeApi::default());
    manager.logout().await;
    assert_eq!(api.calls(), vec!["logout:-".to_owned()]);
    assert_eq!(manager.session().status, AuthStatus::Unauthenticated);
}

// =============================================================================
// register
// =============================================================================

#[tokio::test]
async fn register_forwards_without_touching_session() {
    let (manager, api, store) = setup(FakeApi::default());

    manager.register("Ada", "ada@example.test", "pw").await.unwrap();

    assert_eq!(api.calls(), vec!["register:Ada:ada@example.test".to_owned()]);
    assert_eq!(manager.session(), Session::default());
    assert_credentials_cleared(&store);
}

#[tokio::test]
async fn register_failure_propagates() {
    let conflict = ApiError::Status { status: 409, message: "Email already registered".into() };
    let (manager, _api, _store) = setup(FakeApi { register: Err(conflict.clone()), ..FakeApi::default() });

    let err = manager.register("Ada", "ada@example.test", "pw").await.unwrap_err();

    assert!(matches!(&err, SessionError::Api(e) if *e == conflict));
}

// =============================================================================
// sharing
// =============================================================================

#[tokio::test]
async fn clones_share_state() {
    let response = LoginResponse { user: user(json!({ "id": 3 })), access_token: Some("t3".into()), refresh_token: None };
    let (manager, _api, _store) = setup(FakeApi { login: Ok(response), ..FakeApi::default() });
    let view = manager.clone();
    let mut rx = view.subscribe();

    manager.login("e@f.com", "pw").await.unwrap();

    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().current_user(), Some(&user(json!({ "id": 3 }))));
    assert_eq!(view.current_user(), Some(user(json!({ "id": 3 }))));
}
