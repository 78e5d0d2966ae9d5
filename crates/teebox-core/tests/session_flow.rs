//! Session flows against a local stand-in for the teebox API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use teebox_core::{
    ApiClient, AuthState, FileTokenStore, MemoryTokenStore, SessionError, SessionManager,
    SessionToken, TokenStore, UserProfile,
};

// ============================================================================
// Mock API
// ============================================================================

#[derive(Default)]
struct MockApi {
    requests: AtomicUsize,
}

impl MockApi {
    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

async fn login(State(api): State<Arc<MockApi>>, Json(body): Json<Value>) -> Response {
    api.hit();
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    match (username, password) {
        ("alice", "pw123") => Json(json!({"access_token": "tok-1", "token_type": "bearer"})).into_response(),
        ("carol", "pw") => Json(json!({"data": {"access_token": "tok-3"}})).into_response(),
        ("erin", "pw") => Json(json!({"token_type": "bearer"})).into_response(),
        ("dave", _) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => detail(StatusCode::BAD_REQUEST, "Invalid username or password"),
    }
}

async fn create_user(State(api): State<Arc<MockApi>>, Json(body): Json<Value>) -> Response {
    api.hit();
    match body["username"].as_str() {
        Some("alice") => detail(StatusCode::BAD_REQUEST, "Username or email already exists"),
        Some(username) => (
            StatusCode::CREATED,
            Json(json!({
                "id": 2,
                "username": username,
                "email": body["email"],
                "created_at": "2024-01-02T10:00:00.000000"
            })),
        )
            .into_response(),
        None => detail(StatusCode::UNPROCESSABLE_ENTITY, "field required"),
    }
}

async fn me(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Response {
    api.hit();
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match authorization {
        Some("Bearer tok-1") => Json(json!({
            "id": 1,
            "username": "alice",
            "email": null,
            "created_at": "2024-01-01T00:00:00Z"
        }))
        .into_response(),
        _ => detail(StatusCode::UNAUTHORIZED, "Invalid authentication credentials"),
    }
}

async fn spawn_mock() -> (ApiClient, Arc<MockApi>) {
    let api = Arc::new(MockApi::default());
    let app = Router::new()
        .route("/login", post(login))
        .route("/user", post(create_user))
        .route("/me", get(me))
        .with_state(api.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = ApiClient::new(&format!("http://{}", addr)).unwrap();
    (client, api)
}

/// Every endpoint answers only after the client has given up
async fn spawn_slow_mock(timeout: Duration) -> ApiClient {
    async fn stall() -> Response {
        tokio::time::sleep(Duration::from_secs(5)).await;
        StatusCode::OK.into_response()
    }

    let app = Router::new()
        .route("/login", post(stall))
        .route("/user", post(stall))
        .route("/me", get(stall));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    ApiClient::with_timeout(&format!("http://{}", addr), timeout).unwrap()
}

/// A client for a port nothing listens on
async fn closed_port_client() -> ApiClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    ApiClient::new(&format!("http://{}", addr)).unwrap()
}

fn network_message(err: SessionError) -> String {
    match err {
        SessionError::Network(message) => message.to_lowercase(),
        other => panic!("expected a network error, got {:?}", other),
    }
}

fn alice() -> UserProfile {
    UserProfile {
        id: 1,
        username: "alice".to_string(),
        email: None,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn login_stores_issued_token() {
    let (client, api) = spawn_mock().await;
    let store = MemoryTokenStore::new();
    let mut session = SessionManager::new(client, store.clone());

    session.login("alice", "pw123").await.unwrap();

    assert_eq!(session.token(), Some(&SessionToken::new("tok-1")));
    assert_eq!(
        *session.state(),
        AuthState::Authenticated(SessionToken::new("tok-1"))
    );
    assert_eq!(store.load().unwrap(), Some(SessionToken::new("tok-1")));
    assert_eq!(api.requests(), 1);
}

#[tokio::test]
async fn login_accepts_nested_token() {
    let (client, _api) = spawn_mock().await;
    let mut session = SessionManager::new(client, MemoryTokenStore::new());

    session.login("carol", "pw").await.unwrap();
    assert_eq!(session.token(), Some(&SessionToken::new("tok-3")));
}

#[tokio::test]
async fn login_rejected_surfaces_server_message() {
    let (client, _api) = spawn_mock().await;
    let store = MemoryTokenStore::new();
    let mut session = SessionManager::new(client, store.clone());

    let err = session.login("alice", "wrong").await.unwrap_err();
    assert_eq!(err, SessionError::Auth("Invalid username or password".to_string()));
    assert!(!session.is_authenticated());
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn login_rejected_without_detail_uses_generic_message() {
    let (client, _api) = spawn_mock().await;
    let mut session = SessionManager::new(client, MemoryTokenStore::new());

    let err = session.login("dave", "pw").await.unwrap_err();
    assert_eq!(err, SessionError::Auth("Login failed".to_string()));
}

#[tokio::test]
async fn login_without_token_in_payload_is_network_error() {
    let (client, _api) = spawn_mock().await;
    let mut session = SessionManager::new(client, MemoryTokenStore::new());

    let err = session.login("erin", "pw").await.unwrap_err();
    assert!(matches!(err, SessionError::Network(_)), "got {:?}", err);
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn login_failure_keeps_previous_token() {
    let (client, _api) = spawn_mock().await;
    let store = MemoryTokenStore::with_token(SessionToken::new("tok-1"));
    let mut session = SessionManager::new(client, store.clone());

    assert!(session.login("alice", "wrong").await.is_err());
    assert_eq!(session.token(), Some(&SessionToken::new("tok-1")));
    assert_eq!(store.load().unwrap(), Some(SessionToken::new("tok-1")));
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn missing_fields_never_reach_the_server() {
    let (client, api) = spawn_mock().await;
    let mut session = SessionManager::new(client, MemoryTokenStore::new());

    for (username, password) in [("", "pw123"), ("alice", ""), ("", "")] {
        assert!(matches!(
            session.login(username, password).await,
            Err(SessionError::Validation(_))
        ));
        assert!(matches!(
            session.create_account(username, password, None).await,
            Err(SessionError::Validation(_))
        ));
    }

    assert_eq!(api.requests(), 0);
}

// ============================================================================
// Profile
// ============================================================================

#[tokio::test]
async fn profile_after_login_matches_account() {
    let (client, api) = spawn_mock().await;
    let mut session = SessionManager::new(client, MemoryTokenStore::new());

    session.login("alice", "pw123").await.unwrap();
    let profile = session.fetch_profile().await.unwrap();

    assert_eq!(profile, alice());
    assert!(session.is_authenticated());
    assert_eq!(api.requests(), 2);
}

#[tokio::test]
async fn profile_without_token_makes_no_request() {
    let (client, api) = spawn_mock().await;
    let mut session = SessionManager::new(client, MemoryTokenStore::new());

    assert_eq!(
        session.fetch_profile().await.unwrap_err(),
        SessionError::Unauthenticated
    );
    assert_eq!(api.requests(), 0);
}

#[tokio::test]
async fn rejected_token_is_cleared() {
    let (client, api) = spawn_mock().await;
    let store = MemoryTokenStore::with_token(SessionToken::new("expired"));
    let mut session = SessionManager::new(client, store.clone());
    assert!(session.is_authenticated());

    let err = session.fetch_profile().await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Auth("Invalid authentication credentials".to_string())
    );
    assert!(err.requires_login());
    assert_eq!(*session.state(), AuthState::Unauthenticated);
    assert_eq!(store.load().unwrap(), None);

    // The bad token is not sent again
    assert_eq!(
        session.fetch_profile().await.unwrap_err(),
        SessionError::Unauthenticated
    );
    assert_eq!(api.requests(), 1);
}

// ============================================================================
// Account creation
// ============================================================================

#[tokio::test]
async fn create_account_leaves_token_alone() {
    let (client, _api) = spawn_mock().await;
    let store = MemoryTokenStore::new();
    let session = SessionManager::new(client.clone(), store.clone());

    let profile = session.create_account("bob", "pw", None).await.unwrap();
    assert_eq!(profile.username, "bob");
    assert_eq!(profile.email, None);
    assert!(!session.is_authenticated());
    assert_eq!(store.load().unwrap(), None);

    let logged_in = MemoryTokenStore::with_token(SessionToken::new("tok-1"));
    let session = SessionManager::new(client, logged_in.clone());
    session
        .create_account("bob", "pw", Some("bob@example.com"))
        .await
        .unwrap();
    assert_eq!(session.token(), Some(&SessionToken::new("tok-1")));
    assert_eq!(logged_in.load().unwrap(), Some(SessionToken::new("tok-1")));
}

#[tokio::test]
async fn create_account_sends_empty_email_as_null() {
    let (client, _api) = spawn_mock().await;
    let session = SessionManager::new(client, MemoryTokenStore::new());

    let profile = session.create_account("bob", "pw", Some("")).await.unwrap();
    assert_eq!(profile.email, None);
}

#[tokio::test]
async fn create_account_conflict_surfaces_server_message() {
    let (client, _api) = spawn_mock().await;
    let session = SessionManager::new(client, MemoryTokenStore::new());

    let err = session.create_account("alice", "pw", None).await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Auth("Username or email already exists".to_string())
    );
}

// ============================================================================
// Logout and persistence
// ============================================================================

#[tokio::test]
async fn logout_after_login_is_idempotent() {
    let (client, _api) = spawn_mock().await;
    let store = MemoryTokenStore::new();
    let mut session = SessionManager::new(client, store.clone());

    session.login("alice", "pw123").await.unwrap();
    session.logout();
    assert_eq!(session.token(), None);
    assert_eq!(store.load().unwrap(), None);

    session.logout();
    assert_eq!(session.token(), None);
}

#[tokio::test]
async fn file_session_survives_restart() {
    let (client, _api) = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();

    let mut first = SessionManager::new(client.clone(), FileTokenStore::new(dir.path()));
    first.login("alice", "pw123").await.unwrap();
    drop(first);

    let mut second = SessionManager::new(client.clone(), FileTokenStore::new(dir.path()));
    assert!(second.is_authenticated());
    assert_eq!(second.fetch_profile().await.unwrap(), alice());
    second.logout();
    drop(second);

    let third = SessionManager::new(client, FileTokenStore::new(dir.path()));
    assert!(!third.is_authenticated());
}

#[tokio::test]
async fn unreadable_session_file_starts_logged_out() {
    let (client, _api) = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let store = FileTokenStore::new(dir.path());
    std::fs::write(store.path(), "{ not json").unwrap();

    let mut session = SessionManager::new(client, store);
    assert!(!session.is_authenticated());

    session.login("alice", "pw123").await.unwrap();
    assert!(session.is_authenticated());
}

// ============================================================================
// Transport failures
// ============================================================================

#[tokio::test]
async fn login_to_closed_port_is_network_error() {
    let client = closed_port_client().await;
    let store = MemoryTokenStore::with_token(SessionToken::new("tok-1"));
    let mut session = SessionManager::new(client, store.clone());

    let err = session.login("alice", "pw123").await.unwrap_err();
    assert!(!err.requires_login());
    let message = network_message(err);
    assert!(message.contains("refused"), "got {:?}", message);

    assert_eq!(session.token(), Some(&SessionToken::new("tok-1")));
    assert_eq!(store.load().unwrap(), Some(SessionToken::new("tok-1")));
}

#[tokio::test]
async fn create_account_to_closed_port_is_network_error() {
    let client = closed_port_client().await;
    let store = MemoryTokenStore::new();
    let session = SessionManager::new(client, store.clone());

    let err = session.create_account("bob", "pw", None).await.unwrap_err();
    let message = network_message(err);
    assert!(message.contains("refused"), "got {:?}", message);

    assert!(!session.is_authenticated());
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn slow_login_times_out_as_network_error() {
    let client = spawn_slow_mock(Duration::from_millis(200)).await;
    let store = MemoryTokenStore::new();
    let mut session = SessionManager::new(client, store.clone());

    let err = session.login("alice", "pw123").await.unwrap_err();
    let message = network_message(err);
    assert!(message.contains("timed out"), "got {:?}", message);

    assert!(!session.is_authenticated());
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn slow_create_account_times_out_as_network_error() {
    let client = spawn_slow_mock(Duration::from_millis(200)).await;
    let store = MemoryTokenStore::with_token(SessionToken::new("tok-1"));
    let session = SessionManager::new(client, store.clone());

    let err = session.create_account("bob", "pw", None).await.unwrap_err();
    let message = network_message(err);
    assert!(message.contains("timed out"), "got {:?}", message);

    assert_eq!(store.load().unwrap(), Some(SessionToken::new("tok-1")));
}

#[tokio::test]
async fn slow_profile_times_out_and_keeps_token() {
    let client = spawn_slow_mock(Duration::from_millis(200)).await;
    let store = MemoryTokenStore::with_token(SessionToken::new("tok-1"));
    let mut session = SessionManager::new(client, store.clone());

    let err = session.fetch_profile().await.unwrap_err();
    assert!(!err.requires_login());
    let message = network_message(err);
    assert!(message.contains("timed out"), "got {:?}", message);

    assert!(session.is_authenticated());
    assert_eq!(store.load().unwrap(), Some(SessionToken::new("tok-1")));
}
