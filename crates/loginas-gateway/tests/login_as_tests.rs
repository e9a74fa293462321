#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! End-to-end tests for the redemption route.
//!
//! Drives the router with `oneshot` against in-memory users and sessions,
//! with the clock pinned to 2023-01-01T00:00:00Z.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use loginas_api::{
    LoginAsError, SessionBackend, SessionId, UnixSeconds, UserId, UserRecord, UserStore,
};
use loginas_auth::{FixedClock, SigningKeys, TokenGenerator};
use loginas_connectors::{MemorySessionBackend, MemoryUserStore};
use loginas_core::{Settings, parse_settings};
use loginas_gateway::{GatewayState, NEVER_CACHE, router};
use tower::ServiceExt;

const NOW: i64 = 1_672_531_200;
const PRIOR_LOGIN: i64 = 1_600_000_000;

struct Harness {
    app: Router,
    tokens: TokenGenerator,
    clock: Arc<FixedClock>,
    users: Arc<MemoryUserStore>,
    sessions: Arc<MemorySessionBackend>,
}

fn settings() -> Settings {
    parse_settings(
        r#"
[signing]
secret_ref = "TEST_SECRET"

[redirects]
success = "/dashboard/"
failure = "/login/"

[urls]
route_prefix = "/login-as"
"#,
    )
    .unwrap()
}

fn seeded_users() -> Arc<MemoryUserStore> {
    Arc::new(MemoryUserStore::with_users([UserRecord {
        id: UserId::from("user-1"),
        username: "user-1".to_string(),
        last_login: Some(PRIOR_LOGIN),
    }]))
}

fn state(
    tokens: &TokenGenerator,
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionBackend>,
    clock: Arc<FixedClock>,
) -> GatewayState {
    GatewayState::from_settings(&settings(), tokens.clone(), users, sessions, clock)
}

fn harness() -> Harness {
    let clock = Arc::new(FixedClock::new(NOW));
    let users = seeded_users();
    let sessions = Arc::new(MemorySessionBackend::new(users.clone(), clock.clone()));
    let tokens = TokenGenerator::with_clock(SigningKeys::new("test-secret"), clock.clone());

    let state = state(&tokens, users.clone(), sessions.clone(), clock.clone());
    let app = router(state, &settings().urls.route_prefix);

    Harness {
        app,
        tokens,
        clock,
        users,
        sessions,
    }
}

/// User store that fails the calls it is told to and serves the rest from
/// a `MemoryUserStore`.
struct FlakyUsers {
    inner: Arc<MemoryUserStore>,
    fail_lookup: bool,
    /// 1-based index of the `set_last_login` call that fails.
    fail_write: Option<usize>,
    writes: AtomicUsize,
}

impl FlakyUsers {
    fn new(inner: Arc<MemoryUserStore>) -> Self {
        Self {
            inner,
            fail_lookup: false,
            fail_write: None,
            writes: AtomicUsize::new(0),
        }
    }
}

impl UserStore for FlakyUsers {
    fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, LoginAsError> {
        if self.fail_lookup {
            return Err(LoginAsError::Storage("user table unavailable".to_string()));
        }
        self.inner.find_by_id(id)
    }

    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, LoginAsError> {
        self.inner.find_by_username(username)
    }

    fn set_last_login(
        &self,
        id: &UserId,
        last_login: Option<UnixSeconds>,
    ) -> Result<(), LoginAsError> {
        let call = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_write == Some(call) {
            return Err(LoginAsError::Storage("write failed".to_string()));
        }
        self.inner.set_last_login(id, last_login)
    }
}

/// Session backend that cannot create sessions.
struct DownSessions;

impl SessionBackend for DownSessions {
    fn login(&self, _user: &UserRecord) -> Result<SessionId, LoginAsError> {
        Err(LoginAsError::Session("session store unavailable".to_string()))
    }

    fn logout(&self, _session_id: &str) -> Result<(), LoginAsError> {
        Ok(())
    }
}

async fn send(app: &Router, method: &str, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

fn header_str<'a>(response: &'a Response<Body>, name: header::HeaderName) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

fn session_id(response: &Response<Body>) -> String {
    let cookie = header_str(response, header::SET_COOKIE).expect("set-cookie header");
    let (name, rest) = cookie.split_once('=').unwrap();
    assert_eq!(name, "__Host-loginas_session");
    rest.split(';').next().unwrap().to_string()
}

fn assert_never_cached(response: &Response<Body>) {
    assert_eq!(header_str(response, header::CACHE_CONTROL), Some(NEVER_CACHE));
    assert!(header_str(response, header::EXPIRES).is_some());
}

fn assert_login_prompt(response: &Response<Body>) {
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(header_str(response, header::LOCATION), Some("/login/?next="));
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_never_cached(response);
}

#[tokio::test]
async fn test_valid_token_logs_in_and_preserves_last_login() {
    let h = harness();
    let user = UserId::from("user-1");
    let token = h.tokens.issue_default(&user).unwrap();

    let response = send(&h.app, "GET", &format!("/login-as/{token}/")).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(header_str(&response, header::LOCATION), Some("/dashboard/"));
    assert_never_cached(&response);

    let session = session_id(&response);
    assert_eq!(h.sessions.user_for(&session), Some(user.clone()));
    assert_eq!(
        h.users.snapshot(&user).unwrap().last_login,
        Some(PRIOR_LOGIN)
    );
    assert_eq!(h.users.reads(), 1);
}

#[tokio::test]
async fn test_invalid_token_redirects_to_login_without_lookup() {
    let h = harness();

    let response = send(&h.app, "GET", "/login-as/not-a-token/").await;

    assert_login_prompt(&response);
    assert_eq!(h.users.reads(), 0);
    assert_eq!(h.users.writes(), 0);
    assert_eq!(h.sessions.session_count(), 0);
}

#[tokio::test]
async fn test_deleted_user_looks_like_bad_signature() {
    let h = harness();
    let user = UserId::from("user-1");
    let token = h.tokens.issue_default(&user).unwrap();
    h.users.remove(&user).unwrap();

    let deleted = send(&h.app, "GET", &format!("/login-as/{token}/")).await;
    assert_login_prompt(&deleted);
    assert_eq!(h.sessions.session_count(), 0);

    let forger = TokenGenerator::with_clock(SigningKeys::new("wrong-secret"), h.clock.clone());
    let forged = forger.issue_default(&UserId::from("user-1")).unwrap();
    let bad_signature = send(&h.app, "GET", &format!("/login-as/{forged}/")).await;
    assert_login_prompt(&bad_signature);

    assert_eq!(deleted.status(), bad_signature.status());
    assert_eq!(
        header_str(&deleted, header::LOCATION),
        header_str(&bad_signature, header::LOCATION)
    );
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let h = harness();
    let token = h.tokens.issue(&UserId::from("user-1"), 30).unwrap();

    h.clock.advance(31);
    let response = send(&h.app, "GET", &format!("/login-as/{token}/")).await;

    assert_login_prompt(&response);
    assert_eq!(h.users.reads(), 0);
}

#[tokio::test]
async fn test_token_can_be_redeemed_twice_within_window() {
    let h = harness();
    let token = h.tokens.issue_default(&UserId::from("user-1")).unwrap();
    let uri = format!("/login-as/{token}/");

    let first = send(&h.app, "GET", &uri).await;
    h.clock.advance(10);
    let second = send(&h.app, "GET", &uri).await;

    assert_eq!(first.status(), StatusCode::FOUND);
    assert_eq!(second.status(), StatusCode::FOUND);
    assert_ne!(session_id(&first), session_id(&second));
    assert_eq!(h.sessions.session_count(), 2);
}

#[tokio::test]
async fn test_head_is_not_allowed() {
    let h = harness();
    let token = h.tokens.issue_default(&UserId::from("user-1")).unwrap();

    let response = send(&h.app, "HEAD", &format!("/login-as/{token}/")).await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(header_str(&response, header::ALLOW), Some("GET"));
    assert_never_cached(&response);
    assert_eq!(h.users.reads(), 0);
    assert_eq!(h.sessions.session_count(), 0);
}

#[tokio::test]
async fn test_other_methods_are_not_allowed() {
    let h = harness();

    for method in ["POST", "PUT", "DELETE", "PATCH"] {
        let response = send(&h.app, method, "/login-as/not-a-token/").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
    }
    assert_eq!(h.users.reads(), 0);
}

#[tokio::test]
async fn test_undecodable_path_redirects_to_login() {
    let h = harness();

    let response = send(&h.app, "GET", "/login-as/%FF%FE/").await;

    assert_login_prompt(&response);
    assert_eq!(h.users.reads(), 0);
}

#[tokio::test]
async fn test_user_lookup_failure_redirects_to_login() {
    let clock = Arc::new(FixedClock::new(NOW));
    let inner = seeded_users();
    let users = Arc::new(FlakyUsers {
        fail_lookup: true,
        ..FlakyUsers::new(inner.clone())
    });
    let sessions = Arc::new(MemorySessionBackend::new(users.clone(), clock.clone()));
    let tokens = TokenGenerator::with_clock(SigningKeys::new("test-secret"), clock.clone());
    let app = router(state(&tokens, users, sessions.clone(), clock), "/login-as");

    let token = tokens.issue_default(&UserId::from("user-1")).unwrap();
    let response = send(&app, "GET", &format!("/login-as/{token}/")).await;

    assert_login_prompt(&response);
    assert_eq!(sessions.session_count(), 0);
    assert_eq!(inner.writes(), 0);
}

#[tokio::test]
async fn test_session_backend_failure_redirects_to_login() {
    let clock = Arc::new(FixedClock::new(NOW));
    let users = seeded_users();
    let tokens = TokenGenerator::with_clock(SigningKeys::new("test-secret"), clock.clone());
    let app = router(
        state(&tokens, users.clone(), Arc::new(DownSessions), clock),
        "/login-as",
    );

    let token = tokens.issue_default(&UserId::from("user-1")).unwrap();
    let response = send(&app, "GET", &format!("/login-as/{token}/")).await;

    assert_login_prompt(&response);
    assert_eq!(users.reads(), 1);
    assert_eq!(
        users.snapshot(&UserId::from("user-1")).unwrap().last_login,
        Some(PRIOR_LOGIN)
    );
}

#[tokio::test]
async fn test_failed_last_login_restore_ends_the_session() {
    let clock = Arc::new(FixedClock::new(NOW));
    let inner = seeded_users();
    // The backend's own stamp is write 1; the restore that follows is write 2.
    let users = Arc::new(FlakyUsers {
        fail_write: Some(2),
        ..FlakyUsers::new(inner.clone())
    });
    let sessions = Arc::new(MemorySessionBackend::new(users.clone(), clock.clone()));
    let tokens = TokenGenerator::with_clock(SigningKeys::new("test-secret"), clock.clone());
    let app = router(state(&tokens, users, sessions.clone(), clock), "/login-as");

    let token = tokens.issue_default(&UserId::from("user-1")).unwrap();
    let response = send(&app, "GET", &format!("/login-as/{token}/")).await;

    assert_login_prompt(&response);
    assert_eq!(sessions.session_count(), 0);
    assert_eq!(
        inner.snapshot(&UserId::from("user-1")).unwrap().last_login,
        Some(PRIOR_LOGIN)
    );
}

#[tokio::test]
async fn test_unrepresentable_cookie_ends_the_session() {
    let clock = Arc::new(FixedClock::new(NOW));
    let users = seeded_users();
    let sessions = Arc::new(MemorySessionBackend::new(users.clone(), clock.clone()));
    let tokens = TokenGenerator::with_clock(SigningKeys::new("test-secret"), clock.clone());
    let mut state = state(&tokens, users.clone(), sessions.clone(), clock);
    state.cookie.domain = Some("example.com\n".to_string());
    let app = router(state, "/login-as");

    let token = tokens.issue_default(&UserId::from("user-1")).unwrap();
    let response = send(&app, "GET", &format!("/login-as/{token}/")).await;

    assert_login_prompt(&response);
    assert_eq!(sessions.session_count(), 0);
    assert_eq!(
        users.snapshot(&UserId::from("user-1")).unwrap().last_login,
        Some(PRIOR_LOGIN)
    );
}
