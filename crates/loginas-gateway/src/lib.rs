//! loginas-gateway
//!
//! HTTP endpoint that redeems login-as tokens. A valid token for an existing
//! user yields a session cookie and a redirect to the success page; anything
//! else yields a redirect to the login page, with no hint of what went wrong.
//! Only GET is served, and every response forbids caching.

#![forbid(unsafe_code)]

use std::sync::Arc;

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Router, middleware};
use loginas_api::{LoginAsError, SessionBackend, UserId, UserRecord, UserStore};
use loginas_auth::{Clock, SessionCookie, TokenGenerator, http_date};
use loginas_core::{Redirects, Settings};

/// Cache directives sent with every response.
pub const NEVER_CACHE: &str = "max-age=0, no-cache, no-store, must-revalidate, private";

/// Shared state for the redemption route.
#[derive(Clone)]
pub struct GatewayState {
    pub tokens: Arc<TokenGenerator>,
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionBackend>,
    pub clock: Arc<dyn Clock>,
    pub redirects: Redirects,
    pub cookie: SessionCookie,
}

impl GatewayState {
    pub fn from_settings(
        settings: &Settings,
        tokens: TokenGenerator,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tokens: Arc::new(tokens),
            users,
            sessions,
            clock,
            redirects: settings.redirects.clone(),
            cookie: settings.session.clone(),
        }
    }
}

/// Why a redemption failed. Logged, never sent to the client.
#[derive(Debug)]
enum Rejection {
    Path(PathRejection),
    Token(loginas_auth::Error),
    UnknownUser(UserId),
    Backend(LoginAsError),
    Cookie(loginas_auth::Error),
}

/// Router serving `{route_prefix}/{token}/`.
pub fn router(state: GatewayState, route_prefix: &str) -> Router {
    let path = format!("{}/{{token}}/", route_prefix.trim_end_matches('/'));
    Router::new()
        .route(&path, any(login_as))
        .layer(middleware::map_response(never_cache))
        .with_state(state)
}

/// Serve `app` on `bind` until Ctrl-C.
pub async fn serve(bind: &str, app: Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "login-as gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to listen for shutdown signal: {e}");
            }
        })
        .await
}

async fn never_cache(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NEVER_CACHE));
    if let Ok(expires) = HeaderValue::from_str(&http_date(0)) {
        headers.insert(header::EXPIRES, expires);
    }
    response
}

async fn login_as(
    State(state): State<GatewayState>,
    method: Method,
    token: Result<Path<String>, PathRejection>,
) -> Response {
    if method != Method::GET {
        return (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "GET")]).into_response();
    }

    let outcome = token
        .map_err(Rejection::Path)
        .and_then(|Path(token)| redeem(&state, &token));

    match outcome {
        Ok(set_cookie) => found(&state.redirects.success, Some(set_cookie)),
        Err(rejection) => {
            match &rejection {
                Rejection::Backend(e) => tracing::warn!("login-as redemption failed: {e}"),
                Rejection::Cookie(e) => tracing::warn!("login-as session cookie refused: {e}"),
                Rejection::Token(e) => {
                    tracing::debug!(reason = e.kind(), "login-as token rejected");
                }
                other => tracing::debug!(?other, "login-as redemption refused"),
            }
            found(&failure_url(&state.redirects.failure), None)
        }
    }
}

fn redeem(state: &GatewayState, token: &str) -> Result<HeaderValue, Rejection> {
    let user_id = state.tokens.check(token).map_err(Rejection::Token)?;

    let user = state
        .users
        .find_by_id(&user_id)
        .map_err(Rejection::Backend)?
        .ok_or(Rejection::UnknownUser(user_id))?;

    let session_id = state.sessions.login(&user).map_err(Rejection::Backend)?;
    let set_cookie = complete_login(state, &user, &session_id)
        .inspect_err(|_| abandon_login(state, &user, &session_id))?;

    tracing::info!(user_id = %user.id, "login-as token redeemed");
    Ok(set_cookie)
}

/// Put back the user's own `last_login` and build the session cookie.
fn complete_login(
    state: &GatewayState,
    user: &UserRecord,
    session_id: &str,
) -> Result<HeaderValue, Rejection> {
    state
        .users
        .set_last_login(&user.id, user.last_login)
        .map_err(Rejection::Backend)?;
    let cookie = state
        .cookie
        .set_header(session_id, state.clock.now())
        .map_err(Rejection::Cookie)?;
    HeaderValue::from_str(&cookie)
        .map_err(|e| Rejection::Cookie(loginas_auth::Error::Cookie(e.to_string())))
}

/// Undo a login whose redemption failed after the session was created.
fn abandon_login(state: &GatewayState, user: &UserRecord, session_id: &str) {
    if let Err(e) = state.sessions.logout(session_id) {
        tracing::error!(user_id = %user.id, "failed to end abandoned session: {e}");
    }
    if let Err(e) = state.users.set_last_login(&user.id, user.last_login) {
        tracing::error!(user_id = %user.id, "failed to restore last login: {e}");
    }
}

fn failure_url(login_url: &str) -> String {
    let sep = if login_url.contains('?') { '&' } else { '?' };
    format!("{login_url}{sep}next=")
}

fn found(location: &str, set_cookie: Option<HeaderValue>) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    let headers = response.headers_mut();
    match HeaderValue::from_str(location) {
        Ok(v) => {
            headers.insert(header::LOCATION, v);
        }
        Err(e) => {
            tracing::error!("redirect target is not a valid header value: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }
    if let Some(cookie) = set_cookie {
        headers.insert(header::SET_COOKIE, cookie);
    }
    response
}
