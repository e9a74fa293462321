use anyhow::Context;
use loginas_api::{UserId, UserStore};
use loginas_auth::TokenGenerator;
use loginas_core::UrlSettings;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct LoginLink {
    pub url: String,
    pub user_id: UserId,
    pub timeout: u64,
}

/// Issue a token for `username` and turn it into a redemption URL.
pub fn build_login_link(
    users: &dyn UserStore,
    tokens: &TokenGenerator,
    urls: &UrlSettings,
    username: &str,
    timeout: Option<u64>,
) -> anyhow::Result<LoginLink> {
    let user = users
        .find_by_username(username)?
        .with_context(|| format!("no user named {username}"))?;
    let timeout = timeout.unwrap_or_else(|| tokens.default_timeout());
    let token = tokens.issue(&user.id, timeout)?;

    tracing::info!(user_id = %user.id, timeout, "issued login-as token");
    Ok(LoginLink {
        url: urls.login_url(&token),
        user_id: user.id,
        timeout,
    })
}
