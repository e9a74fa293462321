use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use loginas_api::{LoginAsError, SecretStore, UserRecord};
use loginas_auth::{
    Clock, DEFAULT_TIMEOUT_SECONDS, Secret, SessionCookie, SigningKeys, TokenGenerator,
    is_cookie_name,
};
use serde::Deserialize;

use crate::logging::LogFormat;

pub const CONFIG_FILE_NAME: &str = "loginas.toml";

const DEFAULT_CONFIG: &str = include_str!("../../../docs/loginas.toml.example");

#[derive(Debug, Clone)]
pub struct SigningSettings {
    pub secret_ref: String,
    pub fallback_secret_refs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Redirects {
    pub success: String,
    pub failure: String,
}

#[derive(Debug, Clone, Default)]
pub struct UrlSettings {
    pub base_url: Option<String>,
    pub cms_base_url: Option<String>,
    pub site_domain: Option<String>,
    pub route_prefix: String,
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub signing: SigningSettings,
    pub default_timeout: u64,
    pub redirects: Redirects,
    pub urls: UrlSettings,
    pub bind: String,
    pub session: SessionCookie,
    pub log: LogSettings,
    pub users: Vec<UserRecord>,
}

impl Settings {
    /// Resolve the current and fallback secrets through `secrets`.
    pub fn signing_keys(&self, secrets: &dyn SecretStore) -> Result<SigningKeys, LoginAsError> {
        let current = resolve_secret(secrets, &self.signing.secret_ref)?;
        let fallbacks = self
            .signing
            .fallback_secret_refs
            .iter()
            .map(|r| resolve_secret(secrets, r))
            .collect::<Result<Vec<Secret>, _>>()?;
        Ok(SigningKeys::new(current).with_fallbacks(fallbacks))
    }

    pub fn token_generator(
        &self,
        secrets: &dyn SecretStore,
        clock: Arc<dyn Clock>,
    ) -> Result<TokenGenerator, LoginAsError> {
        let keys = self.signing_keys(secrets)?;
        Ok(TokenGenerator::with_clock(keys, clock).with_default_timeout(self.default_timeout))
    }
}

/// A secret that cannot be found is a configuration error like an empty one.
fn resolve_secret(secrets: &dyn SecretStore, secret_ref: &str) -> Result<Secret, LoginAsError> {
    let value = secrets.get(secret_ref).map_err(|e| match e {
        LoginAsError::NotFound(msg) => {
            LoginAsError::Config(format!("secret {secret_ref} is not set: {msg}"))
        }
        other => other,
    })?;
    if value.is_empty() {
        return Err(LoginAsError::Config(format!("secret {secret_ref} is empty")));
    }
    Ok(Secret::new(value))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    signing: Option<RawSigning>,
    #[serde(default)]
    tokens: RawTokens,
    #[serde(default)]
    redirects: RawRedirects,
    #[serde(default)]
    urls: RawUrls,
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    session: RawSession,
    #[serde(default)]
    log: RawLog,
    #[serde(default)]
    users: Vec<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawSigning {
    secret_ref: String,
    #[serde(default)]
    fallback_secret_refs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawTokens {
    #[serde(default = "default_timeout")]
    default_timeout: u64,
}

impl Default for RawTokens {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

#[derive(Debug, Deserialize)]
struct RawRedirects {
    #[serde(default = "default_success")]
    success: String,
    #[serde(default = "default_failure")]
    failure: String,
}

impl Default for RawRedirects {
    fn default() -> Self {
        Self {
            success: default_success(),
            failure: default_failure(),
        }
    }
}

fn default_success() -> String {
    "/".to_string()
}

fn default_failure() -> String {
    "/login/".to_string()
}

#[derive(Debug, Deserialize)]
struct RawUrls {
    base_url: Option<String>,
    cms_base_url: Option<String>,
    site_domain: Option<String>,
    #[serde(default = "default_route_prefix")]
    route_prefix: String,
}

impl Default for RawUrls {
    fn default() -> Self {
        Self {
            base_url: None,
            cms_base_url: None,
            site_domain: None,
            route_prefix: default_route_prefix(),
        }
    }
}

fn default_route_prefix() -> String {
    "/login-as".to_string()
}

#[derive(Debug, Deserialize)]
struct RawServer {
    #[serde(default = "default_bind")]
    bind: String,
}

impl Default for RawServer {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Default, Deserialize)]
struct RawSession {
    cookie_name: Option<String>,
    secure: Option<bool>,
    max_age_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawLog {
    #[serde(default = "default_level")]
    level: String,
    #[serde(default)]
    format: LogFormat,
}

impl Default for RawLog {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: loginas_api::UserId,
    username: String,
    last_login: Option<i64>,
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("loginas"))
        .unwrap_or_else(|| PathBuf::from(".loginas"))
        .join(CONFIG_FILE_NAME)
}

pub fn load_settings_from_file(path: &Path) -> Result<Settings, LoginAsError> {
    let content = fs::read_to_string(path)
        .map_err(|e| LoginAsError::NotFound(format!("failed to read {}: {e}", path.display())))?;
    parse_settings(&content).map_err(|e| match e {
        LoginAsError::Config(msg) => LoginAsError::Config(format!("{}: {msg}", path.display())),
        other => other,
    })
}

pub fn parse_settings(content: &str) -> Result<Settings, LoginAsError> {
    let raw: RawSettings =
        toml::from_str(content).map_err(|e| LoginAsError::Config(format!("invalid TOML: {e}")))?;

    let signing = raw
        .signing
        .ok_or_else(|| LoginAsError::Config("missing [signing] section".to_string()))?;
    if signing.secret_ref.trim().is_empty() {
        return Err(LoginAsError::Config(
            "signing.secret_ref must not be empty".to_string(),
        ));
    }

    let route_prefix = raw.urls.route_prefix.trim_end_matches('/').to_string();
    if !route_prefix.is_empty() && !route_prefix.starts_with('/') {
        return Err(LoginAsError::Config(format!(
            "urls.route_prefix must start with '/': {route_prefix}"
        )));
    }
    if route_prefix.contains(['{', '}']) {
        return Err(LoginAsError::Config(format!(
            "urls.route_prefix must not contain braces: {route_prefix}"
        )));
    }

    let defaults = SessionCookie::default();
    let session = SessionCookie {
        name: raw.session.cookie_name.unwrap_or(defaults.name),
        secure: raw.session.secure.unwrap_or(defaults.secure),
        max_age_seconds: raw.session.max_age_seconds,
        ..defaults
    };
    if !is_cookie_name(&session.name) {
        return Err(LoginAsError::Config(format!(
            "session.cookie_name is not a valid cookie name: {:?}",
            session.name
        )));
    }

    let mut users: Vec<UserRecord> = Vec::with_capacity(raw.users.len());
    for u in raw.users {
        if users.iter().any(|x| x.id == u.id || x.username == u.username) {
            return Err(LoginAsError::Config(format!(
                "duplicate user {} ({})",
                u.username, u.id
            )));
        }
        users.push(UserRecord {
            id: u.id,
            username: u.username,
            last_login: u.last_login,
        });
    }

    Ok(Settings {
        signing: SigningSettings {
            secret_ref: signing.secret_ref,
            fallback_secret_refs: signing.fallback_secret_refs,
        },
        default_timeout: raw.tokens.default_timeout,
        redirects: Redirects {
            success: raw.redirects.success,
            failure: raw.redirects.failure,
        },
        urls: UrlSettings {
            base_url: raw.urls.base_url,
            cms_base_url: raw.urls.cms_base_url,
            site_domain: raw.urls.site_domain,
            route_prefix,
        },
        bind: raw.server.bind,
        session,
        log: LogSettings {
            level: raw.log.level,
            format: raw.log.format,
        },
        users,
    })
}

/// Write the default configuration to `path` unless a file already exists.
pub fn write_default_config(path: &Path, force: bool) -> Result<bool, LoginAsError> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| {
            LoginAsError::Internal(format!("failed to create {}: {e}", dir.display()))
        })?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| LoginAsError::Internal(format!("failed to write {}: {e}", path.display())))?;
    Ok(true)
}
