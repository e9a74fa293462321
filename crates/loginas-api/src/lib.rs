use std::fmt;

use serde::{Deserialize, Serialize};

pub type SessionId = String;

/// Unix timestamp in whole seconds.
pub type UnixSeconds = i64;

/// Identifies a user. Serialized as a bare JSON number or string so it
/// round-trips exactly through a signed payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Int(i64),
    Str(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Int(n) => write!(f, "{n}"),
            UserId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        UserId::Int(value)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId::Str(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        UserId::Str(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub last_login: Option<UnixSeconds>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoginAsError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("session error: {0}")]
    Session(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub trait SecretStore: Send + Sync {
    fn get(&self, secret_ref: &str) -> Result<String, LoginAsError>;
}

/// Backing store for user records.
///
/// Implementations own their concurrency control. `set_last_login` must
/// touch only the `last_login` field of the stored record.
pub trait UserStore: Send + Sync {
    fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, LoginAsError>;
    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, LoginAsError>;
    fn set_last_login(
        &self,
        id: &UserId,
        last_login: Option<UnixSeconds>,
    ) -> Result<(), LoginAsError>;
}

/// Establishes an authenticated session for a user.
///
/// A backend may record the login on the user (e.g. bump `last_login`);
/// callers that need to hide the login restore the field afterwards.
pub trait SessionBackend: Send + Sync {
    fn login(&self, user: &UserRecord) -> Result<SessionId, LoginAsError>;
    /// End `session_id`. Ending an unknown session is not an error.
    fn logout(&self, session_id: &str) -> Result<(), LoginAsError>;
}
