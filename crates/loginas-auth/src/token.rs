//! Login-as tokens.
//!
//! A token is `<timeout>-<envelope>`: the validity window in base-36,
//! then a signed envelope over `[user_id, timeout]`. Redemption uses the
//! visible timeout as the envelope's maximum age and then requires it to
//! equal the sealed one, so rewriting the prefix cannot extend a token.

use std::sync::Arc;

use loginas_api::UserId;

use crate::clock::{Clock, SystemClock};
use crate::encoding::{from_base36, to_base36};
use crate::signer::{SigningKeys, TimestampSigner};
use crate::{Error, Result};

/// Salt scoping signatures to this token family.
pub const KEY_SALT: &str = "loginas.tokens";

/// Separator between the timeout field and the envelope.
pub const TIMEOUT_SEP: char = '-';

/// Validity window used when the caller gives none.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Issues and redeems login-as tokens.
///
/// Holds only immutable configuration, so one instance can be shared
/// across threads.
#[derive(Clone)]
pub struct TokenGenerator {
    signer: TimestampSigner,
    clock: Arc<dyn Clock>,
    default_timeout: u64,
}

impl std::fmt::Debug for TokenGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGenerator")
            .field("signer", &self.signer)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl TokenGenerator {
    /// Generator reading the system clock.
    pub fn new(keys: SigningKeys) -> Self {
        Self::with_clock(keys, Arc::new(SystemClock))
    }

    /// Generator reading `clock`.
    pub fn with_clock(keys: SigningKeys, clock: Arc<dyn Clock>) -> Self {
        Self {
            signer: TimestampSigner::new(keys, KEY_SALT),
            clock,
            default_timeout: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    /// Override the timeout used by [`TokenGenerator::issue_default`].
    #[must_use]
    pub fn with_default_timeout(mut self, seconds: u64) -> Self {
        self.default_timeout = seconds;
        self
    }

    pub fn default_timeout(&self) -> u64 {
        self.default_timeout
    }

    /// Issue a token for `user_id` valid for `timeout` seconds.
    pub fn issue(&self, user_id: &UserId, timeout: u64) -> Result<String> {
        let envelope = self.signer.sign_object(&(user_id, timeout), self.clock.now())?;
        Ok(format!("{}{TIMEOUT_SEP}{envelope}", to_base36(timeout)))
    }

    /// Issue a token with the default timeout.
    pub fn issue_default(&self, user_id: &UserId) -> Result<String> {
        self.issue(user_id, self.default_timeout)
    }

    /// Validate `token`, returning the user it was issued for.
    ///
    /// The error says why the token was rejected. It is meant for logs and
    /// tests; callers facing end users should use [`TokenGenerator::redeem`].
    pub fn check(&self, token: &str) -> Result<UserId> {
        if token.is_empty() {
            return Err(Error::Malformed("empty token".to_string()));
        }
        let (prefix, envelope) = token
            .split_once(TIMEOUT_SEP)
            .ok_or_else(|| Error::Malformed("missing timeout separator".to_string()))?;
        let claimed = from_base36(prefix)
            .ok_or_else(|| Error::Malformed("timeout is not canonical base-36".to_string()))?;

        let (user_id, sealed): (UserId, u64) =
            self.signer.unsign_object(envelope, self.clock.now(), claimed)?;

        if sealed != claimed {
            return Err(Error::TimeoutMismatch { claimed, sealed });
        }
        Ok(user_id)
    }

    /// Validate `token`. Every kind of rejection yields `None`.
    pub fn redeem(&self, token: &str) -> Option<UserId> {
        self.check(token).ok()
    }
}
