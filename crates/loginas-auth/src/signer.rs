//! Keyed, timestamped signing of serializable values.
//!
//! A signed value has the shape `<payload>:<timestamp>:<signature>`:
//!
//! - `payload` is compact JSON, URL-safe base64 without padding
//! - `timestamp` is the signing instant in Unix seconds, base-62
//! - `signature` is HMAC-SHA256 over `<payload>:<timestamp>`, URL-safe base64
//!
//! The HMAC key is `SHA256(salt || "signer" || secret)`, so values signed for
//! one salt never verify under another, even with the same secret.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use loginas_api::UnixSeconds;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::encoding::{from_base62, to_base62};
use crate::{Error, Result};

/// Separator between envelope sections.
pub const SEP: char = ':';

/// Signing secret. Its `Debug` output never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Current signing secret plus prior secrets still accepted for
/// verification, newest first.
#[derive(Debug, Clone)]
pub struct SigningKeys {
    current: Secret,
    fallbacks: Vec<Secret>,
}

impl SigningKeys {
    /// Keys with no fallbacks.
    pub fn new(current: impl Into<Secret>) -> Self {
        Self {
            current: current.into(),
            fallbacks: Vec::new(),
        }
    }

    /// Replace the fallback list.
    #[must_use]
    pub fn with_fallbacks<I, S>(mut self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Secret>,
    {
        self.fallbacks = fallbacks.into_iter().map(Into::into).collect();
        self
    }

    /// The secret new signatures are made with.
    pub fn current(&self) -> &Secret {
        &self.current
    }

    /// All secrets in verification order.
    pub fn iter(&self) -> impl Iterator<Item = &Secret> {
        std::iter::once(&self.current).chain(self.fallbacks.iter())
    }
}

/// Signs and verifies timestamped envelopes under a fixed salt.
#[derive(Debug, Clone)]
pub struct TimestampSigner {
    keys: SigningKeys,
    salt: String,
}

impl TimestampSigner {
    /// Signer scoped to `salt`.
    pub fn new(keys: SigningKeys, salt: impl Into<String>) -> Self {
        Self {
            keys,
            salt: salt.into(),
        }
    }

    /// Serialize `value` and seal it with the issuance time `now`.
    pub fn sign_object<T: Serialize>(&self, value: &T, now: UnixSeconds) -> Result<String> {
        let json = serde_json::to_vec(value)?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let ts = u64::try_from(now)
            .map_err(|_| Error::Malformed(format!("timestamp before epoch: {now}")))?;
        let value = format!("{payload}{SEP}{}", to_base62(ts));
        let signature = self.signature(self.keys.current(), &value)?;
        Ok(format!("{value}{SEP}{signature}"))
    }

    /// Verify the signature and age of `signed`, then decode its payload.
    ///
    /// Secrets are tried in order; the first match wins.
    pub fn unsign_object<T: DeserializeOwned>(
        &self,
        signed: &str,
        now: UnixSeconds,
        max_age: u64,
    ) -> Result<T> {
        let (value, signature) = signed
            .rsplit_once(SEP)
            .ok_or_else(|| Error::Malformed("missing signature".to_string()))?;

        let mut matched = false;
        for secret in self.keys.iter() {
            let expected = self.signature(secret, value)?;
            if bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
                matched = true;
                break;
            }
        }
        if !matched {
            return Err(Error::BadSignature);
        }

        let (payload, ts) = value
            .rsplit_once(SEP)
            .ok_or_else(|| Error::Malformed("missing timestamp".to_string()))?;
        let issued_at = from_base62(ts)
            .and_then(|t| i64::try_from(t).ok())
            .ok_or_else(|| Error::Malformed(format!("bad timestamp: {ts}")))?;

        let age = now.saturating_sub(issued_at);
        if age > i64::try_from(max_age).unwrap_or(i64::MAX) {
            return Err(Error::Expired { age, max_age });
        }

        if payload.starts_with('.') {
            return Err(Error::Malformed("compressed payloads are not supported".to_string()));
        }
        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| Error::Malformed(format!("payload encoding: {e}")))?;
        serde_json::from_slice(&json).map_err(|e| Error::Malformed(format!("payload: {e}")))
    }

    fn signature(&self, secret: &Secret, value: &str) -> Result<String> {
        let key = Sha256::new()
            .chain_update(self.salt.as_bytes())
            .chain_update(b"signer")
            .chain_update(secret.expose())
            .finalize();
        let mut mac = Hmac::<Sha256>::new_from_slice(&key)
            .map_err(|e| Error::Malformed(format!("hmac key: {e}")))?;
        mac.update(value.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }
}
