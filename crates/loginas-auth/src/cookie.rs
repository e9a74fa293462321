//! Session cookie helpers.

use std::time::{Duration, UNIX_EPOCH};

use httpdate::fmt_http_date;
use loginas_api::UnixSeconds;

use crate::{Error, Result};

/// SameSite attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    /// SameSite=Strict
    Strict,
    /// SameSite=Lax
    #[default]
    Lax,
    /// SameSite=None
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// How the session established by a redeemed token is handed to the browser.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    /// Cookie name (without any prefix).
    pub name: String,

    /// Cookie path.
    pub path: String,

    /// Optional cookie domain.
    pub domain: Option<String>,

    /// Send on HTTPS only.
    pub secure: bool,

    /// SameSite attribute.
    pub same_site: SameSite,

    /// Max-Age in seconds. `None` makes a browser-session cookie.
    pub max_age_seconds: Option<u64>,
}

impl Default for SessionCookie {
    fn default() -> Self {
        Self {
            name: "loginas_session".to_string(),
            path: "/".to_string(),
            domain: None,
            secure: true,
            same_site: SameSite::Lax,
            max_age_seconds: None,
        }
    }
}

impl SessionCookie {
    /// Cookie name as sent. Secure host-only cookies on `/` get the
    /// `__Host-` prefix.
    pub fn full_name(&self) -> String {
        let bare = self.name.trim_start_matches("__Host-");
        if self.secure && self.domain.is_none() && self.path == "/" {
            format!("__Host-{bare}")
        } else {
            bare.to_string()
        }
    }

    /// `Set-Cookie` value carrying `session_id`. `now` anchors `Expires`.
    pub fn set_header(&self, session_id: &str, now: UnixSeconds) -> Result<String> {
        if !is_cookie_name(&self.name) {
            return Err(Error::Cookie(format!("invalid cookie name: {:?}", self.name)));
        }
        if session_id.is_empty()
            || !session_id
                .bytes()
                .all(|b| b.is_ascii_graphic() && !matches!(b, b';' | b',' | b'"' | b'\\'))
        {
            return Err(Error::Cookie("session id is not a valid cookie value".to_string()));
        }
        if self.same_site == SameSite::None && !self.secure {
            return Err(Error::Cookie("SameSite=None requires Secure".to_string()));
        }

        let mut parts = self.base_parts(session_id);
        if let Some(max_age) = self.max_age_seconds {
            parts.push(format!("Max-Age={max_age}"));
            let expires = now.saturating_add(i64::try_from(max_age).unwrap_or(i64::MAX));
            parts.push(format!("Expires={}", http_date(expires)));
        }
        Ok(parts.join("; "))
    }

    fn base_parts(&self, value: &str) -> Vec<String> {
        let mut parts = vec![
            format!("{}={value}", self.full_name()),
            format!("Path={}", self.path),
        ];
        if let Some(domain) = &self.domain {
            parts.push(format!("Domain={domain}"));
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        parts.push("HttpOnly".to_string());
        parts.push(format!("SameSite={}", self.same_site.as_str()));
        parts
    }
}

/// HTTP separators, which may not appear in a cookie name.
const SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={}";

/// Whether `name` is an RFC 6265 cookie name (an HTTP token).
pub fn is_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && !SEPARATORS.contains(&b))
}

/// Format Unix seconds as an HTTP date. Pre-epoch values clamp to the epoch.
pub fn http_date(unix: UnixSeconds) -> String {
    fmt_http_date(UNIX_EPOCH + Duration::from_secs(u64::try_from(unix).unwrap_or(0)))
}
