//! Error types.

use thiserror::Error;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// Token rejections are kept distinct so callers can log them, but they
/// must all be reported to end users the same way.
#[derive(Debug, Error)]
pub enum Error {
    /// Token or envelope is structurally unparseable.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// No configured secret produced a matching signature.
    #[error("signature mismatch")]
    BadSignature,

    /// Envelope is older than the permitted age.
    #[error("token expired: age {age}s exceeds {max_age}s")]
    Expired {
        /// Seconds since issuance.
        age: i64,
        /// Maximum accepted age.
        max_age: u64,
    },

    /// Visible timeout prefix disagrees with the signed timeout.
    #[error("timeout mismatch: claimed {claimed}, sealed {sealed}")]
    TimeoutMismatch {
        /// Timeout read from the unsigned prefix.
        claimed: u64,
        /// Timeout sealed inside the envelope.
        sealed: u64,
    },

    /// Cookie options are inconsistent.
    #[error("cookie error: {0}")]
    Cookie(String),

    /// JSON encoding error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Short machine-friendly label, suitable as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Malformed(_) => "malformed",
            Error::BadSignature => "bad_signature",
            Error::Expired { .. } => "expired",
            Error::TimeoutMismatch { .. } => "timeout_mismatch",
            Error::Cookie(_) => "cookie",
            Error::Json(_) => "json",
        }
    }
}
