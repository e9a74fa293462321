//! loginas-auth
//!
//! Short-lived "login as" tokens: a trusted operator issues one for a user,
//! and whoever presents it within its validity window is logged in as that
//! user. Verification is stateless. A token carries its own timeout and a
//! signed, timestamped envelope, so nothing is stored server-side.
//!
//! - **Issuing and redeeming tokens** with [`TokenGenerator`]
//! - **Rotating secrets** through [`SigningKeys`] fallbacks
//! - **Substituting the clock** with [`FixedClock`] for tests
//! - **Building the session cookie** handed out on redemption
//!
//! ## Quick start
//! ```
//! use loginas_api::UserId;
//! use loginas_auth::{SigningKeys, TokenGenerator};
//!
//! let tokens = TokenGenerator::new(SigningKeys::new("s3cret").with_fallbacks(["old"]));
//! let token = tokens.issue_default(&UserId::Int(1)).unwrap();
//! assert_eq!(tokens.redeem(&token), Some(UserId::Int(1)));
//! assert_eq!(tokens.redeem("not-a-token"), None);
//! ```

#![forbid(unsafe_code)]

mod clock;
mod cookie;
mod encoding;
mod error;
mod signer;
mod token;

pub use clock::{Clock, FixedClock, SystemClock};
pub use cookie::{SameSite, SessionCookie, http_date, is_cookie_name};
pub use encoding::{from_base36, to_base36};
pub use error::{Error, Result};
pub use signer::{Secret, SigningKeys, TimestampSigner};
pub use token::{DEFAULT_TIMEOUT_SECONDS, KEY_SALT, TIMEOUT_SEP, TokenGenerator};
