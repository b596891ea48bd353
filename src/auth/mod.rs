//! Passwordless authentication and sessions.
//!
//! Flow overview:
//!
//! 1. `sign_in` looks the user up by email (scoped to the roles of the calling
//!    endpoint), stores a one-time code under `magic-link:{code}` and queues the
//!    email carrying the link.
//! 2. `verify_magic_link` consumes the code atomically and opens a session.
//! 3. The session token travels in an `HttpOnly` cookie; the middleware resolves
//!    it on every request and checks the role permission table.

use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

mod config;
mod magic_link;
pub mod permissions;
mod session;
pub mod token;

pub use config::AuthConfig;
pub use magic_link::{AuthService, SIGN_IN_TEMPLATE};
pub use permissions::{Permission, Role, check_permission};
pub use session::{Session, SessionService};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user not found")]
    UserNotFound,
    #[error("user is blocked")]
    UserBlocked,
    #[error("magic link not found or expired")]
    MagicLinkNotFound,
    #[error("session not found")]
    SessionNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Seconds since the Unix epoch.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|elapsed| i64::try_from(elapsed.as_secs()).ok())
        .unwrap_or(0)
}
