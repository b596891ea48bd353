//! # Bookwise (catalog API and session authority)
//!
//! `bookwise` serves the REST API behind the book catalog. Members and
//! administrators sign in without passwords: a one-time magic link is mailed to
//! the user and redeemed for a session cookie.
//!
//! ## Sessions
//!
//! A session lives in the cache under `session:{id}` and its id is tracked in
//! the per-user set `user_sessions:{user_id}`, so every session of a user can be
//! listed or revoked at once (sign-out everywhere, blocking, account deletion).
//! The cookie carries an opaque token that embeds the user and session ids;
//! decoding a token never proves anything, only a byte match against the stored
//! record does.
//!
//! ## Authorization
//!
//! Roles map to a static permission table. The owner holds every permission,
//! admins hold the catalog permissions and members hold none. Routes declare the
//! permission they need and the middleware denies by default.

pub mod api;
pub mod auth;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod queue;
pub mod users;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
