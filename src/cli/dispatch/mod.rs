//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action to run, currently always the API
//! server with its full configuration.

use crate::api::Owner;
use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{auth, cache, email};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;
    let cache_opts = cache::Options::parse(matches);
    let email_opts = email::Options::parse(matches)?;

    let owner = auth_opts.owner_email.map(|email| Owner {
        full_name: auth_opts.owner_name,
        email,
    });

    Ok(Action::Server(Args {
        port,
        dsn,
        redis_url: cache_opts.redis_url,
        api_base_url: auth_opts.api_base_url,
        redirect_admin_url: auth_opts.redirect_admin_url,
        redirect_member_url: auth_opts.redirect_member_url,
        cookie_name: auth_opts.cookie_name,
        cookie_secure: auth_opts.cookie_secure,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        magic_link_ttl_seconds: auth_opts.magic_link_ttl_seconds,
        user_cache_ttl_seconds: auth_opts.user_cache_ttl_seconds,
        owner,
        email_api: email_opts.api,
    }))
}
