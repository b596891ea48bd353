use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use url::Url;

pub const ARG_API_BASE_URL: &str = "api-base-url";
pub const ARG_REDIRECT_ADMIN_URL: &str = "redirect-admin-url";
pub const ARG_REDIRECT_MEMBER_URL: &str = "redirect-member-url";
pub const ARG_COOKIE_NAME: &str = "cookie-name";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_MAGIC_LINK_TTL_SECONDS: &str = "magic-link-ttl-seconds";
pub const ARG_USER_CACHE_TTL_SECONDS: &str = "user-cache-ttl-seconds";
pub const ARG_OWNER_EMAIL: &str = "owner-email";
pub const ARG_OWNER_NAME: &str = "owner-name";

#[derive(Debug, Clone)]
pub struct Options {
    pub api_base_url: String,
    pub redirect_admin_url: String,
    pub redirect_member_url: String,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub session_ttl_seconds: u64,
    pub magic_link_ttl_seconds: u64,
    pub user_cache_ttl_seconds: u64,
    pub owner_email: Option<String>,
    pub owner_name: String,
}

fn url_arg(matches: &ArgMatches, id: &str) -> Result<String> {
    let value = matches
        .get_one::<String>(id)
        .cloned()
        .with_context(|| format!("missing required argument: --{id}"))?;
    Url::parse(&value).with_context(|| format!("invalid --{id}: {value}"))?;
    Ok(value)
}

impl Options {
    /// Parse authentication arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a URL argument is missing or malformed.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let u64_arg = |id: &str| matches.get_one::<u64>(id).copied().unwrap_or_default();

        Ok(Self {
            api_base_url: url_arg(matches, ARG_API_BASE_URL)?,
            redirect_admin_url: url_arg(matches, ARG_REDIRECT_ADMIN_URL)?,
            redirect_member_url: url_arg(matches, ARG_REDIRECT_MEMBER_URL)?,
            cookie_name: matches
                .get_one::<String>(ARG_COOKIE_NAME)
                .cloned()
                .unwrap_or_else(|| "bookwise_session".to_string()),
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
            session_ttl_seconds: u64_arg(ARG_SESSION_TTL_SECONDS),
            magic_link_ttl_seconds: u64_arg(ARG_MAGIC_LINK_TTL_SECONDS),
            user_cache_ttl_seconds: u64_arg(ARG_USER_CACHE_TTL_SECONDS),
            owner_email: matches
                .get_one::<String>(ARG_OWNER_EMAIL)
                .cloned()
                .filter(|v| !v.trim().is_empty()),
            owner_name: matches
                .get_one::<String>(ARG_OWNER_NAME)
                .cloned()
                .unwrap_or_default(),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_url_args(command);
    let command = with_session_args(command);
    with_owner_args(command)
}

fn with_url_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_API_BASE_URL)
                .long(ARG_API_BASE_URL)
                .help("Public base URL of this API, used to build magic links")
                .env("BOOKWISE_API_BASE_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_REDIRECT_ADMIN_URL)
                .long(ARG_REDIRECT_ADMIN_URL)
                .help("Admin frontend URL to land on after sign-in")
                .env("BOOKWISE_REDIRECT_ADMIN_URL")
                .default_value("http://localhost:5173"),
        )
        .arg(
            Arg::new(ARG_REDIRECT_MEMBER_URL)
                .long(ARG_REDIRECT_MEMBER_URL)
                .help("Member frontend URL to land on after sign-in")
                .env("BOOKWISE_REDIRECT_MEMBER_URL")
                .default_value("http://localhost:5174"),
        )
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_COOKIE_NAME)
                .long(ARG_COOKIE_NAME)
                .help("Name of the session cookie")
                .env("BOOKWISE_COOKIE_NAME")
                .default_value("bookwise_session"),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark the session cookie Secure (always on for an https API base URL)")
                .env("BOOKWISE_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session TTL in seconds")
                .env("BOOKWISE_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_MAGIC_LINK_TTL_SECONDS)
                .long(ARG_MAGIC_LINK_TTL_SECONDS)
                .help("Magic link TTL in seconds")
                .env("BOOKWISE_MAGIC_LINK_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_USER_CACHE_TTL_SECONDS)
                .long(ARG_USER_CACHE_TTL_SECONDS)
                .help("TTL in seconds of cached user profiles")
                .env("BOOKWISE_USER_CACHE_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

fn with_owner_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OWNER_EMAIL)
                .long(ARG_OWNER_EMAIL)
                .help("Email of the owner account created at startup if missing")
                .env("BOOKWISE_OWNER_EMAIL"),
        )
        .arg(
            Arg::new(ARG_OWNER_NAME)
                .long(ARG_OWNER_NAME)
                .help("Full name of the bootstrap owner")
                .env("BOOKWISE_OWNER_NAME")
                .default_value("Bookwise Owner"),
        )
}
