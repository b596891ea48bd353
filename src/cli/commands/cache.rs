use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_REDIS_URL: &str = "redis-url";

#[derive(Debug, Clone)]
pub struct Options {
    /// `None` selects the in-process cache.
    pub redis_url: Option<SecretString>,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            redis_url: matches
                .get_one::<String>(ARG_REDIS_URL)
                .filter(|v| !v.trim().is_empty())
                .map(|v| SecretString::from(v.clone())),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_REDIS_URL)
            .long(ARG_REDIS_URL)
            .help("Redis URL for sessions and magic links (in-memory cache when unset)")
            .long_help(
                "Redis URL (redis:// or rediss://) holding sessions, magic links and cached profiles.\n\nWhen unset, an in-process cache is used: sessions are lost on restart and not shared between instances.",
            )
            .env("BOOKWISE_REDIS_URL")
            .hide_env_values(true),
    )
}
