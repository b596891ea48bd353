use anyhow::{Result, bail};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_EMAIL_API_URL: &str = "email-api-url";
pub const ARG_EMAIL_API_KEY: &str = "email-api-key";
pub const ARG_EMAIL_SENDER: &str = "email-sender";

/// Transactional email API settings; absent means emails are only logged.
#[derive(Debug, Clone)]
pub struct Options {
    pub api: Option<EmailApi>,
}

#[derive(Debug, Clone)]
pub struct EmailApi {
    pub url: String,
    pub key: SecretString,
    pub sender: String,
}

impl Options {
    /// Parse email arguments from matches.
    ///
    /// # Errors
    /// Returns an error if an API URL is given without an API key.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let Some(url) = get_non_empty(ARG_EMAIL_API_URL) else {
            return Ok(Self { api: None });
        };
        let Some(key) = get_non_empty(ARG_EMAIL_API_KEY) else {
            bail!("missing required argument: --{ARG_EMAIL_API_KEY} (required with --{ARG_EMAIL_API_URL})");
        };
        let sender = get_non_empty(ARG_EMAIL_SENDER).unwrap_or_default();

        Ok(Self {
            api: Some(EmailApi {
                url,
                key: SecretString::from(key),
                sender,
            }),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_EMAIL_API_URL)
                .long(ARG_EMAIL_API_URL)
                .help("Transactional email API endpoint (emails are only logged when unset)")
                .env("BOOKWISE_EMAIL_API_URL"),
        )
        .arg(
            Arg::new(ARG_EMAIL_API_KEY)
                .long(ARG_EMAIL_API_KEY)
                .help("Bearer key for the email API")
                .env("BOOKWISE_EMAIL_API_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_EMAIL_SENDER)
                .long(ARG_EMAIL_SENDER)
                .help("From address of outgoing email")
                .env("BOOKWISE_EMAIL_SENDER")
                .default_value("no-reply@bookwise.dev"),
        )
}
