use crate::api::{
    self, Owner,
    email::{EmailSender, HttpEmailSender, LogEmailSender},
};
use crate::auth::AuthConfig;
use crate::cli::{commands::email::EmailApi, telemetry};
use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub redis_url: Option<SecretString>,
    pub api_base_url: String,
    pub redirect_admin_url: String,
    pub redirect_member_url: String,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub session_ttl_seconds: u64,
    pub magic_link_ttl_seconds: u64,
    pub user_cache_ttl_seconds: u64,
    pub owner: Option<Owner>,
    pub email_api: Option<EmailApi>,
}

impl Args {
    #[must_use]
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.api_base_url.clone())
            .with_redirect_admin_url(self.redirect_admin_url.clone())
            .with_redirect_member_url(self.redirect_member_url.clone())
            .with_cookie_name(self.cookie_name.clone())
            .with_cookie_secure(self.cookie_secure)
            .with_session_ttl_seconds(self.session_ttl_seconds)
            .with_magic_link_ttl_seconds(self.magic_link_ttl_seconds)
            .with_user_cache_ttl_seconds(self.user_cache_ttl_seconds)
    }

    /// # Errors
    /// Returns an error if the HTTP email client cannot be built.
    pub fn email_sender(&self) -> Result<Arc<dyn EmailSender>> {
        match &self.email_api {
            Some(api) => {
                info!(url = %api.url, "sending email through the configured API");
                Ok(Arc::new(HttpEmailSender::new(
                    api.url.clone(),
                    api.key.clone(),
                    api.sender.clone(),
                )?))
            }
            None => {
                info!("no email API configured, emails are logged only");
                Ok(Arc::new(LogEmailSender))
            }
        }
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if a dependency cannot be reached or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let auth_config = args.auth_config();
    let email_sender = args.email_sender()?;

    let result = api::new(
        args.port,
        args.dsn,
        args.redis_url,
        auth_config,
        args.owner,
        email_sender,
    )
    .await;

    telemetry::shutdown_tracer();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            port: 8080,
            dsn: "postgres://localhost/bookwise".to_string(),
            redis_url: Some(SecretString::from("redis://:hunter2@cache:6379")),
            api_base_url: "https://api.bookwise.dev".to_string(),
            redirect_admin_url: "https://admin.bookwise.dev".to_string(),
            redirect_member_url: "https://bookwise.dev".to_string(),
            cookie_name: "sid".to_string(),
            cookie_secure: false,
            session_ttl_seconds: 60,
            magic_link_ttl_seconds: 30,
            user_cache_ttl_seconds: 10,
            owner: None,
            email_api: Some(EmailApi {
                url: "https://mail.example/send".to_string(),
                key: SecretString::from("key-123"),
                sender: "no-reply@bookwise.dev".to_string(),
            }),
        }
    }

    #[test]
    fn auth_config_from_args() {
        let config = args().auth_config();
        assert_eq!(config.api_base_url(), "https://api.bookwise.dev");
        assert_eq!(config.cookie_name(), "sid");
        // https base URL forces Secure even without the flag.
        assert!(config.cookie_secure());
        assert_eq!(config.session_ttl_seconds(), 60);
        assert!(config.is_allowed_redirect("https://admin.bookwise.dev"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let output = format!("{:?}", args());
        assert!(!output.contains("hunter2"));
        assert!(!output.contains("key-123"));
    }

    #[test]
    fn email_sender_builds() -> Result<()> {
        let mut args = args();
        args.email_sender()?;
        args.email_api = None;
        args.email_sender()?;
        Ok(())
    }
}
