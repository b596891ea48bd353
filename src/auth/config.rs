//! Auth configuration shared by the session store, magic links and cookies.

use std::time::Duration;

const DEFAULT_SESSION_TTL_SECONDS: u64 = 12 * 60 * 60;
const DEFAULT_MAGIC_LINK_TTL_SECONDS: u64 = 15 * 60;
const DEFAULT_USER_CACHE_TTL_SECONDS: u64 = 10 * 60;
const DEFAULT_COOKIE_NAME: &str = "bookwise_session";
const DEFAULT_REDIRECT_ADMIN_URL: &str = "http://localhost:5173";
const DEFAULT_REDIRECT_MEMBER_URL: &str = "http://localhost:5174";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    api_base_url: String,
    redirect_admin_url: String,
    redirect_member_url: String,
    cookie_name: String,
    cookie_secure: bool,
    session_ttl_seconds: u64,
    magic_link_ttl_seconds: u64,
    user_cache_ttl_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(api_base_url: String) -> Self {
        let api_base_url = api_base_url.trim_end_matches('/').to_string();
        Self {
            cookie_secure: api_base_url.starts_with("https://"),
            api_base_url,
            redirect_admin_url: DEFAULT_REDIRECT_ADMIN_URL.to_string(),
            redirect_member_url: DEFAULT_REDIRECT_MEMBER_URL.to_string(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            magic_link_ttl_seconds: DEFAULT_MAGIC_LINK_TTL_SECONDS,
            user_cache_ttl_seconds: DEFAULT_USER_CACHE_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_redirect_admin_url(mut self, url: String) -> Self {
        self.redirect_admin_url = url;
        self
    }

    #[must_use]
    pub fn with_redirect_member_url(mut self, url: String) -> Self {
        self.redirect_member_url = url;
        self
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: String) -> Self {
        self.cookie_name = name;
        self
    }

    /// Force the `Secure` cookie attribute. It is already on for https API URLs.
    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = self.cookie_secure || secure;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_magic_link_ttl_seconds(mut self, seconds: u64) -> Self {
        self.magic_link_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_user_cache_ttl_seconds(mut self, seconds: u64) -> Self {
        self.user_cache_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    #[must_use]
    pub fn redirect_admin_url(&self) -> &str {
        &self.redirect_admin_url
    }

    #[must_use]
    pub fn redirect_member_url(&self) -> &str {
        &self.redirect_member_url
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn magic_link_ttl(&self) -> Duration {
        Duration::from_secs(self.magic_link_ttl_seconds)
    }

    #[must_use]
    pub fn user_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.user_cache_ttl_seconds)
    }

    /// Redirects accepted by `/v1/auth/link`.
    #[must_use]
    pub fn is_allowed_redirect(&self, redirect: &str) -> bool {
        redirect == self.redirect_admin_url || redirect == self.redirect_member_url
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.api_base_url(), "http://localhost:8080");
        assert_eq!(config.cookie_name(), "bookwise_session");
        assert!(!config.cookie_secure());
        assert_eq!(config.session_ttl(), Duration::from_secs(43_200));
        assert_eq!(config.magic_link_ttl(), Duration::from_secs(900));
        assert_eq!(config.user_cache_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn https_base_url_marks_cookie_secure() {
        let config = AuthConfig::new("https://api.bookwise.dev/".to_string());
        assert_eq!(config.api_base_url(), "https://api.bookwise.dev");
        assert!(config.cookie_secure());
        // An explicit `false` cannot downgrade an https deployment.
        assert!(config.with_cookie_secure(false).cookie_secure());
    }

    #[test]
    fn cookie_secure_can_be_forced() {
        let config = AuthConfig::default().with_cookie_secure(true);
        assert!(config.cookie_secure());
    }

    #[test]
    fn only_configured_redirects_are_allowed() {
        let config = AuthConfig::default()
            .with_redirect_admin_url("https://admin.bookwise.dev".to_string())
            .with_redirect_member_url("https://bookwise.dev".to_string());
        assert!(config.is_allowed_redirect("https://admin.bookwise.dev"));
        assert!(config.is_allowed_redirect("https://bookwise.dev"));
        assert!(!config.is_allowed_redirect("https://evil.example"));
        assert!(!config.is_allowed_redirect("https://bookwise.dev/../x"));
    }
}
