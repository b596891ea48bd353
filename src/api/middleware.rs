//! Session cookie handling and the authentication/permission middleware.
//!
//! `require_session` resolves the cookie into a session and stores it in the
//! request extensions as [`AuthenticatedSession`]; `require_permission` runs
//! after it and checks the role table. Routes that declare neither are public.

use super::response::ApiError;
use crate::auth::{AuthConfig, AuthError, Permission, Session, SessionService, check_permission};
use axum::{
    extract::{Extension, FromRequestParts, Request, State},
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, InvalidHeaderValue, SET_COOKIE},
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

/// The session behind the current request, set by [`require_session`].
///
/// Extracting it on a route without the middleware rejects with 401, so a
/// wiring mistake denies access instead of granting it.
#[derive(Clone, Debug)]
pub struct AuthenticatedSession(pub Session);

impl<S> FromRequestParts<S> for AuthenticatedSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(ApiError::unauthorized)
    }
}

/// `HttpOnly` session cookie carrying `token`.
pub(crate) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let name = config.cookie_name();
    let max_age = config.session_ttl_seconds();
    let mut cookie = format!("{name}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let name = config.cookie_name();
    let mut cookie = format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Value of the session cookie, `None` when missing or empty.
pub(crate) fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == cookie_name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn access_denied(config: &AuthConfig) -> Response {
    let mut response = ApiError::unauthorized().into_response();
    if let Ok(cookie) = clear_session_cookie(config) {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    response
}

pub async fn require_session(
    Extension(config): Extension<Arc<AuthConfig>>,
    Extension(sessions): Extension<Arc<SessionService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = session_token(request.headers(), config.cookie_name()) else {
        return access_denied(&config);
    };

    match sessions.get_session_by_token(&token).await {
        Ok(session) => {
            request
                .extensions_mut()
                .insert(AuthenticatedSession(session));
            next.run(request).await
        }
        Err(AuthError::SessionNotFound) => access_denied(&config),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn require_permission(
    State(permission): State<Permission>,
    request: Request,
    next: Next,
) -> Response {
    let Some(role) = request
        .extensions()
        .get::<AuthenticatedSession>()
        .map(|AuthenticatedSession(session)| session.role)
    else {
        return ApiError::unauthorized().into_response();
    };

    if !check_permission(role, permission) {
        debug!(%role, %permission, "permission denied");
        return ApiError::forbidden().into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(cookie) {
            headers.insert(COOKIE, value);
        }
        headers
    }

    #[test]
    fn session_cookie_attributes() -> anyhow::Result<()> {
        let config = AuthConfig::default().with_session_ttl_seconds(3600);
        let cookie = session_cookie(&config, "tok")?;
        assert_eq!(
            cookie.to_str()?,
            "bookwise_session=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600"
        );

        let secure = AuthConfig::new("https://api.bookwise.dev".to_string());
        assert!(session_cookie(&secure, "tok")?.to_str()?.ends_with("; Secure"));
        Ok(())
    }

    #[test]
    fn clear_cookie_expires_immediately() -> anyhow::Result<()> {
        let config = AuthConfig::default().with_cookie_name("sid".to_string());
        assert_eq!(
            clear_session_cookie(&config)?.to_str()?,
            "sid=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        );
        Ok(())
    }

    #[test]
    fn token_is_read_from_named_cookie() {
        assert_eq!(
            session_token(&headers("theme=dark; bookwise_session=abc; x=1"), "bookwise_session"),
            Some("abc".to_string())
        );
        assert_eq!(
            session_token(&headers("bookwise_session_old=abc"), "bookwise_session"),
            None
        );
        assert_eq!(
            session_token(&headers("bookwise_session="), "bookwise_session"),
            None
        );
        assert_eq!(session_token(&HeaderMap::new(), "bookwise_session"), None);
    }
}
