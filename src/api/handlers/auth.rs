//! Magic-link sign-in, redemption and session endpoints.
//!
//! Flow Overview:
//! 1) `POST /v1/auth/{member,admin}/sign-in` queues a sign-in email.
//! 2) `GET /v1/auth/link` redeems the emailed code, sets the session cookie and
//!    redirects to the frontend the link was issued for.
//! 3) Authenticated callers can list their sessions or sign out.

use super::json_payload;
use crate::api::middleware::{AuthenticatedSession, clear_session_cookie, session_cookie};
use crate::api::response::{ApiError, ErrorBody};
use crate::auth::{AuthConfig, AuthError, AuthService, Role};
use crate::users::{normalize_email, valid_email};
use axum::{
    Json,
    extract::{Extension, Query, rejection::JsonRejection},
    http::{
        HeaderValue, StatusCode,
        header::{LOCATION, SET_COOKIE},
    },
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(ToSchema, Deserialize, Debug)]
pub struct SignInRequest {
    email: String,
}

#[derive(IntoParams, Deserialize, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct LinkParams {
    /// One-time code from the sign-in email.
    code: Option<String>,
    /// Frontend URL to land on; must be one of the configured redirect URLs.
    redirect: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub created_at: i64,
    /// Whether this is the session making the request.
    pub current: bool,
}

async fn sign_in(
    auth: &AuthService,
    payload: Result<Json<SignInRequest>, JsonRejection>,
    allowed_roles: &[Role],
) -> Result<StatusCode, ApiError> {
    let request = json_payload(payload)?;
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::bad_request("invalid_payload", "invalid email"));
    }

    auth.sign_in(&email, allowed_roles).await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/v1/auth/member/sign-in",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Sign-in link sent"),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 403, description = "User is blocked", body = ErrorBody),
        (status = 404, description = "No member with this email", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn member_sign_in(
    auth: Extension<Arc<AuthService>>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    sign_in(&auth, payload, &[Role::Member]).await
}

#[utoipa::path(
    post,
    path = "/v1/auth/admin/sign-in",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Sign-in link sent"),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 403, description = "User is blocked", body = ErrorBody),
        (status = 404, description = "No admin or owner with this email", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn admin_sign_in(
    auth: Extension<Arc<AuthService>>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    sign_in(&auth, payload, &[Role::Admin, Role::Owner]).await
}

#[utoipa::path(
    get,
    path = "/v1/auth/link",
    params(LinkParams),
    responses(
        (status = 302, description = "Session opened, redirecting with the session cookie"),
        (status = 400, description = "Malformed code or disallowed redirect", body = ErrorBody),
        (status = 403, description = "User is blocked", body = ErrorBody),
        (status = 404, description = "Link expired, already used or user gone", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn verify_link(
    config: Extension<Arc<AuthConfig>>,
    auth: Extension<Arc<AuthService>>,
    Query(params): Query<LinkParams>,
) -> Result<impl IntoResponse, ApiError> {
    // Both checks run before the code is consumed.
    let code = params
        .code
        .as_deref()
        .and_then(|code| Uuid::parse_str(code.trim()).ok())
        .ok_or_else(|| ApiError::bad_request("invalid_code", "invalid or missing code"))?;

    let location = params
        .redirect
        .as_deref()
        .filter(|redirect| config.is_allowed_redirect(redirect))
        .and_then(|redirect| HeaderValue::from_str(redirect).ok())
        .ok_or_else(|| ApiError::bad_request("invalid_redirect", "redirect is not allowed"))?;

    let session = auth.verify_magic_link(code).await?;
    let cookie = session_cookie(&config, &session.token).map_err(ApiError::internal)?;

    debug!(user_id = %session.user_id, "redirecting after sign-in");
    Ok((StatusCode::FOUND, [(LOCATION, location), (SET_COOKIE, cookie)]))
}

#[utoipa::path(
    post,
    path = "/v1/auth/sign-out",
    responses(
        (status = 200, description = "Signed out, session cookie cleared"),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn sign_out(
    config: Extension<Arc<AuthConfig>>,
    auth: Extension<Arc<AuthService>>,
    AuthenticatedSession(session): AuthenticatedSession,
) -> Result<impl IntoResponse, ApiError> {
    match auth.sign_out(&session).await {
        // Already revoked by someone else; the cookie still goes.
        Ok(()) | Err(AuthError::SessionNotFound) => {}
        Err(err) => return Err(err.into()),
    }

    let cookie = clear_session_cookie(&config).map_err(ApiError::internal)?;
    Ok((StatusCode::OK, [(SET_COOKIE, cookie)]))
}

#[utoipa::path(
    get,
    path = "/v1/auth/sessions",
    responses(
        (status = 200, description = "Active sessions of the caller", body = [SessionInfo]),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn list_sessions(
    auth: Extension<Arc<AuthService>>,
    AuthenticatedSession(current): AuthenticatedSession,
) -> Result<Json<Vec<SessionInfo>>, ApiError> {
    let sessions = auth
        .sessions()
        .get_sessions_by_user_id(current.user_id)
        .await?;

    Ok(Json(
        sessions
            .into_iter()
            .map(|session| SessionInfo {
                session_id: session.session_id,
                created_at: session.created_at,
                current: session.session_id == current.session_id,
            })
            .collect(),
    ))
}
