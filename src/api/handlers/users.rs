use super::json_payload;
use crate::api::middleware::AuthenticatedSession;
use crate::api::response::{ApiError, ErrorBody};
use crate::auth::Role;
use crate::users::{CreateUserRequest, UserResponse, UserService};
use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
};
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/v1/users/member",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Member registered", body = UserResponse),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn create_member(
    users: Extension<Arc<UserService>>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let request = json_payload(payload)?;
    let created = users.create_user(request, Role::Member).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    post,
    path = "/v1/users/admin",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Admin created", body = UserResponse),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not create admins", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn create_admin(
    users: Extension<Arc<UserService>>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let request = json_payload(payload)?;
    let created = users.create_user(request, Role::Admin).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/v1/users/me",
    responses(
        (status = 200, description = "Profile of the signed-in user", body = UserResponse),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 404, description = "User no longer exists", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn me(
    users: Extension<Arc<UserService>>,
    AuthenticatedSession(session): AuthenticatedSession,
) -> Result<Json<UserResponse>, ApiError> {
    Ok(Json(users.get_profile(&session).await?))
}
