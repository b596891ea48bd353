//! Admin management, reserved to roles holding the matching permission.

use super::{json_payload, path_param};
use crate::api::middleware::AuthenticatedSession;
use crate::api::response::{ApiError, ErrorBody};
use crate::users::{Page, UpdateUserRequest, UserFilter, UserResponse, UserService};
use axum::{
    Json,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use std::sync::Arc;
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/v1/admins",
    params(UserFilter),
    responses(
        (status = 200, description = "One page of admins, newest first", body = Page<UserResponse>),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not list admins", body = ErrorBody),
    ),
    tag = "admins"
)]
pub async fn list_admins(
    users: Extension<Arc<UserService>>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Page<UserResponse>>, ApiError> {
    Ok(Json(users.list_admins(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/v1/admins/{id}",
    params(("id" = Uuid, Path, description = "Admin id")),
    responses(
        (status = 200, description = "The admin", body = UserResponse),
        (status = 400, description = "Own id or malformed id", body = ErrorBody),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not read admins", body = ErrorBody),
        (status = 404, description = "No admin with this id", body = ErrorBody),
    ),
    tag = "admins"
)]
pub async fn get_admin(
    users: Extension<Arc<UserService>>,
    AuthenticatedSession(caller): AuthenticatedSession,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = path_param(id)?;
    Ok(Json(users.get_admin(&caller, id).await?))
}

#[utoipa::path(
    patch,
    path = "/v1/admins/{id}/block",
    params(("id" = Uuid, Path, description = "Admin id")),
    responses(
        (status = 200, description = "Admin blocked and signed out everywhere"),
        (status = 400, description = "Own id or malformed id", body = ErrorBody),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not block admins", body = ErrorBody),
        (status = 404, description = "No admin with this id", body = ErrorBody),
        (status = 409, description = "Admin already blocked", body = ErrorBody),
    ),
    tag = "admins"
)]
pub async fn block_admin(
    users: Extension<Arc<UserService>>,
    AuthenticatedSession(caller): AuthenticatedSession,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = path_param(id)?;
    users.block_admin(&caller, id).await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    patch,
    path = "/v1/admins/{id}/unblock",
    params(("id" = Uuid, Path, description = "Admin id")),
    responses(
        (status = 200, description = "Admin unblocked"),
        (status = 400, description = "Own id or malformed id", body = ErrorBody),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not unblock admins", body = ErrorBody),
        (status = 404, description = "No admin with this id", body = ErrorBody),
        (status = 409, description = "Admin already active", body = ErrorBody),
    ),
    tag = "admins"
)]
pub async fn unblock_admin(
    users: Extension<Arc<UserService>>,
    AuthenticatedSession(caller): AuthenticatedSession,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = path_param(id)?;
    users.unblock_admin(&caller, id).await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    patch,
    path = "/v1/admins/{id}",
    params(("id" = Uuid, Path, description = "Admin id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "The updated admin", body = UserResponse),
        (status = 400, description = "Own id, malformed id or invalid field", body = ErrorBody),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not update admins", body = ErrorBody),
        (status = 404, description = "No admin with this id", body = ErrorBody),
        (status = 409, description = "Email already used by another account", body = ErrorBody),
    ),
    tag = "admins"
)]
pub async fn update_admin(
    users: Extension<Arc<UserService>>,
    AuthenticatedSession(caller): AuthenticatedSession,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = path_param(id)?;
    let request = json_payload(payload)?;
    Ok(Json(users.update_admin(&caller, id, request).await?))
}

#[utoipa::path(
    delete,
    path = "/v1/admins/{id}",
    params(("id" = Uuid, Path, description = "Admin id")),
    responses(
        (status = 200, description = "Admin deleted and signed out everywhere"),
        (status = 400, description = "Own id or malformed id", body = ErrorBody),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not delete admins", body = ErrorBody),
        (status = 404, description = "No admin with this id", body = ErrorBody),
    ),
    tag = "admins"
)]
pub async fn delete_admin(
    users: Extension<Arc<UserService>>,
    AuthenticatedSession(caller): AuthenticatedSession,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = path_param(id)?;
    users.delete_admin(&caller, id).await?;
    Ok(StatusCode::OK)
}
