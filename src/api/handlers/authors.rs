//! Author curation.

use super::{json_payload, path_param};
use crate::api::response::{ApiError, ErrorBody};
use crate::catalog::{AuthorFilter, AuthorResponse, AuthorSummary, CatalogService, CreateAuthorRequest};
use crate::users::Page;
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
    post,
    path = "/v1/authors",
    request_body = CreateAuthorRequest,
    responses(
        (status = 201, description = "Author created", body = AuthorResponse),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not create authors", body = ErrorBody),
        (status = 409, description = "An author with this name exists", body = ErrorBody),
    ),
    tag = "authors"
)]
pub async fn create_author(
    catalog: Extension<Arc<CatalogService>>,
    payload: Result<Json<CreateAuthorRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthorResponse>), ApiError> {
    let request = json_payload(payload)?;
    let created = catalog.create_author(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/v1/authors",
    params(AuthorFilter),
    responses(
        (status = 200, description = "One page of authors by name", body = Page<AuthorResponse>),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not list authors", body = ErrorBody),
    ),
    tag = "authors"
)]
pub async fn list_authors(
    catalog: Extension<Arc<CatalogService>>,
    Query(filter): Query<AuthorFilter>,
) -> Result<Json<Page<AuthorResponse>>, ApiError> {
    Ok(Json(catalog.list_authors(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/v1/authors/lite",
    responses(
        (status = 200, description = "Every author as id and name", body = [AuthorSummary]),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not list authors", body = ErrorBody),
    ),
    tag = "authors"
)]
pub async fn list_author_summaries(
    catalog: Extension<Arc<CatalogService>>,
) -> Result<Json<Vec<AuthorSummary>>, ApiError> {
    Ok(Json(catalog.list_author_summaries().await?))
}

#[utoipa::path(
    get,
    path = "/v1/authors/{id}",
    params(("id" = Uuid, Path, description = "Author id")),
    responses(
        (status = 200, description = "The author", body = AuthorResponse),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not read authors", body = ErrorBody),
        (status = 404, description = "No author with this id", body = ErrorBody),
    ),
    tag = "authors"
)]
pub async fn get_author(
    catalog: Extension<Arc<CatalogService>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<AuthorResponse>, ApiError> {
    let id = path_param(id)?;
    Ok(Json(catalog.get_author(id).await?))
}

#[utoipa::path(
    delete,
    path = "/v1/authors/{id}",
    params(("id" = Uuid, Path, description = "Author id")),
    responses(
        (status = 200, description = "Author and their books deleted"),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not delete authors", body = ErrorBody),
        (status = 404, description = "No author with this id", body = ErrorBody),
    ),
    tag = "authors"
)]
pub async fn delete_author(
    catalog: Extension<Arc<CatalogService>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = path_param(id)?;
    catalog.delete_author(id).await?;
    Ok(StatusCode::OK)
}
