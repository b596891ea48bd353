//! Book curation and publication.

use super::{json_payload, path_param};
use crate::api::response::{ApiError, ErrorBody};
use crate::catalog::{BookFilter, BookResponse, CatalogService, CreateBookRequest, UpdateBookRequest};
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
    path = "/v1/books",
    request_body = CreateBookRequest,
    responses(
        (status = 201, description = "Book created unpublished", body = BookResponse),
        (status = 400, description = "Invalid payload or unknown author", body = ErrorBody),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not create books", body = ErrorBody),
    ),
    tag = "books"
)]
pub async fn create_book(
    catalog: Extension<Arc<CatalogService>>,
    payload: Result<Json<CreateBookRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookResponse>), ApiError> {
    let request = json_payload(payload)?;
    let created = catalog.create_book(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/v1/books",
    params(BookFilter),
    responses(
        (status = 200, description = "One page of books, newest first", body = Page<BookResponse>),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not list books", body = ErrorBody),
    ),
    tag = "books"
)]
pub async fn list_books(
    catalog: Extension<Arc<CatalogService>>,
    Query(filter): Query<BookFilter>,
) -> Result<Json<Page<BookResponse>>, ApiError> {
    Ok(Json(catalog.list_books(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/v1/books/{id}",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "The book", body = BookResponse),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not read books", body = ErrorBody),
        (status = 404, description = "No book with this id", body = ErrorBody),
    ),
    tag = "books"
)]
pub async fn get_book(
    catalog: Extension<Arc<CatalogService>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<BookResponse>, ApiError> {
    let id = path_param(id)?;
    Ok(Json(catalog.get_book(id).await?))
}

#[utoipa::path(
    patch,
    path = "/v1/books/{id}",
    params(("id" = Uuid, Path, description = "Book id")),
    request_body = UpdateBookRequest,
    responses(
        (status = 200, description = "The updated book", body = BookResponse),
        (status = 400, description = "Malformed id or invalid field", body = ErrorBody),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not update books", body = ErrorBody),
        (status = 404, description = "No book with this id", body = ErrorBody),
    ),
    tag = "books"
)]
pub async fn update_book(
    catalog: Extension<Arc<CatalogService>>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateBookRequest>, JsonRejection>,
) -> Result<Json<BookResponse>, ApiError> {
    let id = path_param(id)?;
    let request = json_payload(payload)?;
    Ok(Json(catalog.update_book(id, request).await?))
}

#[utoipa::path(
    delete,
    path = "/v1/books/{id}",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book deleted"),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not delete books", body = ErrorBody),
        (status = 404, description = "No book with this id", body = ErrorBody),
    ),
    tag = "books"
)]
pub async fn delete_book(
    catalog: Extension<Arc<CatalogService>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = path_param(id)?;
    catalog.delete_book(id).await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    patch,
    path = "/v1/books/{id}/publish",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book published"),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not publish books", body = ErrorBody),
        (status = 404, description = "No book with this id", body = ErrorBody),
        (status = 409, description = "Book already published", body = ErrorBody),
    ),
    tag = "books"
)]
pub async fn publish_book(
    catalog: Extension<Arc<CatalogService>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = path_param(id)?;
    catalog.publish_book(id).await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    patch,
    path = "/v1/books/{id}/unpublish",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book unpublished"),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
        (status = 403, description = "Caller may not unpublish books", body = ErrorBody),
        (status = 404, description = "No book with this id", body = ErrorBody),
        (status = 409, description = "Book already unpublished", body = ErrorBody),
    ),
    tag = "books"
)]
pub async fn unpublish_book(
    catalog: Extension<Arc<CatalogService>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = path_param(id)?;
    catalog.unpublish_book(id).await?;
    Ok(StatusCode::OK)
}
