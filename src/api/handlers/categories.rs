use crate::api::response::{ApiError, ErrorBody};
use crate::catalog::{CatalogService, CategoryResponse};
use axum::{Json, extract::Extension};
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/v1/categories",
    responses(
        (status = 200, description = "Every category by name", body = [CategoryResponse]),
        (status = 401, description = "Missing or invalid session cookie", body = ErrorBody),
    ),
    tag = "categories"
)]
// Any signed-in user may browse categories.
pub async fn list_categories(
    catalog: Extension<Arc<CatalogService>>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    Ok(Json(catalog.list_categories().await?))
}
