pub mod admins;
pub mod auth;
pub mod authors;
pub mod books;
pub mod categories;
pub mod health;
pub mod users;

use super::response::ApiError;
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
};

/// Unwrap a JSON body, turning extractor rejections into `invalid_payload`.
pub(crate) fn json_payload<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request("invalid_payload", rejection.body_text()))
}

pub(crate) fn path_param<T>(
    param: Result<axum::extract::Path<T>, PathRejection>,
) -> Result<T, ApiError> {
    param
        .map(|axum::extract::Path(value)| value)
        .map_err(|rejection| ApiError::bad_request("invalid_path", rejection.body_text()))
}
