//! Error responses shared by every handler.

use crate::auth::AuthError;
use crate::catalog::CatalogError;
use crate::users::UserError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::error;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "access_denied", "Access denied")
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "forbidden",
            "You do not have permission to perform this action",
        )
    }

    /// Log the cause and hide it behind a generic 500.
    #[must_use]
    pub fn internal(cause: impl Display) -> Self {
        error!("internal error: {cause:#}");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error",
        )
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UserNotFound => {
                Self::new(StatusCode::NOT_FOUND, "user_not_found", err.to_string())
            }
            AuthError::UserBlocked => {
                Self::new(StatusCode::FORBIDDEN, "user_blocked", err.to_string())
            }
            AuthError::MagicLinkNotFound => {
                Self::new(StatusCode::NOT_FOUND, "magic_link_not_found", err.to_string())
            }
            AuthError::SessionNotFound => Self::unauthorized(),
            AuthError::Internal(cause) => Self::internal(cause),
        }
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        let message = err.to_string();
        match err {
            UserError::NotFound => Self::new(StatusCode::NOT_FOUND, "user_not_found", message),
            UserError::InvalidField(_) => Self::bad_request("invalid_payload", message),
            UserError::EmailAlreadyExists => {
                Self::new(StatusCode::CONFLICT, "email_already_exists", message)
            }
            UserError::CannotBlockYourself => Self::bad_request("cannot_block_yourself", message),
            UserError::CannotUnblockYourself => {
                Self::bad_request("cannot_unblock_yourself", message)
            }
            UserError::CannotDeleteYourself => Self::bad_request("cannot_delete_yourself", message),
            UserError::SameIdProvided => Self::bad_request("same_id_provided", message),
            UserError::AlreadyBlocked => {
                Self::new(StatusCode::CONFLICT, "user_already_blocked", message)
            }
            UserError::AlreadyUnblocked => {
                Self::new(StatusCode::CONFLICT, "user_already_unblocked", message)
            }
            UserError::Internal(cause) => Self::internal(cause),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        let message = err.to_string();
        match err {
            CatalogError::AuthorNotFound => {
                Self::new(StatusCode::NOT_FOUND, "author_not_found", message)
            }
            CatalogError::AuthorAlreadyExists => {
                Self::new(StatusCode::CONFLICT, "author_already_exists", message)
            }
            CatalogError::AuthorsMismatch => Self::bad_request("authors_mismatch", message),
            CatalogError::BookNotFound => Self::new(StatusCode::NOT_FOUND, "book_not_found", message),
            CatalogError::BookAlreadyPublished => {
                Self::new(StatusCode::CONFLICT, "book_already_published", message)
            }
            CatalogError::BookAlreadyUnpublished => {
                Self::new(StatusCode::CONFLICT, "book_already_unpublished", message)
            }
            CatalogError::InvalidField(_) => Self::bad_request("invalid_payload", message),
            CatalogError::Internal(cause) => Self::internal(cause),
        }
    }
}
