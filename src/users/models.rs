use crate::auth::{Role, unix_now};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow};
use std::{fmt, str::FromStr, sync::LazyLock};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Blocked,
}

impl UserStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Blocked => "blocked",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "blocked" => Ok(Self::Blocked),
            other => Err(format!("invalid user status: {other}")),
        }
    }
}

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message,
    )))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub status: UserStatus,
    pub role: Role,
    pub avatar: Option<String>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

impl User {
    /// A new active user with a fresh time-ordered id.
    #[must_use]
    pub fn new(full_name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::now_v7(),
            full_name: full_name.into(),
            email: email.into(),
            status: UserStatus::Active,
            role,
            avatar: None,
            created_at: unix_now(),
            updated_at: None,
        }
    }
}

// Expects `role` and `status` selected as text and timestamps as epoch seconds.
impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            full_name: row.try_get("full_name")?,
            email: row.try_get("email")?,
            status: status.parse().map_err(decode_error)?,
            role: role.parse().map_err(decode_error)?,
            avatar: row.try_get("avatar")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Public view of a user, also the payload cached under `user:{id}`.
#[derive(ToSchema, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub avatar: Option<String>,
    pub created_at: i64,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            role: user.role,
            status: user.status,
            avatar: user.avatar.clone(),
            created_at: user.created_at,
        }
    }
}

#[derive(ToSchema, Clone, Debug, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub full_name: String,
    pub email: String,
}

/// Partial update; absent fields keep their current value.
#[derive(ToSchema, Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(IntoParams, Clone, Debug, Default, Deserialize)]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    /// 1-based page number.
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<UserStatus>,
    /// Case-insensitive substring match.
    pub full_name: Option<String>,
}

impl UserFilter {
    #[must_use]
    pub fn page(&self) -> u32 {
        page_number(self.page)
    }

    #[must_use]
    pub fn per_page(&self) -> u32 {
        page_size(self.per_page)
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        page_offset(self.page, self.per_page)
    }

    #[must_use]
    pub fn full_name_pattern(&self) -> Option<&str> {
        search_term(self.full_name.as_deref())
    }
}

/// 1-based page number, defaulting to the first page.
#[must_use]
pub fn page_number(page: Option<u32>) -> u32 {
    page.unwrap_or(1).max(1)
}

#[must_use]
pub fn page_size(per_page: Option<u32>) -> u32 {
    per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

#[must_use]
pub fn page_offset(page: Option<u32>, per_page: Option<u32>) -> u64 {
    u64::from(page_number(page) - 1) * u64::from(page_size(per_page))
}

/// Trimmed search input, `None` when blank.
#[must_use]
pub fn search_term(term: Option<&str>) -> Option<&str> {
    term.map(str::trim).filter(|term| !term.is_empty())
}

#[derive(ToSchema, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(data: Vec<T>, filter: &UserFilter, total: u64) -> Self {
        Self::from_parts(data, filter.page(), filter.per_page(), total)
    }

    /// `page` and `per_page` must already be clamped.
    #[must_use]
    pub fn from_parts(data: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        Self {
            data,
            page,
            per_page,
            total,
            total_pages: total.div_ceil(u64::from(per_page.max(1))),
        }
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

/// Normalize an email for lookup and uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

static EMAIL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    email_normalized.len() <= 255
        && EMAIL_RE
            .as_ref()
            .is_some_and(|regex| regex.is_match(email_normalized))
}

#[must_use]
pub fn valid_full_name(full_name: &str) -> bool {
    let trimmed = full_name.trim();
    !trimmed.is_empty() && trimmed.chars().count() <= 255
}
