use crate::auth::unix_now;
use crate::users::models::{page_number, page_offset, page_size, search_term};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow};
use url::Url;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub const MAX_NAME_LEN: usize = 255;
pub const MAX_TITLE_LEN: usize = 500;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_URL_LEN: usize = 500;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Author {
    pub id: Uuid,
    pub full_name: String,
    pub normalized_full_name: String,
    pub avatar: Option<String>,
    pub created_at: i64,
}

impl Author {
    #[must_use]
    pub fn new(full_name: &str) -> Self {
        let full_name = collapse_whitespace(full_name);
        Self {
            id: Uuid::now_v7(),
            normalized_full_name: full_name.to_lowercase(),
            full_name,
            avatar: None,
            created_at: unix_now(),
        }
    }
}

impl<'r> FromRow<'r, PgRow> for Author {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            full_name: row.try_get("full_name")?,
            normalized_full_name: row.try_get("normalized_full_name")?,
            avatar: row.try_get("avatar")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub normalized_name: String,
}

impl Category {
    #[must_use]
    pub fn new(name: &str) -> Self {
        let name = collapse_whitespace(name);
        Self {
            id: Uuid::now_v7(),
            normalized_name: name.to_lowercase(),
            name,
        }
    }
}

impl<'r> FromRow<'r, PgRow> for Category {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            normalized_name: row.try_get("normalized_name")?,
        })
    }
}

/// A book with its authors and categories attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub total_pages: i32,
    pub cover_image_url: String,
    pub published: bool,
    pub authors: Vec<AuthorSummary>,
    pub categories: Vec<CategoryResponse>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

// Authors and categories live in join tables and are attached by the repository.
impl<'r> FromRow<'r, PgRow> for Book {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            total_pages: row.try_get("total_pages")?,
            cover_image_url: row.try_get("cover_image_url")?,
            published: row.try_get("published")?,
            authors: Vec::new(),
            categories: Vec::new(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(ToSchema, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorResponse {
    pub id: Uuid,
    pub full_name: String,
    pub avatar: Option<String>,
    pub created_at: i64,
}

impl From<&Author> for AuthorResponse {
    fn from(author: &Author) -> Self {
        Self {
            id: author.id,
            full_name: author.full_name.clone(),
            avatar: author.avatar.clone(),
            created_at: author.created_at,
        }
    }
}

/// Id and name only, for pickers and book payloads.
#[derive(ToSchema, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub full_name: String,
}

impl From<&Author> for AuthorSummary {
    fn from(author: &Author) -> Self {
        Self {
            id: author.id,
            full_name: author.full_name.clone(),
        }
    }
}

#[derive(ToSchema, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
}

impl From<&Category> for CategoryResponse {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
        }
    }
}

#[derive(ToSchema, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub total_pages: i32,
    pub cover_image_url: String,
    pub published: bool,
    pub authors: Vec<AuthorSummary>,
    pub categories: Vec<CategoryResponse>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

impl From<&Book> for BookResponse {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            description: book.description.clone(),
            total_pages: book.total_pages,
            cover_image_url: book.cover_image_url.clone(),
            published: book.published,
            authors: book.authors.clone(),
            categories: book.categories.clone(),
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

#[derive(ToSchema, Clone, Debug, Serialize, Deserialize)]
pub struct CreateAuthorRequest {
    pub full_name: String,
}

#[derive(ToSchema, Clone, Debug, Serialize, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    pub description: String,
    pub total_pages: i32,
    pub cover_image_url: String,
    /// Existing authors; every id must resolve.
    pub author_ids: Vec<Uuid>,
    /// Category names, created on first use.
    pub categories: Vec<String>,
}

/// Partial update; absent fields keep their current value.
#[derive(ToSchema, Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub total_pages: Option<i32>,
    pub cover_image_url: Option<String>,
}

#[derive(IntoParams, Clone, Debug, Default, Deserialize)]
#[into_params(parameter_in = Query)]
pub struct AuthorFilter {
    /// 1-based page number.
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Case-insensitive substring of the author name.
    pub full_name: Option<String>,
}

impl AuthorFilter {
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

#[derive(IntoParams, Clone, Debug, Default, Deserialize)]
#[into_params(parameter_in = Query)]
pub struct BookFilter {
    /// 1-based page number.
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    pub published: Option<bool>,
}

impl BookFilter {
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
    pub fn title_pattern(&self) -> Option<&str> {
        search_term(self.title.as_deref())
    }
}

/// Trim and collapse inner whitespace runs to one space.
#[must_use]
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Key used for name uniqueness of authors and categories.
#[must_use]
pub fn normalize_name(value: &str) -> String {
    collapse_whitespace(value).to_lowercase()
}

/// Non-blank and at most `max` characters once trimmed.
#[must_use]
pub fn valid_text(value: &str, max: usize) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed.chars().count() <= max
}

#[must_use]
pub fn valid_cover_url(value: &str) -> bool {
    value.len() <= MAX_URL_LEN
        && Url::parse(value.trim())
            .is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
}
