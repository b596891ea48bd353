//! Catalog curation: authors, categories and books.

use super::models::{
    Author, AuthorFilter, AuthorResponse, AuthorSummary, Book, BookFilter, BookResponse, Category,
    CategoryResponse, CreateAuthorRequest, CreateBookRequest, MAX_DESCRIPTION_LEN, MAX_NAME_LEN,
    MAX_TITLE_LEN, UpdateBookRequest, normalize_name, valid_cover_url, valid_text,
};
use super::repo::CatalogRepository;
use crate::auth::unix_now;
use crate::users::Page;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("author not found")]
    AuthorNotFound,
    #[error("an author with this name already exists")]
    AuthorAlreadyExists,
    #[error("one or more authors do not exist")]
    AuthorsMismatch,
    #[error("book not found")]
    BookNotFound,
    #[error("book is already published")]
    BookAlreadyPublished,
    #[error("book is already unpublished")]
    BookAlreadyUnpublished,
    #[error("invalid {0}")]
    InvalidField(&'static str),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct CatalogService {
    catalog: Arc<dyn CatalogRepository>,
}

fn check_text(value: &str, max: usize, field: &'static str) -> Result<String, CatalogError> {
    if valid_text(value, max) {
        Ok(value.trim().to_string())
    } else {
        Err(CatalogError::InvalidField(field))
    }
}

fn check_total_pages(total_pages: i32) -> Result<i32, CatalogError> {
    if total_pages > 0 {
        Ok(total_pages)
    } else {
        Err(CatalogError::InvalidField("total_pages"))
    }
}

fn check_cover(url: &str) -> Result<String, CatalogError> {
    if valid_cover_url(url) {
        Ok(url.trim().to_string())
    } else {
        Err(CatalogError::InvalidField("cover_image_url"))
    }
}

impl CatalogService {
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    /// # Errors
    /// Returns [`CatalogError::InvalidField`] for a bad name and
    /// [`CatalogError::AuthorAlreadyExists`] when the normalized name is taken.
    pub async fn create_author(
        &self,
        request: CreateAuthorRequest,
    ) -> Result<AuthorResponse, CatalogError> {
        if !valid_text(&request.full_name, MAX_NAME_LEN) {
            return Err(CatalogError::InvalidField("full_name"));
        }
        let author = Author::new(&request.full_name);
        if !self.catalog.create_author(&author).await? {
            return Err(CatalogError::AuthorAlreadyExists);
        }

        info!(author_id = %author.id, "author created");
        Ok(AuthorResponse::from(&author))
    }

    /// # Errors
    /// Returns an internal error if the repository fails.
    pub async fn list_authors(
        &self,
        filter: &AuthorFilter,
    ) -> Result<Page<AuthorResponse>, CatalogError> {
        let page = self.catalog.list_authors(filter).await?;
        Ok(page.map(|author| AuthorResponse::from(&author)))
    }

    /// Every author as id and name, for pickers.
    ///
    /// # Errors
    /// Returns an internal error if the repository fails.
    pub async fn list_author_summaries(&self) -> Result<Vec<AuthorSummary>, CatalogError> {
        let authors = self.catalog.list_all_authors().await?;
        Ok(authors.iter().map(AuthorSummary::from).collect())
    }

    /// # Errors
    /// Returns [`CatalogError::AuthorNotFound`].
    pub async fn get_author(&self, author_id: Uuid) -> Result<AuthorResponse, CatalogError> {
        let author = self.find_author(author_id).await?;
        Ok(AuthorResponse::from(&author))
    }

    /// Delete an author and every book credited to them.
    ///
    /// # Errors
    /// Returns [`CatalogError::AuthorNotFound`].
    pub async fn delete_author(&self, author_id: Uuid) -> Result<(), CatalogError> {
        self.find_author(author_id).await?;
        self.catalog.delete_author(author_id).await?;
        info!(%author_id, "author deleted with their books");
        Ok(())
    }

    /// # Errors
    /// Returns an internal error if the repository fails.
    pub async fn list_categories(&self) -> Result<Vec<CategoryResponse>, CatalogError> {
        let categories = self.catalog.list_categories().await?;
        Ok(categories.iter().map(CategoryResponse::from).collect())
    }

    /// Resolve category names, creating the ones not seen before. Names that
    /// normalize to the same key collapse into one category.
    ///
    /// # Errors
    /// Returns [`CatalogError::InvalidField`] for a blank or oversized name.
    pub async fn find_or_create_categories(
        &self,
        names: &[String],
    ) -> Result<Vec<Category>, CatalogError> {
        let mut wanted: Vec<Category> = Vec::new();
        let mut seen = HashSet::new();
        for name in names {
            if !valid_text(name, MAX_NAME_LEN) {
                return Err(CatalogError::InvalidField("categories"));
            }
            if seen.insert(normalize_name(name)) {
                wanted.push(Category::new(name));
            }
        }
        let keys: Vec<String> = seen.into_iter().collect();

        let existing = self.catalog.get_categories_by_normalized_names(&keys).await?;
        let missing: Vec<Category> = wanted
            .into_iter()
            .filter(|category| {
                !existing
                    .iter()
                    .any(|known| known.normalized_name == category.normalized_name)
            })
            .collect();
        if missing.is_empty() {
            return Ok(existing);
        }

        self.catalog.create_categories(&missing).await?;
        // Re-read so categories created concurrently resolve to the stored row.
        Ok(self.catalog.get_categories_by_normalized_names(&keys).await?)
    }

    /// Create an unpublished book.
    ///
    /// # Errors
    /// Returns [`CatalogError::InvalidField`] for a bad field and
    /// [`CatalogError::AuthorsMismatch`] when an author id does not resolve.
    pub async fn create_book(
        &self,
        request: CreateBookRequest,
    ) -> Result<BookResponse, CatalogError> {
        let title = check_text(&request.title, MAX_TITLE_LEN, "title")?;
        let description = check_text(&request.description, MAX_DESCRIPTION_LEN, "description")?;
        let total_pages = check_total_pages(request.total_pages)?;
        let cover_image_url = check_cover(&request.cover_image_url)?;
        if request.author_ids.is_empty() {
            return Err(CatalogError::InvalidField("author_ids"));
        }
        if request.categories.is_empty() {
            return Err(CatalogError::InvalidField("categories"));
        }

        let author_ids: Vec<Uuid> = {
            let mut seen = HashSet::new();
            request
                .author_ids
                .into_iter()
                .filter(|id| seen.insert(*id))
                .collect()
        };
        let authors = self.catalog.get_authors_by_ids(&author_ids).await?;
        if authors.len() != author_ids.len() {
            return Err(CatalogError::AuthorsMismatch);
        }
        let categories = self.find_or_create_categories(&request.categories).await?;

        let book = Book {
            id: Uuid::now_v7(),
            title,
            description,
            total_pages,
            cover_image_url,
            published: false,
            authors: authors.iter().map(AuthorSummary::from).collect(),
            categories: categories.iter().map(CategoryResponse::from).collect(),
            created_at: unix_now(),
            updated_at: None,
        };
        self.catalog.create_book(&book).await?;

        info!(book_id = %book.id, "book created");
        Ok(BookResponse::from(&book))
    }

    /// # Errors
    /// Returns [`CatalogError::BookNotFound`].
    pub async fn get_book(&self, book_id: Uuid) -> Result<BookResponse, CatalogError> {
        let book = self.find_book(book_id).await?;
        Ok(BookResponse::from(&book))
    }

    /// # Errors
    /// Returns an internal error if the repository fails.
    pub async fn list_books(&self, filter: &BookFilter) -> Result<Page<BookResponse>, CatalogError> {
        let page = self.catalog.list_books(filter).await?;
        Ok(page.map(|book| BookResponse::from(&book)))
    }

    /// # Errors
    /// Returns [`CatalogError::BookNotFound`] or [`CatalogError::InvalidField`].
    pub async fn update_book(
        &self,
        book_id: Uuid,
        request: UpdateBookRequest,
    ) -> Result<BookResponse, CatalogError> {
        let mut book = self.find_book(book_id).await?;
        if let Some(title) = request.title {
            book.title = check_text(&title, MAX_TITLE_LEN, "title")?;
        }
        if let Some(description) = request.description {
            book.description = check_text(&description, MAX_DESCRIPTION_LEN, "description")?;
        }
        if let Some(total_pages) = request.total_pages {
            book.total_pages = check_total_pages(total_pages)?;
        }
        if let Some(url) = request.cover_image_url {
            book.cover_image_url = check_cover(&url)?;
        }

        book.updated_at = Some(unix_now());
        self.catalog.update_book(&book).await?;
        info!(%book_id, "book updated");
        Ok(BookResponse::from(&book))
    }

    /// # Errors
    /// Returns [`CatalogError::BookNotFound`] or [`CatalogError::BookAlreadyPublished`].
    pub async fn publish_book(&self, book_id: Uuid) -> Result<(), CatalogError> {
        let book = self.find_book(book_id).await?;
        if book.published {
            return Err(CatalogError::BookAlreadyPublished);
        }
        self.catalog.set_published(book_id, true).await?;
        info!(%book_id, "book published");
        Ok(())
    }

    /// # Errors
    /// Returns [`CatalogError::BookNotFound`] or [`CatalogError::BookAlreadyUnpublished`].
    pub async fn unpublish_book(&self, book_id: Uuid) -> Result<(), CatalogError> {
        let book = self.find_book(book_id).await?;
        if !book.published {
            return Err(CatalogError::BookAlreadyUnpublished);
        }
        self.catalog.set_published(book_id, false).await?;
        info!(%book_id, "book unpublished");
        Ok(())
    }

    /// # Errors
    /// Returns [`CatalogError::BookNotFound`].
    pub async fn delete_book(&self, book_id: Uuid) -> Result<(), CatalogError> {
        self.find_book(book_id).await?;
        self.catalog.delete_book(book_id).await?;
        info!(%book_id, "book deleted");
        Ok(())
    }

    async fn find_author(&self, author_id: Uuid) -> Result<Author, CatalogError> {
        self.catalog
            .get_author_by_id(author_id)
            .await?
            .ok_or(CatalogError::AuthorNotFound)
    }

    async fn find_book(&self, book_id: Uuid) -> Result<Book, CatalogError> {
        self.catalog
            .get_book_by_id(book_id)
            .await?
            .ok_or(CatalogError::BookNotFound)
    }
}
