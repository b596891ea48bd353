use super::models::{Author, AuthorFilter, AuthorSummary, Book, BookFilter, Category, CategoryResponse};
use crate::users::{
    Page,
    repo::{is_unique_violation, query_span},
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tracing::Instrument;
use uuid::Uuid;

/// Authors, categories and books.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Insert an author. Returns `false` when the normalized name is taken.
    async fn create_author(&self, author: &Author) -> Result<bool>;

    async fn get_author_by_id(&self, id: Uuid) -> Result<Option<Author>>;

    /// Authors among `ids`; unknown ids are skipped.
    async fn get_authors_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Author>>;

    async fn list_authors(&self, filter: &AuthorFilter) -> Result<Page<Author>>;

    /// Every author, ordered by name.
    async fn list_all_authors(&self) -> Result<Vec<Author>>;

    /// Delete an author together with every book they are credited on.
    async fn delete_author(&self, id: Uuid) -> Result<()>;

    async fn get_categories_by_normalized_names(&self, names: &[String]) -> Result<Vec<Category>>;

    /// Insert categories, skipping any whose normalized name already exists.
    async fn create_categories(&self, categories: &[Category]) -> Result<()>;

    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// Insert a book and link its authors and categories.
    async fn create_book(&self, book: &Book) -> Result<()>;

    async fn get_book_by_id(&self, id: Uuid) -> Result<Option<Book>>;

    async fn list_books(&self, filter: &BookFilter) -> Result<Page<Book>>;

    /// Persist title, description, page count and cover.
    async fn update_book(&self, book: &Book) -> Result<()>;

    async fn set_published(&self, id: Uuid, published: bool) -> Result<()>;

    async fn delete_book(&self, id: Uuid) -> Result<()>;
}

const AUTHOR_COLUMNS: &str = r"
    id, full_name, normalized_full_name, avatar,
    EXTRACT(EPOCH FROM created_at)::bigint AS created_at
";

const BOOK_COLUMNS: &str = r"
    id, title, description, total_pages, cover_image_url, published,
    EXTRACT(EPOCH FROM created_at)::bigint AS created_at,
    EXTRACT(EPOCH FROM updated_at)::bigint AS updated_at
";

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[derive(Clone, Debug)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fill in authors and categories for `books` with one query per join table.
    async fn attach_relations(&self, books: &mut [Book]) -> Result<()> {
        if books.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = books.iter().map(|book| book.id).collect();

        let authors_query = r"
            SELECT ba.book_id, a.id, a.full_name
            FROM book_authors ba JOIN authors a ON a.id = ba.author_id
            WHERE ba.book_id = ANY($1)
            ORDER BY a.full_name
        ";
        let rows = sqlx::query(authors_query)
            .bind(&ids)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", authors_query))
            .await
            .context("Failed to fetch book authors")?;
        let mut authors: HashMap<Uuid, Vec<AuthorSummary>> = HashMap::new();
        for row in rows {
            let book_id: Uuid = row.try_get("book_id")?;
            authors.entry(book_id).or_default().push(AuthorSummary {
                id: row.try_get("id")?,
                full_name: row.try_get("full_name")?,
            });
        }

        let categories_query = r"
            SELECT bc.book_id, c.id, c.name
            FROM book_categories bc JOIN categories c ON c.id = bc.category_id
            WHERE bc.book_id = ANY($1)
            ORDER BY c.name
        ";
        let rows = sqlx::query(categories_query)
            .bind(&ids)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", categories_query))
            .await
            .context("Failed to fetch book categories")?;
        let mut categories: HashMap<Uuid, Vec<CategoryResponse>> = HashMap::new();
        for row in rows {
            let book_id: Uuid = row.try_get("book_id")?;
            categories.entry(book_id).or_default().push(CategoryResponse {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
            });
        }

        for book in books.iter_mut() {
            book.authors = authors.remove(&book.id).unwrap_or_default();
            book.categories = categories.remove(&book.id).unwrap_or_default();
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn create_author(&self, author: &Author) -> Result<bool> {
        let query = r"
            INSERT INTO authors (id, full_name, normalized_full_name, avatar, created_at)
            VALUES ($1, $2, $3, $4, to_timestamp($5))
        ";
        let result = sqlx::query(query)
            .bind(author.id)
            .bind(&author.full_name)
            .bind(&author.normalized_full_name)
            .bind(&author.avatar)
            .bind(author.created_at)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(err).context("Failed to insert author"),
        }
    }

    async fn get_author_by_id(&self, id: Uuid) -> Result<Option<Author>> {
        let query = format!("SELECT {AUTHOR_COLUMNS} FROM authors WHERE id = $1");
        sqlx::query_as::<_, Author>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("Failed to fetch author by id")
    }

    async fn get_authors_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Author>> {
        let query = format!("SELECT {AUTHOR_COLUMNS} FROM authors WHERE id = ANY($1)");
        sqlx::query_as::<_, Author>(&query)
            .bind(ids)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("Failed to fetch authors by id")
    }

    async fn list_authors(&self, filter: &AuthorFilter) -> Result<Page<Author>> {
        let full_name = filter.full_name_pattern().map(|name| format!("%{name}%"));
        let condition = "($1::text IS NULL OR full_name ILIKE $1)";

        let count_query = format!("SELECT COUNT(*) AS total FROM authors WHERE {condition}");
        let total: i64 = sqlx::query(&count_query)
            .bind(full_name.as_deref())
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", &count_query))
            .await
            .context("Failed to count authors")?
            .get("total");

        let page_query = format!(
            "SELECT {AUTHOR_COLUMNS} FROM authors WHERE {condition}
             ORDER BY full_name, id
             LIMIT $2 OFFSET $3"
        );
        let authors = sqlx::query_as::<_, Author>(&page_query)
            .bind(full_name.as_deref())
            .bind(i64::from(filter.per_page()))
            .bind(to_i64(filter.offset()))
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &page_query))
            .await
            .context("Failed to list authors")?;

        Ok(Page::from_parts(
            authors,
            filter.page(),
            filter.per_page(),
            u64::try_from(total).unwrap_or(0),
        ))
    }

    async fn list_all_authors(&self) -> Result<Vec<Author>> {
        let query = format!("SELECT {AUTHOR_COLUMNS} FROM authors ORDER BY full_name, id");
        sqlx::query_as::<_, Author>(&query)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("Failed to list all authors")
    }

    async fn delete_author(&self, id: Uuid) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let books_query = r"
            DELETE FROM books
            WHERE id IN (SELECT book_id FROM book_authors WHERE author_id = $1)
        ";
        sqlx::query(books_query)
            .bind(id)
            .execute(&mut *tx)
            .instrument(query_span("DELETE", books_query))
            .await
            .context("Failed to delete books of author")?;

        let author_query = "DELETE FROM authors WHERE id = $1";
        sqlx::query(author_query)
            .bind(id)
            .execute(&mut *tx)
            .instrument(query_span("DELETE", author_query))
            .await
            .context("Failed to delete author")?;

        tx.commit().await.context("Failed to commit author deletion")
    }

    async fn get_categories_by_normalized_names(&self, names: &[String]) -> Result<Vec<Category>> {
        let query = "SELECT id, name, normalized_name FROM categories WHERE normalized_name = ANY($1)";
        sqlx::query_as::<_, Category>(query)
            .bind(names)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("Failed to fetch categories by name")
    }

    async fn create_categories(&self, categories: &[Category]) -> Result<()> {
        let query = r"
            INSERT INTO categories (id, name, normalized_name)
            SELECT * FROM UNNEST($1::uuid[], $2::text[], $3::text[])
            ON CONFLICT (normalized_name) DO NOTHING
        ";
        let ids: Vec<Uuid> = categories.iter().map(|category| category.id).collect();
        let names: Vec<&str> = categories.iter().map(|category| category.name.as_str()).collect();
        let normalized: Vec<&str> = categories
            .iter()
            .map(|category| category.normalized_name.as_str())
            .collect();
        sqlx::query(query)
            .bind(ids)
            .bind(names)
            .bind(normalized)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("Failed to insert categories")?;
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let query = "SELECT id, name, normalized_name FROM categories ORDER BY name, id";
        sqlx::query_as::<_, Category>(query)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("Failed to list categories")
    }

    async fn create_book(&self, book: &Book) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let book_query = r"
            INSERT INTO books
                (id, title, description, total_pages, cover_image_url, published, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, to_timestamp($7))
        ";
        sqlx::query(book_query)
            .bind(book.id)
            .bind(&book.title)
            .bind(&book.description)
            .bind(book.total_pages)
            .bind(&book.cover_image_url)
            .bind(book.published)
            .bind(book.created_at)
            .execute(&mut *tx)
            .instrument(query_span("INSERT", book_query))
            .await
            .context("Failed to insert book")?;

        let authors_query = r"
            INSERT INTO book_authors (book_id, author_id)
            SELECT $1, author_id FROM UNNEST($2::uuid[]) AS author_id
        ";
        let author_ids: Vec<Uuid> = book.authors.iter().map(|author| author.id).collect();
        sqlx::query(authors_query)
            .bind(book.id)
            .bind(author_ids)
            .execute(&mut *tx)
            .instrument(query_span("INSERT", authors_query))
            .await
            .context("Failed to link book authors")?;

        let categories_query = r"
            INSERT INTO book_categories (book_id, category_id)
            SELECT $1, category_id FROM UNNEST($2::uuid[]) AS category_id
        ";
        let category_ids: Vec<Uuid> = book.categories.iter().map(|category| category.id).collect();
        sqlx::query(categories_query)
            .bind(book.id)
            .bind(category_ids)
            .execute(&mut *tx)
            .instrument(query_span("INSERT", categories_query))
            .await
            .context("Failed to link book categories")?;

        tx.commit().await.context("Failed to commit book")
    }

    async fn get_book_by_id(&self, id: Uuid) -> Result<Option<Book>> {
        let query = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1");
        let book = sqlx::query_as::<_, Book>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("Failed to fetch book by id")?;

        match book {
            Some(book) => {
                let mut books = [book];
                self.attach_relations(&mut books).await?;
                let [book] = books;
                Ok(Some(book))
            }
            None => Ok(None),
        }
    }

    async fn list_books(&self, filter: &BookFilter) -> Result<Page<Book>> {
        let title = filter.title_pattern().map(|title| format!("%{title}%"));
        let condition = r"
            ($1::text IS NULL OR title ILIKE $1)
            AND ($2::boolean IS NULL OR published = $2)
        ";

        let count_query = format!("SELECT COUNT(*) AS total FROM books WHERE {condition}");
        let total: i64 = sqlx::query(&count_query)
            .bind(title.as_deref())
            .bind(filter.published)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", &count_query))
            .await
            .context("Failed to count books")?
            .get("total");

        let page_query = format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE {condition}
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        );
        let mut books = sqlx::query_as::<_, Book>(&page_query)
            .bind(title.as_deref())
            .bind(filter.published)
            .bind(i64::from(filter.per_page()))
            .bind(to_i64(filter.offset()))
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &page_query))
            .await
            .context("Failed to list books")?;
        self.attach_relations(&mut books).await?;

        Ok(Page::from_parts(
            books,
            filter.page(),
            filter.per_page(),
            u64::try_from(total).unwrap_or(0),
        ))
    }

    async fn update_book(&self, book: &Book) -> Result<()> {
        let query = r"
            UPDATE books
            SET title = $2, description = $3, total_pages = $4, cover_image_url = $5,
                updated_at = NOW()
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(book.id)
            .bind(&book.title)
            .bind(&book.description)
            .bind(book.total_pages)
            .bind(&book.cover_image_url)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("Failed to update book")?;
        Ok(())
    }

    async fn set_published(&self, id: Uuid, published: bool) -> Result<()> {
        let query = "UPDATE books SET published = $2, updated_at = NOW() WHERE id = $1";
        sqlx::query(query)
            .bind(id)
            .bind(published)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("Failed to update book publication")?;
        Ok(())
    }

    async fn delete_book(&self, id: Uuid) -> Result<()> {
        let query = "DELETE FROM books WHERE id = $1";
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("Failed to delete book")?;
        Ok(())
    }
}
