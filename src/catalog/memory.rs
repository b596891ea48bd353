//! In-memory catalog repository for tests.

use super::models::{Author, AuthorFilter, Book, BookFilter, Category};
use super::repo::CatalogRepository;
use crate::auth::unix_now;
use crate::users::Page;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    authors: HashMap<Uuid, Author>,
    categories: HashMap<Uuid, Category>,
    books: HashMap<Uuid, Book>,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryCatalogRepository {
    tables: RwLock<Tables>,
}

fn paginate<T>(items: Vec<T>, page: u32, per_page: u32, offset: u64) -> Page<T> {
    let total = items.len() as u64;
    let data = items
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(per_page as usize)
        .collect();
    Page::from_parts(data, page, per_page, total)
}

impl MemoryCatalogRepository {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn insert_author(&self, author: Author) -> Author {
        self.tables
            .write()
            .await
            .authors
            .insert(author.id, author.clone());
        author
    }
}

#[async_trait]
impl CatalogRepository for MemoryCatalogRepository {
    async fn create_author(&self, author: &Author) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables
            .authors
            .values()
            .any(|existing| existing.normalized_full_name == author.normalized_full_name)
        {
            return Ok(false);
        }
        tables.authors.insert(author.id, author.clone());
        Ok(true)
    }

    async fn get_author_by_id(&self, id: Uuid) -> Result<Option<Author>> {
        Ok(self.tables.read().await.authors.get(&id).cloned())
    }

    async fn get_authors_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Author>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.authors.get(id).cloned())
            .collect())
    }

    async fn list_authors(&self, filter: &AuthorFilter) -> Result<Page<Author>> {
        let name = filter.full_name_pattern().map(str::to_lowercase);
        let mut authors: Vec<Author> = self
            .tables
            .read()
            .await
            .authors
            .values()
            .filter(|author| {
                name.as_deref()
                    .is_none_or(|name| author.normalized_full_name.contains(name))
            })
            .cloned()
            .collect();
        authors.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
        Ok(paginate(
            authors,
            filter.page(),
            filter.per_page(),
            filter.offset(),
        ))
    }

    async fn list_all_authors(&self) -> Result<Vec<Author>> {
        let mut authors: Vec<Author> = self.tables.read().await.authors.values().cloned().collect();
        authors.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
        Ok(authors)
    }

    async fn delete_author(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .books
            .retain(|_, book| !book.authors.iter().any(|author| author.id == id));
        tables.authors.remove(&id);
        Ok(())
    }

    async fn get_categories_by_normalized_names(&self, names: &[String]) -> Result<Vec<Category>> {
        let tables = self.tables.read().await;
        Ok(tables
            .categories
            .values()
            .filter(|category| names.contains(&category.normalized_name))
            .cloned()
            .collect())
    }

    async fn create_categories(&self, categories: &[Category]) -> Result<()> {
        let mut tables = self.tables.write().await;
        for category in categories {
            if !tables
                .categories
                .values()
                .any(|existing| existing.normalized_name == category.normalized_name)
            {
                tables.categories.insert(category.id, category.clone());
            }
        }
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories: Vec<Category> =
            self.tables.read().await.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(categories)
    }

    async fn create_book(&self, book: &Book) -> Result<()> {
        self.tables
            .write()
            .await
            .books
            .insert(book.id, book.clone());
        Ok(())
    }

    async fn get_book_by_id(&self, id: Uuid) -> Result<Option<Book>> {
        Ok(self.tables.read().await.books.get(&id).cloned())
    }

    async fn list_books(&self, filter: &BookFilter) -> Result<Page<Book>> {
        let title = filter.title_pattern().map(str::to_lowercase);
        let mut books: Vec<Book> = self
            .tables
            .read()
            .await
            .books
            .values()
            .filter(|book| filter.published.is_none_or(|published| book.published == published))
            .filter(|book| {
                title
                    .as_deref()
                    .is_none_or(|title| book.title.to_lowercase().contains(title))
            })
            .cloned()
            .collect();
        books.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(
            books,
            filter.page(),
            filter.per_page(),
            filter.offset(),
        ))
    }

    async fn update_book(&self, book: &Book) -> Result<()> {
        if let Some(stored) = self.tables.write().await.books.get_mut(&book.id) {
            stored.title.clone_from(&book.title);
            stored.description.clone_from(&book.description);
            stored.total_pages = book.total_pages;
            stored.cover_image_url.clone_from(&book.cover_image_url);
            stored.updated_at = Some(unix_now());
        }
        Ok(())
    }

    async fn set_published(&self, id: Uuid, published: bool) -> Result<()> {
        if let Some(book) = self.tables.write().await.books.get_mut(&id) {
            book.published = published;
            book.updated_at = Some(unix_now());
        }
        Ok(())
    }

    async fn delete_book(&self, id: Uuid) -> Result<()> {
        self.tables.write().await.books.remove(&id);
        Ok(())
    }
}
