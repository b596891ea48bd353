//! Catalog: authors, categories and books curated by admins.

#[cfg(test)]
pub(crate) mod memory;
pub mod models;
pub mod repo;
pub mod service;

pub use models::*;
pub use repo::*;
pub use service::*;
