//! Users: models, persistence and the admin management service.

#[cfg(test)]
pub(crate) mod memory;
pub mod models;
pub mod repo;
pub mod service;

pub use models::*;
pub use repo::*;
pub use service::*;
