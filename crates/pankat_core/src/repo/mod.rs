//! Article persistence and query layer.
//!
//! # Responsibility
//! - Define the storage engine contract (`ArticleStore`) and its SQLite
//!   implementation.
//! - Build the article use-cases (`ArticleRepository`) on top of it.
//!
//! # Invariants
//! - Write paths call `Article::validate()` before SQL mutations.
//! - Repository APIs return semantic errors (`NotFound`) distinct from
//!   storage failures.

pub mod article_repo;
pub mod article_store;
pub mod error;
pub mod query;
