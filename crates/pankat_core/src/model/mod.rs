//! Domain model for articles and their tags.
//!
//! # Responsibility
//! - Define the data structures shared by storage and query logic.
//!
//! # Invariants
//! - Every persisted article is identified by a stable `ArticleId` and a
//!   unique `source_path`.
//! - Tags live and die with their owning article.

pub mod article;
