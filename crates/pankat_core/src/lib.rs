//! Article persistence core for the pankat static-site generator.
//! This crate is the single source of truth for article ordering, filtering
//! and navigation rules.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use config::{Config, ConfigError, DbConfig, DbLocation};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status,
};
pub use model::article::{
    Article, ArticleId, ArticleValidationError, PresentationFlags, Tag, TagId,
};
pub use repo::article_repo::ArticleRepository;
pub use repo::article_store::{ArticleStore, RemoveMode, SqliteArticleStore};
pub use repo::error::{Lookup, RepoError, RepoResult};
pub use repo::query::{ArticleOrder, ArticleQuery, Direction, NameMatch, TimeBound, Visibility};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
