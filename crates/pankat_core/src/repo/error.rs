//! Repository error model.
//!
//! # Invariants
//! - `NotFound` is a semantic outcome and never wraps a storage failure.
//! - Storage failures from write paths are always surfaced as `Db`.

use crate::db::DbError;
use crate::model::article::ArticleValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Names the lookup that produced no candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    SourcePath(String),
    NextArticle,
    PrevArticle,
    NextInSeries(String),
    PrevInSeries(String),
    Tag(String),
    Series(String),
}

impl Display for Lookup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourcePath(path) => write!(f, "article not found: {path}"),
            Self::NextArticle => write!(f, "no next article"),
            Self::PrevArticle => write!(f, "no prev article"),
            Self::NextInSeries(series) => write!(f, "no next article in series `{series}`"),
            Self::PrevInSeries(series) => write!(f, "no prev article in series `{series}`"),
            Self::Tag(name) => write!(f, "no articles tagged `{name}`"),
            Self::Series(name) => write!(f, "no articles in series `{name}`"),
        }
    }
}

/// Error returned by article store and repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Input rejected before touching storage.
    Validation(ArticleValidationError),
    /// Engine-level I/O or constraint failure.
    Db(DbError),
    /// Lookup or navigation yielded no candidate.
    NotFound(Lookup),
    /// Navigation reference has never been persisted.
    InvalidReference(String),
    /// Persisted row cannot be mapped back to the model.
    InvalidData(String),
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Write succeeded but the read-back disagrees.
    InconsistentState(&'static str),
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(lookup) => write!(f, "{lookup}"),
            Self::InvalidReference(path) => {
                write!(f, "reference article `{path}` has no storage id")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted article data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
            Self::InconsistentState(details) => write!(f, "inconsistent article state: {details}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ArticleValidationError> for RepoError {
    fn from(value: ArticleValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
