//! Article domain model.
//!
//! # Responsibility
//! - Define the canonical article record and its owned tags.
//! - Check the invariants storage relies on before any write.
//!
//! # Invariants
//! - `source_path` is the natural key and must not be blank.
//! - `id` is assigned by storage on first insert and never changes.
//! - Tags are value objects owned by exactly one article; two articles
//!   tagged "Linux" hold two distinct tag rows.
//! - Tag names are unique per article (exact comparison) and never blank.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage-assigned surrogate identity of an article.
pub type ArticleId = i64;

/// Storage-assigned surrogate identity of a tag row.
pub type TagId = i64;

/// Tag attached to a single article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// `None` until persisted.
    pub id: Option<TagId>,
    /// Back-reference to the owning article, `None` until persisted.
    pub article_id: Option<ArticleId>,
    pub name: String,
}

impl Tag {
    /// Creates an unpersisted tag.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            article_id: None,
            name: name.into(),
        }
    }
}

/// Rendering switches carried through storage untouched.
///
/// Query logic never reads these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationFlags {
    pub anchors: bool,
    pub table_of_contents: bool,
    pub timeline: bool,
    pub show_source_link: bool,
    pub live_updates: bool,
    pub evaluated: bool,
}

/// Content item managed by the static-site generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Surrogate identity; `None` until the article is persisted.
    pub id: Option<ArticleId>,
    /// Natural key: path of the source document.
    pub source_path: String,
    /// Path of the rendered output.
    pub destination_path: String,
    pub title: String,
    /// Sole ordering key for recency queries. Stored at millisecond precision.
    pub modification_time: DateTime<Utc>,
    pub summary: String,
    /// Ordered tag collection.
    pub tags: Vec<Tag>,
    /// Series name; empty means the article is not part of a series.
    pub series: String,
    pub is_draft: bool,
    pub is_special_page: bool,
    pub presentation: PresentationFlags,
    /// Soft delete marker as loaded from storage. Writes ignore it; use the
    /// repository's `soft_delete`/`restore` to change it.
    pub is_deleted: bool,
}

impl Article {
    /// Creates a published, untagged article outside any series.
    pub fn new(
        source_path: impl Into<String>,
        destination_path: impl Into<String>,
        title: impl Into<String>,
        modification_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            source_path: source_path.into(),
            destination_path: destination_path.into(),
            title: title.into(),
            modification_time,
            summary: String::new(),
            tags: Vec::new(),
            series: String::new(),
            is_draft: false,
            is_special_page: false,
            presentation: PresentationFlags::default(),
            is_deleted: false,
        }
    }

    /// Replaces the tag collection with the given names, in order.
    pub fn with_tags<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = names.into_iter().map(Tag::new).collect();
        self
    }

    pub fn with_series(mut self, series: impl Into<String>) -> Self {
        self.series = series.into();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Returns whether the article belongs to the published-articles view.
    pub fn is_published(&self) -> bool {
        !self.is_draft && !self.is_special_page && !self.is_deleted
    }

    pub fn has_series(&self) -> bool {
        !self.series.is_empty()
    }

    /// Tag names in collection order.
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|tag| tag.name.as_str()).collect()
    }

    /// Checks the invariants storage relies on.
    ///
    /// # Errors
    /// - [`ArticleValidationError::EmptySourcePath`] when the natural key is blank.
    /// - [`ArticleValidationError::EmptyTagName`] when a tag name is blank.
    /// - [`ArticleValidationError::DuplicateTagName`] when a name repeats
    ///   exactly. Names differing only in case are distinct tags.
    pub fn validate(&self) -> Result<(), ArticleValidationError> {
        if self.source_path.trim().is_empty() {
            return Err(ArticleValidationError::EmptySourcePath);
        }

        let mut seen = HashSet::new();
        for (index, tag) in self.tags.iter().enumerate() {
            if tag.name.trim().is_empty() {
                return Err(ArticleValidationError::EmptyTagName { index });
            }
            if !seen.insert(tag.name.as_str()) {
                return Err(ArticleValidationError::DuplicateTagName {
                    name: tag.name.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Malformed article input rejected before any write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleValidationError {
    EmptySourcePath,
    EmptyTagName { index: usize },
    DuplicateTagName { name: String },
}

impl Display for ArticleValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySourcePath => write!(f, "article source path must not be empty"),
            Self::EmptyTagName { index } => write!(f, "tag at position {index} has an empty name"),
            Self::DuplicateTagName { name } => write!(f, "tag `{name}` is attached twice"),
        }
    }
}

impl Error for ArticleValidationError {}
