//! Engine-independent article query construction.
//!
//! # Responsibility
//! - Express every repository read as one predicate/order/limit value.
//! - Derive navigation queries from a reference article.
//!
//! # Invariants
//! - Time bounds are inclusive; navigation excludes only the reference row.
//! - `NewestFirst` is `modification_time DESC, id ASC`; `OldestFirst` is its
//!   exact reverse, so equal timestamps always resolve the same way.
//! - `Inserted` is `id ASC`; re-adding an article keeps its id and position.
//! - Soft-deleted rows are excluded unless `include_deleted` is set.

use crate::model::article::ArticleId;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Publish-state filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Visibility {
    /// Drafts and special pages included.
    #[default]
    All,
    /// Neither draft nor special page.
    Published,
    Drafts,
    SpecialPages,
}

/// Name comparison mode for tag/series filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameMatch {
    Exact(String),
    /// Exact match ignoring ASCII case.
    IgnoreCase(String),
}

/// Inclusive bound on `modification_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBound {
    AtOrAfter(DateTime<Utc>),
    AtOrBefore(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArticleOrder {
    #[default]
    NewestFirst,
    OldestFirst,
    /// Storage id ascending, i.e. first-insert order.
    Inserted,
}

/// Predicate, ordering and limit for one article read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleQuery {
    pub visibility: Visibility,
    pub source_path: Option<String>,
    pub tag: Option<NameMatch>,
    pub series: Option<NameMatch>,
    pub modified: Option<TimeBound>,
    pub exclude_id: Option<ArticleId>,
    pub order: ArticleOrder,
    pub limit: Option<u32>,
    pub include_deleted: bool,
}

impl ArticleQuery {
    /// Every live article, newest first.
    pub fn all() -> Self {
        Self::default()
    }

    /// The published-articles view, newest first.
    pub fn published() -> Self {
        Self::with_visibility(Visibility::Published)
    }

    pub fn drafts() -> Self {
        Self::with_visibility(Visibility::Drafts)
    }

    pub fn special_pages() -> Self {
        Self::with_visibility(Visibility::SpecialPages)
    }

    /// Natural-key lookup regardless of publish state.
    pub fn by_source_path(path: impl Into<String>) -> Self {
        Self {
            source_path: Some(path.into()),
            limit: Some(1),
            ..Self::default()
        }
    }

    fn with_visibility(visibility: Visibility) -> Self {
        Self {
            visibility,
            ..Self::default()
        }
    }

    pub fn tagged(mut self, tag: NameMatch) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn in_series(mut self, series: NameMatch) -> Self {
        self.series = Some(series);
        self
    }

    pub fn modified(mut self, bound: TimeBound) -> Self {
        self.modified = Some(bound);
        self
    }

    pub fn excluding(mut self, id: ArticleId) -> Self {
        self.exclude_id = Some(id);
        self
    }

    pub fn ordered(mut self, order: ArticleOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

/// Navigation direction through the published timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards more recent articles.
    Next,
    /// Towards older articles.
    Prev,
}

impl Direction {
    /// Builds the single-row query returning the closest neighbor of the
    /// reference in this direction.
    ///
    /// Candidates sharing the reference timestamp qualify in both
    /// directions; only the reference row itself is excluded.
    pub fn neighbor_query(self, reference_id: ArticleId, at: DateTime<Utc>) -> ArticleQuery {
        let (bound, order) = match self {
            Self::Next => (TimeBound::AtOrAfter(at), ArticleOrder::OldestFirst),
            Self::Prev => (TimeBound::AtOrBefore(at), ArticleOrder::NewestFirst),
        };

        ArticleQuery::published()
            .modified(bound)
            .excluding(reference_id)
            .ordered(order)
            .limit(1)
    }
}

/// Collapses duplicate names keeping the first occurrence of each.
pub fn distinct_in_order<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}
