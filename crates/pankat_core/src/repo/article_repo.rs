//! Article repository: publish filtering, navigation and aggregation.
//!
//! # Responsibility
//! - Expose the article use-cases of the site generator on top of any
//!   [`ArticleStore`].
//! - Own the ordering, filtering and deduplication rules so they hold for
//!   every storage engine.
//!
//! # Invariants
//! - Drafts and special pages never appear in published listings,
//!   navigation, or tag/series queries.
//! - Listings that may legitimately be empty (`query_all`, `articles`,
//!   `drafts`, `special_pages`, `tags`, `series`) return an empty `Vec`.
//!   Lookups that expect a specific result (`query_raw_by_source_path`,
//!   navigation, tag/series filters) return `RepoError::NotFound`.
//!   `most_recent_article` returns `None` on an empty collection.
//! - Navigation is tie-inclusive: an article sharing the reference timestamp
//!   is a neighbor in both directions.

use crate::model::article::{Article, ArticleId};
use crate::repo::article_store::{ArticleStore, RemoveMode};
use crate::repo::error::{Lookup, RepoError, RepoResult};
use crate::repo::query::{
    distinct_in_order, ArticleOrder, ArticleQuery, Direction, NameMatch,
};
use log::debug;

/// Article use-cases over a storage engine.
pub struct ArticleRepository<S: ArticleStore> {
    store: S,
}

impl<S: ArticleStore> ArticleRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn into_inner(self) -> S {
        self.store
    }

    /// Upserts `article` by source path and returns the persisted state.
    ///
    /// An existing row (soft-deleted or not) is updated in place and keeps its
    /// id; its tag set is replaced by `article.tags`. The stored row is always
    /// live afterwards, whatever `article.is_deleted` says.
    pub fn add(&mut self, article: &Article) -> RepoResult<Article> {
        self.store.persist(article)?;
        let stored = self
            .find_one(
                ArticleQuery::by_source_path(article.source_path.as_str()).including_deleted(),
            )?
            .ok_or(RepoError::InconsistentState(
                "persisted article not found in read-back",
            ))?;
        if stored.is_deleted {
            return Err(RepoError::InconsistentState(
                "persisted article is still soft-deleted",
            ));
        }
        Ok(stored)
    }

    /// Upserts all articles in one transaction.
    pub fn add_all(&mut self, articles: &[Article]) -> RepoResult<Vec<ArticleId>> {
        self.store.persist_batch(articles)
    }

    /// Permanently removes the article and its tags. Absent paths are not an error.
    pub fn delete(&mut self, source_path: &str) -> RepoResult<()> {
        if !self.store.remove(source_path, RemoveMode::Hard)? {
            debug!("event=article_delete module=repo status=noop reason=not_found");
        }
        Ok(())
    }

    /// Hides the article from every query without purging it.
    pub fn soft_delete(&mut self, source_path: &str) -> RepoResult<()> {
        if self.store.remove(source_path, RemoveMode::Soft)? {
            Ok(())
        } else {
            Err(RepoError::NotFound(Lookup::SourcePath(source_path.to_string())))
        }
    }

    /// Makes a soft-deleted article visible again.
    pub fn restore(&mut self, source_path: &str) -> RepoResult<()> {
        if self.store.restore(source_path)? {
            Ok(())
        } else {
            Err(RepoError::NotFound(Lookup::SourcePath(source_path.to_string())))
        }
    }

    /// Every live article, drafts and special pages included, newest first.
    pub fn query_all(&self) -> RepoResult<Vec<Article>> {
        self.store.find(&ArticleQuery::all())
    }

    /// Natural-key lookup regardless of publish state.
    pub fn query_raw_by_source_path(&self, source_path: &str) -> RepoResult<Article> {
        self.find_one(ArticleQuery::by_source_path(source_path))?
            .ok_or_else(|| RepoError::NotFound(Lookup::SourcePath(source_path.to_string())))
    }

    /// The published-articles view, newest first.
    pub fn articles(&self) -> RepoResult<Vec<Article>> {
        self.store.find(&ArticleQuery::published())
    }

    /// Newest published article, or `None` when nothing is published.
    pub fn most_recent_article(&self) -> RepoResult<Option<Article>> {
        self.find_one(ArticleQuery::published().limit(1))
    }

    /// Closest published article at or after the reference timestamp.
    pub fn next_article(&self, reference: &Article) -> RepoResult<Article> {
        self.neighbor(reference, Direction::Next, false)
    }

    /// Closest published article at or before the reference timestamp.
    pub fn prev_article(&self, reference: &Article) -> RepoResult<Article> {
        self.neighbor(reference, Direction::Prev, false)
    }

    /// Published articles carrying `tag_name`, compared ignoring ASCII case.
    pub fn articles_by_tag(&self, tag_name: &str) -> RepoResult<Vec<Article>> {
        let query =
            ArticleQuery::published().tagged(NameMatch::IgnoreCase(tag_name.to_string()));
        non_empty(self.store.find(&query)?, || Lookup::Tag(tag_name.to_string()))
    }

    /// Published articles of `series`, compared ignoring ASCII case.
    pub fn articles_by_series(&self, series: &str) -> RepoResult<Vec<Article>> {
        let query =
            ArticleQuery::published().in_series(NameMatch::IgnoreCase(series.to_string()));
        non_empty(self.store.find(&query)?, || Lookup::Series(series.to_string()))
    }

    /// Like [`Self::next_article`], restricted to the reference's series.
    pub fn next_article_in_series(&self, reference: &Article) -> RepoResult<Article> {
        self.neighbor(reference, Direction::Next, true)
    }

    /// Like [`Self::prev_article`], restricted to the reference's series.
    pub fn prev_article_in_series(&self, reference: &Article) -> RepoResult<Article> {
        self.neighbor(reference, Direction::Prev, true)
    }

    /// Distinct tag names of the published view, in first-seen order.
    ///
    /// Articles are walked in insertion order and each article's tags in
    /// their stored order. Names are compared exactly.
    pub fn tags(&self) -> RepoResult<Vec<String>> {
        let published = self.published_in_insertion_order()?;
        Ok(distinct_in_order(
            published
                .iter()
                .flat_map(|article| article.tags.iter().map(|tag| tag.name.as_str())),
        ))
    }

    /// Distinct non-empty series names of the published view, in first-seen
    /// insertion order.
    pub fn series(&self) -> RepoResult<Vec<String>> {
        let published = self.published_in_insertion_order()?;
        Ok(distinct_in_order(
            published
                .iter()
                .filter(|article| article.has_series())
                .map(|article| article.series.as_str()),
        ))
    }

    /// Draft articles, newest first.
    pub fn drafts(&self) -> RepoResult<Vec<Article>> {
        self.store.find(&ArticleQuery::drafts())
    }

    /// Special pages, newest first.
    pub fn special_pages(&self) -> RepoResult<Vec<Article>> {
        self.store.find(&ArticleQuery::special_pages())
    }

    fn neighbor(
        &self,
        reference: &Article,
        direction: Direction,
        within_series: bool,
    ) -> RepoResult<Article> {
        let missing = || match (direction, within_series) {
            (Direction::Next, false) => Lookup::NextArticle,
            (Direction::Prev, false) => Lookup::PrevArticle,
            (Direction::Next, true) => Lookup::NextInSeries(reference.series.clone()),
            (Direction::Prev, true) => Lookup::PrevInSeries(reference.series.clone()),
        };

        let reference_id = reference
            .id
            .ok_or_else(|| RepoError::InvalidReference(reference.source_path.clone()))?;

        if within_series && !reference.has_series() {
            return Err(RepoError::NotFound(missing()));
        }

        let mut query = direction.neighbor_query(reference_id, reference.modification_time);
        if within_series {
            query = query.in_series(NameMatch::Exact(reference.series.clone()));
        }

        self.find_one(query)?
            .ok_or_else(|| RepoError::NotFound(missing()))
    }

    fn published_in_insertion_order(&self) -> RepoResult<Vec<Article>> {
        self.store
            .find(&ArticleQuery::published().ordered(ArticleOrder::Inserted))
    }

    fn find_one(&self, query: ArticleQuery) -> RepoResult<Option<Article>> {
        Ok(self.store.find(&query)?.into_iter().next())
    }
}

fn non_empty(articles: Vec<Article>, lookup: impl FnOnce() -> Lookup) -> RepoResult<Vec<Article>> {
    if articles.is_empty() {
        Err(RepoError::NotFound(lookup()))
    } else {
        Ok(articles)
    }
}
