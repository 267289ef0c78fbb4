//! Storage engine contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the primitives the article repository is built on: persist,
//!   find, remove, restore.
//! - Translate [`ArticleQuery`] values into SQL and load owned tags.
//!
//! # Invariants
//! - `persist` upserts by `source_path` and replaces the full tag set in one
//!   IMMEDIATE transaction; a failure leaves the previous row and tags intact.
//! - `persist` always leaves the row live; `Article::is_deleted` is read-only
//!   state and only `remove`/`restore` change the marker.
//! - Hard removal deletes tag rows together with the article row.
//! - Tags are returned in their persisted `position` order.

use crate::model::article::{Article, ArticleId, PresentationFlags, Tag};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::query::{ArticleOrder, ArticleQuery, NameMatch, TimeBound, Visibility};
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use std::time::Instant;

const ARTICLE_SELECT_SQL: &str = "SELECT
    id,
    source_path,
    destination_path,
    title,
    modification_time,
    summary,
    series,
    is_draft,
    is_special_page,
    anchors,
    table_of_contents,
    timeline,
    show_source_link,
    live_updates,
    evaluated,
    is_deleted
FROM articles";

const ARTICLE_COLUMNS: &[&str] = &[
    "id",
    "source_path",
    "destination_path",
    "title",
    "modification_time",
    "summary",
    "series",
    "is_draft",
    "is_special_page",
    "anchors",
    "table_of_contents",
    "timeline",
    "show_source_link",
    "live_updates",
    "evaluated",
    "is_deleted",
];

const TAG_COLUMNS: &[&str] = &["id", "article_id", "position", "name"];

/// How [`ArticleStore::remove`] treats the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveMode {
    /// Set the soft delete marker; row and tags stay on disk.
    Soft,
    /// Purge the row and its tags permanently.
    Hard,
}

/// Storage engine primitives consumed by `ArticleRepository`.
pub trait ArticleStore {
    /// Inserts or updates the article matching `source_path`, replacing its
    /// tags, and returns the storage id.
    fn persist(&mut self, article: &Article) -> RepoResult<ArticleId>;
    /// Persists all articles atomically, returning ids in input order.
    fn persist_batch(&mut self, articles: &[Article]) -> RepoResult<Vec<ArticleId>>;
    /// Runs one query with tags loaded for every returned row.
    fn find(&self, query: &ArticleQuery) -> RepoResult<Vec<Article>>;
    /// Returns `true` when a row was affected.
    fn remove(&mut self, source_path: &str, mode: RemoveMode) -> RepoResult<bool>;
    /// Clears the soft delete marker. Returns `true` when a row was affected.
    fn restore(&mut self, source_path: &str) -> RepoResult<bool>;
}

/// SQLite-backed article store.
pub struct SqliteArticleStore<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteArticleStore<'conn> {
    /// Constructs a store from a migrated connection.
    ///
    /// # Errors
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when the schema was
    ///   not provisioned through `db::open_db*`.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_article_schema_ready(conn)?;
        Ok(Self { conn })
    }

    /// Runs `f` inside one IMMEDIATE transaction.
    ///
    /// The transaction commits only when `f` returns `Ok`; any error rolls
    /// back every statement `f` issued.
    pub fn with_transaction<T, F>(&mut self, f: F) -> RepoResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> RepoResult<T>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

impl ArticleStore for SqliteArticleStore<'_> {
    fn persist(&mut self, article: &Article) -> RepoResult<ArticleId> {
        article.validate()?;

        let started_at = Instant::now();
        match self.with_transaction(|tx| upsert_in_tx(tx, article)) {
            Ok((article_id, mode)) => {
                info!(
                    "event=article_upsert module=repo status=ok mode={} article_id={} tag_count={} duration_ms={}",
                    mode,
                    article_id,
                    article.tags.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(article_id)
            }
            Err(err) => {
                error!(
                    "event=article_upsert module=repo status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn persist_batch(&mut self, articles: &[Article]) -> RepoResult<Vec<ArticleId>> {
        for article in articles {
            article.validate()?;
        }

        let started_at = Instant::now();
        let result = self.with_transaction(|tx| {
            articles
                .iter()
                .map(|article| upsert_in_tx(tx, article).map(|(article_id, _)| article_id))
                .collect::<RepoResult<Vec<_>>>()
        });

        match result {
            Ok(ids) => {
                info!(
                    "event=article_upsert_batch module=repo status=ok count={} duration_ms={}",
                    ids.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(ids)
            }
            Err(err) => {
                error!(
                    "event=article_upsert_batch module=repo status=error count={} duration_ms={} error={}",
                    articles.len(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn find(&self, query: &ArticleQuery) -> RepoResult<Vec<Article>> {
        let started_at = Instant::now();
        let (sql, bind_values) = build_find_sql(query);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut articles = Vec::new();
        while let Some(row) = rows.next()? {
            articles.push(parse_article_row(row)?);
        }

        for article in &mut articles {
            if let Some(article_id) = article.id {
                article.tags = load_tags_for_article(self.conn, article_id)?;
            }
        }

        debug!(
            "event=article_find module=repo status=ok visibility={:?} rows={} duration_ms={}",
            query.visibility,
            articles.len(),
            started_at.elapsed().as_millis()
        );
        Ok(articles)
    }

    fn remove(&mut self, source_path: &str, mode: RemoveMode) -> RepoResult<bool> {
        let started_at = Instant::now();
        let result = match mode {
            RemoveMode::Soft => self
                .conn
                .execute(
                    "UPDATE articles
                     SET
                        is_deleted = 1,
                        updated_at = (strftime('%s', 'now') * 1000)
                     WHERE source_path = ?1
                       AND is_deleted = 0;",
                    [source_path],
                )
                .map_err(RepoError::from),
            RemoveMode::Hard => self.with_transaction(|tx| {
                tx.execute(
                    "DELETE FROM tags
                     WHERE article_id IN (
                        SELECT id FROM articles WHERE source_path = ?1
                     );",
                    [source_path],
                )?;
                let changed =
                    tx.execute("DELETE FROM articles WHERE source_path = ?1;", [source_path])?;
                Ok(changed)
            }),
        };

        match result {
            Ok(changed) => {
                info!(
                    "event=article_remove module=repo status=ok mode={:?} removed={} duration_ms={}",
                    mode,
                    changed,
                    started_at.elapsed().as_millis()
                );
                Ok(changed > 0)
            }
            Err(err) => {
                error!(
                    "event=article_remove module=repo status=error mode={:?} duration_ms={} error={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn restore(&mut self, source_path: &str) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE articles
             SET
                is_deleted = 0,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE source_path = ?1
               AND is_deleted = 1;",
            [source_path],
        )?;
        Ok(changed > 0)
    }
}

fn upsert_in_tx(tx: &Transaction<'_>, article: &Article) -> RepoResult<(ArticleId, &'static str)> {
    let existing: Option<ArticleId> = tx
        .query_row(
            "SELECT id FROM articles WHERE source_path = ?1;",
            [article.source_path.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    let flags = &article.presentation;
    let (article_id, mode) = match existing {
        Some(article_id) => {
            tx.execute(
                "UPDATE articles
                 SET
                    destination_path = ?2,
                    title = ?3,
                    modification_time = ?4,
                    summary = ?5,
                    series = ?6,
                    is_draft = ?7,
                    is_special_page = ?8,
                    anchors = ?9,
                    table_of_contents = ?10,
                    timeline = ?11,
                    show_source_link = ?12,
                    live_updates = ?13,
                    evaluated = ?14,
                    is_deleted = 0,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                params![
                    article_id,
                    article.destination_path.as_str(),
                    article.title.as_str(),
                    article.modification_time.timestamp_millis(),
                    article.summary.as_str(),
                    article.series.as_str(),
                    bool_to_int(article.is_draft),
                    bool_to_int(article.is_special_page),
                    bool_to_int(flags.anchors),
                    bool_to_int(flags.table_of_contents),
                    bool_to_int(flags.timeline),
                    bool_to_int(flags.show_source_link),
                    bool_to_int(flags.live_updates),
                    bool_to_int(flags.evaluated),
                ],
            )?;
            (article_id, "update")
        }
        None => {
            tx.execute(
                "INSERT INTO articles (
                    source_path,
                    destination_path,
                    title,
                    modification_time,
                    summary,
                    series,
                    is_draft,
                    is_special_page,
                    anchors,
                    table_of_contents,
                    timeline,
                    show_source_link,
                    live_updates,
                    evaluated,
                    is_deleted
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 0);",
                params![
                    article.source_path.as_str(),
                    article.destination_path.as_str(),
                    article.title.as_str(),
                    article.modification_time.timestamp_millis(),
                    article.summary.as_str(),
                    article.series.as_str(),
                    bool_to_int(article.is_draft),
                    bool_to_int(article.is_special_page),
                    bool_to_int(flags.anchors),
                    bool_to_int(flags.table_of_contents),
                    bool_to_int(flags.timeline),
                    bool_to_int(flags.show_source_link),
                    bool_to_int(flags.live_updates),
                    bool_to_int(flags.evaluated),
                ],
            )?;
            (tx.last_insert_rowid(), "insert")
        }
    };

    replace_tags_in_tx(tx, article_id, &article.tags)?;
    Ok((article_id, mode))
}

fn replace_tags_in_tx(tx: &Transaction<'_>, article_id: ArticleId, tags: &[Tag]) -> RepoResult<()> {
    tx.execute("DELETE FROM tags WHERE article_id = ?1;", [article_id])?;

    let mut stmt =
        tx.prepare("INSERT INTO tags (article_id, position, name) VALUES (?1, ?2, ?3);")?;
    for (position, tag) in tags.iter().enumerate() {
        stmt.execute(params![article_id, position as i64, tag.name.as_str()])?;
    }
    Ok(())
}

fn build_find_sql(query: &ArticleQuery) -> (String, Vec<Value>) {
    let mut sql = format!("{ARTICLE_SELECT_SQL} WHERE 1 = 1");
    let mut bind_values: Vec<Value> = Vec::new();

    if !query.include_deleted {
        sql.push_str(" AND is_deleted = 0");
    }

    match query.visibility {
        Visibility::All => {}
        Visibility::Published => sql.push_str(" AND is_draft = 0 AND is_special_page = 0"),
        Visibility::Drafts => sql.push_str(" AND is_draft = 1"),
        Visibility::SpecialPages => sql.push_str(" AND is_special_page = 1"),
    }

    if let Some(path) = query.source_path.as_ref() {
        sql.push_str(" AND source_path = ?");
        bind_values.push(Value::Text(path.clone()));
    }

    if let Some(tag) = query.tag.as_ref() {
        sql.push_str(
            " AND EXISTS (
                SELECT 1
                FROM tags t
                WHERE t.article_id = articles.id
                  AND t.name = ?",
        );
        sql.push_str(collation(tag));
        sql.push(')');
        bind_values.push(Value::Text(name_value(tag)));
    }

    if let Some(series) = query.series.as_ref() {
        sql.push_str(" AND series = ?");
        sql.push_str(collation(series));
        bind_values.push(Value::Text(name_value(series)));
    }

    match query.modified {
        Some(TimeBound::AtOrAfter(at)) => {
            sql.push_str(" AND modification_time >= ?");
            bind_values.push(Value::Integer(at.timestamp_millis()));
        }
        Some(TimeBound::AtOrBefore(at)) => {
            sql.push_str(" AND modification_time <= ?");
            bind_values.push(Value::Integer(at.timestamp_millis()));
        }
        None => {}
    }

    if let Some(article_id) = query.exclude_id {
        sql.push_str(" AND id != ?");
        bind_values.push(Value::Integer(article_id));
    }

    match query.order {
        ArticleOrder::NewestFirst => sql.push_str(" ORDER BY modification_time DESC, id ASC"),
        ArticleOrder::OldestFirst => sql.push_str(" ORDER BY modification_time ASC, id DESC"),
        ArticleOrder::Inserted => sql.push_str(" ORDER BY id ASC"),
    }

    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
    }

    (sql, bind_values)
}

fn collation(name: &NameMatch) -> &'static str {
    match name {
        NameMatch::Exact(_) => "",
        NameMatch::IgnoreCase(_) => " COLLATE NOCASE",
    }
}

fn name_value(name: &NameMatch) -> String {
    match name {
        NameMatch::Exact(value) | NameMatch::IgnoreCase(value) => value.clone(),
    }
}

fn parse_article_row(row: &Row<'_>) -> RepoResult<Article> {
    let article_id: ArticleId = row.get("id")?;
    let millis: i64 = row.get("modification_time")?;
    let modification_time = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "modification_time `{millis}` out of range for article {article_id}"
        ))
    })?;

    Ok(Article {
        id: Some(article_id),
        source_path: row.get("source_path")?,
        destination_path: row.get("destination_path")?,
        title: row.get("title")?,
        modification_time,
        summary: row.get("summary")?,
        tags: Vec::new(),
        series: row.get("series")?,
        is_draft: read_bool(row, "is_draft")?,
        is_special_page: read_bool(row, "is_special_page")?,
        presentation: PresentationFlags {
            anchors: read_bool(row, "anchors")?,
            table_of_contents: read_bool(row, "table_of_contents")?,
            timeline: read_bool(row, "timeline")?,
            show_source_link: read_bool(row, "show_source_link")?,
            live_updates: read_bool(row, "live_updates")?,
            evaluated: read_bool(row, "evaluated")?,
        },
        is_deleted: read_bool(row, "is_deleted")?,
    })
}

fn read_bool(row: &Row<'_>, column: &str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid {column} value `{other}` in articles.{column}"
        ))),
    }
}

fn load_tags_for_article(conn: &Connection, article_id: ArticleId) -> RepoResult<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT id, article_id, name
         FROM tags
         WHERE article_id = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([article_id])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        tags.push(Tag {
            id: Some(row.get("id")?),
            article_id: Some(row.get("article_id")?),
            name: row.get("name")?,
        });
    }
    Ok(tags)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_article_schema_ready(conn: &Connection) -> RepoResult<()> {
    for (table, columns) in [("articles", ARTICLE_COLUMNS), ("tags", TAG_COLUMNS)] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
