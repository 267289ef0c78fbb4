use chrono::{DateTime, TimeZone, Utc};
use pankat_core::db::{open_db, open_db_in_memory};
use pankat_core::{
    Article, ArticleRepository, ArticleStore, ArticleValidationError, Lookup, RemoveMode,
    RepoError, SqliteArticleStore,
};
use rusqlite::Connection;

fn at(year: i32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
}

fn article(name: &str, year: i32) -> Article {
    Article::new(
        format!("/home/user/documents/{name}.mdwn"),
        format!("/home/user/documents/{name}.html"),
        name,
        at(year),
    )
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

#[test]
fn add_assigns_id_and_returns_persisted_tags() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());

    let stored = repo
        .add(&article("foo", 2019).with_tags(["Linux", "Go"]))
        .unwrap();

    let id = stored.id.unwrap();
    assert_eq!(stored.title, "foo");
    assert_eq!(stored.modification_time, at(2019));
    assert_eq!(stored.tag_names(), vec!["Linux", "Go"]);
    for tag in &stored.tags {
        assert!(tag.id.is_some());
        assert_eq!(tag.article_id, Some(id));
    }
}

#[test]
fn repeated_add_of_same_source_path_keeps_one_row() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());
        let about = article("about", 2024);
        let first = repo.add(&about).unwrap();
        let second = repo.add(&about).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(repo.query_all().unwrap().len(), 1);
    }
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM articles;"), 1);
}

#[test]
fn re_adding_updates_fields_and_replaces_tag_set() {
    let mut conn = open_db_in_memory().unwrap();
    let original_id = {
        let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());
        let original = repo
            .add(&article("foo", 2019).with_tags(["Linux", "Go"]))
            .unwrap();

        let mut changed = article("foo", 2021).with_tags(["Rust"]).with_series("Tools");
        changed.title = "foo revisited".to_string();
        changed.presentation.timeline = true;
        let updated = repo.add(&changed).unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.title, "foo revisited");
        assert_eq!(updated.modification_time, at(2021));
        assert_eq!(updated.series, "Tools");
        assert!(updated.presentation.timeline);
        assert_eq!(updated.tag_names(), vec!["Rust"]);
        original.id.unwrap()
    };

    let tag_rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM tags WHERE article_id = ?1;",
            [original_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tag_rows, 1);
}

#[test]
fn same_tag_name_on_two_articles_is_two_rows() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());
        repo.add(&article("foo", 2019).with_tags(["Linux"])).unwrap();
        repo.add(&article("batz", 2010).with_tags(["Linux"])).unwrap();
    }
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM tags WHERE name = 'Linux';"),
        2
    );
}

#[test]
fn presentation_flags_and_attributes_pass_through() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());

    let mut input = article("flags", 2020).with_summary("flag summary");
    input.presentation.anchors = true;
    input.presentation.table_of_contents = true;
    input.presentation.show_source_link = true;
    input.presentation.live_updates = true;
    input.presentation.evaluated = true;
    repo.add(&input).unwrap();

    let loaded = repo
        .query_raw_by_source_path("/home/user/documents/flags.mdwn")
        .unwrap();
    assert_eq!(loaded.presentation, input.presentation);
    assert!(!loaded.presentation.timeline);
    assert_eq!(loaded.summary, "flag summary");
    assert_eq!(loaded.destination_path, "/home/user/documents/flags.html");
}

#[test]
fn modification_time_is_stored_at_millisecond_precision() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());

    let precise = Utc.timestamp_opt(1_600_000_000, 123_456_789).unwrap();
    let stored = repo
        .add(&Article::new("/p.mdwn", "/p.html", "p", precise))
        .unwrap();
    assert_eq!(
        stored.modification_time,
        Utc.timestamp_opt(1_600_000_000, 123_000_000).unwrap()
    );
}

#[test]
fn delete_removes_article_and_cascades_tags() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());
        repo.add(&article("foo", 2019).with_tags(["Linux", "Go"]))
            .unwrap();
        let mut draft = article("mydraft", 2024).with_tags(["Go", "Linux"]);
        draft.is_draft = true;
        repo.add(&draft).unwrap();

        repo.delete("/home/user/documents/mydraft.mdwn").unwrap();

        assert_eq!(repo.query_all().unwrap().len(), 1);
        let err = repo
            .query_raw_by_source_path("/home/user/documents/mydraft.mdwn")
            .unwrap_err();
        assert!(err.is_not_found());
    }

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM tags;"), 2);
    assert_eq!(
        count(
            &conn,
            "SELECT COUNT(*) FROM tags WHERE article_id NOT IN (SELECT id FROM articles);"
        ),
        0
    );
}

#[test]
fn delete_of_absent_article_is_not_an_error() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());
    repo.delete("/nowhere.mdwn").unwrap();
}

#[test]
fn soft_delete_hides_article_until_restored() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());
    let path = "/home/user/documents/foo.mdwn";
    repo.add(&article("foo", 2019).with_tags(["Linux"])).unwrap();

    repo.soft_delete(path).unwrap();
    assert!(repo.query_all().unwrap().is_empty());
    assert!(repo.tags().unwrap().is_empty());
    assert!(repo.query_raw_by_source_path(path).unwrap_err().is_not_found());

    repo.restore(path).unwrap();
    let restored = repo.query_raw_by_source_path(path).unwrap();
    assert!(!restored.is_deleted);
    assert_eq!(restored.tag_names(), vec!["Linux"]);
}

#[test]
fn soft_delete_and_restore_report_missing_rows() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());

    match repo.soft_delete("/missing.mdwn").unwrap_err() {
        RepoError::NotFound(Lookup::SourcePath(path)) => assert_eq!(path, "/missing.mdwn"),
        other => panic!("unexpected error: {other}"),
    }

    repo.add(&article("foo", 2019)).unwrap();
    assert!(repo
        .restore("/home/user/documents/foo.mdwn")
        .unwrap_err()
        .is_not_found());
}

#[test]
fn re_adding_soft_deleted_article_revives_same_row() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());

    let first = repo.add(&article("foo", 2019)).unwrap();
    repo.soft_delete("/home/user/documents/foo.mdwn").unwrap();
    let revived = repo.add(&article("foo", 2020)).unwrap();

    assert_eq!(revived.id, first.id);
    assert!(!revived.is_deleted);
    assert_eq!(repo.articles().unwrap().len(), 1);
}

#[test]
fn add_ignores_deleted_marker_on_input() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());
    let first = repo.add(&article("foo", 2019)).unwrap();

    let mut stale = article("foo", 2020);
    stale.is_deleted = true;
    let stored = repo.add(&stale).unwrap();
    assert_eq!(stored.id, first.id);
    assert!(!stored.is_deleted);
    assert_eq!(stored.modification_time, at(2020));
    assert_eq!(repo.articles().unwrap().len(), 1);

    let mut fresh = article("bar", 2021);
    fresh.is_deleted = true;
    assert!(!repo.add(&fresh).unwrap().is_deleted);
    assert_eq!(repo.articles().unwrap().len(), 2);
}

fn reject_tag_inserts(conn: &Connection) {
    conn.execute_batch(
        "CREATE TRIGGER reject_tags BEFORE INSERT ON tags
         BEGIN
            SELECT RAISE(ABORT, 'tag insert rejected');
         END;",
    )
    .unwrap();
}

#[test]
fn failed_tag_replacement_keeps_previous_row_and_tags() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());
        repo.add(&article("foo", 2019).with_tags(["Linux", "Go"]))
            .unwrap();
    }
    reject_tag_inserts(&conn);

    let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());
    let err = repo
        .add(&article("foo", 2023).with_tags(["Rust"]))
        .unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));

    let kept = repo
        .query_raw_by_source_path("/home/user/documents/foo.mdwn")
        .unwrap();
    assert_eq!(kept.modification_time, at(2019));
    assert_eq!(kept.tag_names(), vec!["Linux", "Go"]);
}

#[test]
fn add_all_rolls_back_when_a_later_row_fails() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());
        repo.add(&article("foo", 2019).with_tags(["Linux", "Go"]))
            .unwrap();
    }
    reject_tag_inserts(&conn);

    let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());
    let err = repo
        .add_all(&[
            article("bar", 2022),
            article("foo", 2023).with_tags(["Rust"]),
        ])
        .unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));

    let all = repo.query_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].modification_time, at(2019));
    assert_eq!(all[0].tag_names(), vec!["Linux", "Go"]);
}

#[test]
fn add_all_is_atomic() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());

    let ids = repo
        .add_all(&[article("foo", 2019), article("bar", 2022)])
        .unwrap();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);

    let err = repo
        .add_all(&[
            article("batz", 2010),
            Article::new("", "", "blank", at(2011)),
        ])
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ArticleValidationError::EmptySourcePath)
    ));
    assert_eq!(repo.query_all().unwrap().len(), 2);
}

#[test]
fn add_all_upserts_repeated_paths_within_batch() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());

    let ids = repo
        .add_all(&[
            article("foo", 2019).with_tags(["Old"]),
            article("foo", 2019).with_tags(["New"]),
        ])
        .unwrap();
    assert_eq!(ids[0], ids[1]);

    let all = repo.query_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].tag_names(), vec!["New"]);
}

#[test]
fn invalid_article_is_rejected_before_write() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());

    let err = repo
        .add(&article("foo", 2019).with_tags(["Go", "Rust", "Go"]))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ArticleValidationError::DuplicateTagName { .. })
    ));
    assert!(repo.query_all().unwrap().is_empty());
}

#[test]
fn store_requires_provisioned_schema() {
    let mut conn = Connection::open_in_memory().unwrap();
    match SqliteArticleStore::try_new(&mut conn) {
        Err(RepoError::MissingRequiredTable(table)) => assert_eq!(table, "articles"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("bare connection must be rejected"),
    }
}

#[test]
fn store_primitives_report_affected_rows() {
    let mut conn = open_db_in_memory().unwrap();
    let mut store = SqliteArticleStore::try_new(&mut conn).unwrap();

    let id = store.persist(&article("foo", 2019)).unwrap();
    assert_eq!(store.persist(&article("foo", 2019)).unwrap(), id);
    assert!(store
        .remove("/home/user/documents/foo.mdwn", RemoveMode::Soft)
        .unwrap());
    assert!(!store
        .remove("/home/user/documents/foo.mdwn", RemoveMode::Soft)
        .unwrap());
    assert!(store.restore("/home/user/documents/foo.mdwn").unwrap());
    assert!(store
        .remove("/home/user/documents/foo.mdwn", RemoveMode::Hard)
        .unwrap());
    assert!(!store
        .remove("/home/user/documents/foo.mdwn", RemoveMode::Hard)
        .unwrap());
}

#[test]
fn articles_survive_reopening_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pankat.db");

    {
        let mut conn = open_db(&path).unwrap();
        let mut repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());
        repo.add(&article("foo", 2019).with_tags(["Linux", "Go"]))
            .unwrap();
    }

    let mut conn = open_db(&path).unwrap();
    let repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn).unwrap());
    let loaded = repo
        .query_raw_by_source_path("/home/user/documents/foo.mdwn")
        .unwrap();
    assert_eq!(loaded.tag_names(), vec!["Linux", "Go"]);

    let mut store = repo.into_inner();
    assert!(store
        .remove("/home/user/documents/foo.mdwn", RemoveMode::Hard)
        .unwrap());
}
