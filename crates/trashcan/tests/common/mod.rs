//! Shared fixtures: an articles/comments/users dataset in a memory store.
#![allow(dead_code)]

use std::sync::Arc;

use trashcan::{
    Association, Column, FixedClock, JoinTable, Outcome, Record, SaveStrategy, Session, SqlType,
    Table, TableSchema, TrashConfig, Value,
};
use trashcan_memory::MemoryStore;

/// Clock value every trash operation in the fixtures writes.
pub const NOW: i64 = 1_700_000_000_000_000;
/// Trash timestamp of the rows that start out trashed.
pub const EARLIER: i64 = 1_600_000_000_000_000;

pub fn unwrap_outcome<T>(outcome: Outcome<T, trashcan::Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub fn unwrap_err<T>(outcome: Outcome<T, trashcan::Error>) -> trashcan::Error {
    match outcome {
        Outcome::Ok(_) => panic!("expected an error"),
        Outcome::Err(e) => e,
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

fn trashed_at(micros: Option<i64>) -> Value {
    micros.map_or(Value::Null, Value::Timestamp)
}

fn article(id: i32, title: &str, trashed: Option<i64>) -> Record {
    Record::new()
        .with("id", id)
        .with("title", title)
        .with("trashed", trashed_at(trashed))
}

fn comment(id: i32, article_id: i32, body: &str, trashed: Option<i64>) -> Record {
    Record::new()
        .with("id", id)
        .with("article_id", article_id)
        .with("body", body)
        .with("trashed", trashed_at(trashed))
}

fn link(article_id: i32, user_id: i32) -> Record {
    Record::new()
        .with("article_id", article_id)
        .with("user_id", user_id)
}

pub fn articles_schema() -> TableSchema {
    TableSchema::new("articles")
        .column(Column::new("id", SqlType::Integer).not_null())
        .column(Column::new("title", SqlType::VarChar(255)))
        .column(Column::new("trashed", SqlType::DateTime))
}

pub fn comments_schema() -> TableSchema {
    TableSchema::new("comments")
        .column(Column::new("id", SqlType::Integer).not_null())
        .column(Column::new("article_id", SqlType::Integer))
        .column(Column::new("body", SqlType::Text))
        .column(Column::new("trashed", SqlType::DateTime))
}

pub fn composite_schema() -> TableSchema {
    TableSchema::new("composite_articles_users")
        .column(Column::new("article_id", SqlType::Integer).not_null())
        .column(Column::new("user_id", SqlType::Integer).not_null())
        .column(Column::new("trashed", SqlType::DateTime))
        .primary_key(["article_id", "user_id"])
}

pub fn links_schema() -> TableSchema {
    TableSchema::new("articles_users")
        .column(Column::new("article_id", SqlType::Integer).not_null())
        .column(Column::new("user_id", SqlType::Integer).not_null())
        .primary_key(["article_id", "user_id"])
}

pub fn users_schema() -> TableSchema {
    TableSchema::new("users")
        .column(Column::new("id", SqlType::Integer).not_null())
        .column(Column::new("name", SqlType::VarChar(255)))
}

/// Store holding:
///
/// - articles 1 (live), 2 and 3 (trashed)
/// - comments 1 (article 1), 2 (article 1, trashed), 3 (article 2)
/// - composite rows (1,1) and (3,1)
/// - join rows (1,1) and (3,1) and user 1
pub fn store() -> MemoryStore {
    let store = MemoryStore::new();
    for schema in [
        articles_schema(),
        comments_schema(),
        composite_schema(),
        links_schema(),
        users_schema(),
    ] {
        store.create_table(schema).expect("create fixture table");
    }
    store
        .load_fixtures(
            "articles",
            [
                article(1, "First Article", None),
                article(2, "Second Article", Some(EARLIER)),
                article(3, "Third Article", Some(EARLIER)),
            ],
        )
        .expect("load articles");
    store
        .load_fixtures(
            "comments",
            [
                comment(1, 1, "First Comment for First Article", None),
                comment(2, 1, "Second Comment for First Article", Some(EARLIER)),
                comment(3, 2, "First Comment for Second Article", None),
            ],
        )
        .expect("load comments");
    store
        .load_fixtures(
            "composite_articles_users",
            [
                link(1, 1).with("trashed", Value::Null),
                link(3, 1).with("trashed", Value::Null),
            ],
        )
        .expect("load composite rows");
    store
        .load_fixtures("articles_users", [link(1, 1), link(3, 1)])
        .expect("load join rows");
    store
        .load_fixtures("users", [Record::new().with("id", 1).with("name", "mariano")])
        .expect("load users");
    store
}

pub fn articles_table() -> Table {
    articles_table_with(TrashConfig::new())
}

pub fn articles_table_with(config: TrashConfig) -> Table {
    Table::new("Articles", articles_schema())
        .association(
            Association::has_many("Articles", "Comments", ["article_id"])
                .dependent(true)
                .cascade_callbacks(true)
                .save_strategy(SaveStrategy::Replace),
        )
        .association(
            Association::has_many("Articles", "CompositeArticlesUsers", ["article_id"])
                .dependent(true)
                .cascade_callbacks(true),
        )
        .association(Association::belongs_to_many(
            "Articles",
            "Users",
            JoinTable::new("ArticlesUsers", ["article_id"], ["user_id"]),
        ))
        .with_trash(config)
        .expect("articles trash config")
}

pub fn session_over(store: MemoryStore, articles: Table) -> (Session<MemoryStore>, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(NOW));
    let mut session = Session::new(store).with_clock(clock.clone());
    session
        .add_table(articles)
        .add_table(
            Table::new("Comments", comments_schema())
                .association(Association::belongs_to("Comments", "Articles", ["article_id"]))
                .with_trash(TrashConfig::new())
                .expect("comments trash config"),
        )
        .add_table(
            Table::new("CompositeArticlesUsers", composite_schema())
                .association(Association::belongs_to(
                    "CompositeArticlesUsers",
                    "Articles",
                    ["article_id"],
                ))
                .with_trash(TrashConfig::new())
                .expect("composite trash config"),
        )
        .add_table(Table::new("ArticlesUsers", links_schema()))
        .add_table(
            Table::new("Users", users_schema()).association(Association::belongs_to_many(
                "Users",
                "Articles",
                JoinTable::new("ArticlesUsers", ["user_id"], ["article_id"]),
            )),
        );
    (session, clock)
}

pub fn session() -> (Session<MemoryStore>, Arc<FixedClock>) {
    session_over(store(), articles_table())
}

/// Stored trash value of the row of `table` whose `field` equals `value`.
pub fn stored_trash(store: &MemoryStore, table: &str, field: &str, value: i32) -> Value {
    store
        .rows(table)
        .expect("fixture table")
        .into_iter()
        .find(|row| row.get(field).and_then(|v| v.sql_eq(&Value::from(value))) == Some(true))
        .and_then(|row| row.get("trashed").cloned())
        .expect("fixture row")
}
