#![forbid(unsafe_code)]

use super::StoreError;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, params};

pub(crate) const SCHEMA_VERSION: &str = "v1";

/// SQL name of the message case fold shared with in-memory filtering.
pub(crate) const FOLD_CASE_FN: &str = "rt_fold_case";

const SQL: &str = r#"
    PRAGMA journal_mode=WAL;
    PRAGMA synchronous=NORMAL;

    CREATE TABLE IF NOT EXISTS meta (
      key TEXT PRIMARY KEY,
      value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS counters (
      name TEXT PRIMARY KEY,
      value INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS report_roots (
      root_key TEXT PRIMARY KEY,
      root_id INTEGER NOT NULL UNIQUE,
      created_at_ms INTEGER NOT NULL,
      updated_at_ms INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS report_nodes (
      id INTEGER PRIMARY KEY,
      parent_id INTEGER,
      root_id INTEGER NOT NULL,
      ord INTEGER NOT NULL,
      end_ord INTEGER NOT NULL,
      is_leaf INTEGER NOT NULL,
      message TEXT NOT NULL,
      severity TEXT,
      CHECK (end_ord >= ord)
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_report_nodes_root_ord ON report_nodes(root_id, ord);
    CREATE INDEX IF NOT EXISTS idx_report_nodes_root_leaf ON report_nodes(root_id, is_leaf, ord);
    CREATE INDEX IF NOT EXISTS idx_report_nodes_root_message ON report_nodes(root_id, message);
"#;

pub(crate) fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
        params!["schema_version", SCHEMA_VERSION],
    )?;
    Ok(())
}

/// Per-connection scalar functions; must run before any filtered query.
pub(crate) fn register_functions(conn: &Connection) -> Result<(), StoreError> {
    conn.create_scalar_function(
        FOLD_CASE_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|text| rt_core::fold_case(&text)))
        },
    )?;
    Ok(())
}
