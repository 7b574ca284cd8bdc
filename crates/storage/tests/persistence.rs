#![forbid(unsafe_code)]

use rt_core::{ReportTree, Severity, TreeQuery};
use rt_storage::{SqliteStore, StoreConfig};
use rusqlite::{Connection, params};
use std::time::Duration;
use tempfile::TempDir;

fn forest() -> Vec<ReportTree> {
    vec![ReportTree::section(
        "deploy",
        vec![
            ReportTree::leaf("pushed image", Severity::Info),
            ReportTree::leaf("health check slow", Severity::Warn),
        ],
    )]
}

#[test]
fn trees_survive_reopen() {
    let dir = TempDir::new().expect("temp dir");
    let first_root = {
        let mut store = SqliteStore::open(dir.path()).expect("open store");
        store
            .create_or_append_tree("deploy/1", &forest(), false)
            .expect("append")
            .root_id
    };

    let mut store = SqliteStore::open(dir.path()).expect("reopen store");
    assert_eq!(store.storage_dir(), dir.path());
    let tree = store
        .get_tree("deploy/1", &TreeQuery::default())
        .expect("get tree")
        .expect("tree exists");
    assert_eq!(tree.node.id, first_root);
    assert_eq!(tree.node_count(), 4);

    let receipt = store
        .create_or_append_tree("deploy/1", &forest(), false)
        .expect("append after reopen");
    assert!(!receipt.created);
    assert!(receipt.span.expect("span").order > tree.node.end_order);
}

#[test]
fn schema_is_versioned_and_journaled_in_wal_mode() {
    let dir = TempDir::new().expect("temp dir");
    {
        let _store = SqliteStore::open(dir.path()).expect("open store");
    }

    let conn = Connection::open(dir.path().join("reportree.db")).expect("open db");
    let version: String = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .expect("schema version");
    assert_eq!(version, "v1");

    let journal: String = conn
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .expect("journal mode");
    assert_eq!(journal.to_ascii_lowercase(), "wal");

    for table in ["meta", "counters", "report_roots", "report_nodes"] {
        let found: i64 = conn
            .query_row(
                "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .expect("table lookup");
        assert_eq!(found, 1, "missing table {table}");
    }
}

#[test]
fn uncommitted_rows_are_not_visible_after_reopen() {
    let dir = TempDir::new().expect("temp dir");
    {
        let _store = SqliteStore::open(dir.path()).expect("open store");
    }

    {
        let mut conn = Connection::open(dir.path().join("reportree.db")).expect("open db");
        let tx = conn.transaction().expect("begin tx");
        tx.execute(
            "INSERT INTO report_nodes(id, parent_id, root_id, ord, end_ord, is_leaf, message, severity) \
             VALUES (1, NULL, 1, 0, 0, 0, 'ghost', NULL)",
            [],
        )
        .expect("insert node");
        tx.execute(
            "INSERT INTO report_roots(root_key, root_id, created_at_ms, updated_at_ms) \
             VALUES ('ghost', 1, 0, 0)",
            [],
        )
        .expect("insert root");
        // Dropped without commit.
    }

    let store = SqliteStore::open(dir.path()).expect("reopen store");
    assert!(!store.root_exists("ghost").expect("root exists"));
}

#[test]
fn concurrent_writers_never_interleave_intervals() {
    let dir = TempDir::new().expect("temp dir");
    let config = StoreConfig {
        busy_timeout: Duration::from_secs(30),
        ..StoreConfig::default()
    };
    {
        let _store = SqliteStore::open_with(dir.path(), config.clone()).expect("open store");
    }

    const WRITERS: usize = 4;
    const APPENDS: usize = 5;
    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let path = dir.path().to_path_buf();
            let config = config.clone();
            std::thread::spawn(move || {
                let mut store = SqliteStore::open_with(&path, config).expect("open store");
                for step in 0..APPENDS {
                    let section = ReportTree::section(
                        format!("writer {writer} step {step}"),
                        vec![ReportTree::leaf("ok", Severity::Info)],
                    );
                    store
                        .create_or_append_tree("shared", &[section], false)
                        .expect("append");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread");
    }

    let mut store = SqliteStore::open_with(dir.path(), config).expect("open store");
    assert_eq!(store.config().busy_timeout, Duration::from_secs(30));
    let tree = store
        .get_tree("shared", &TreeQuery::default())
        .expect("get tree")
        .expect("tree exists");
    assert_eq!(tree.children.len(), WRITERS * APPENDS);
    assert_eq!(tree.node.end_order, (WRITERS * APPENDS * 2) as i64);
    for (index, section) in tree.children.iter().enumerate() {
        let order = 1 + 2 * index as i64;
        assert_eq!(section.node.order, order);
        assert_eq!(section.node.end_order, order + 1);
        assert_eq!(section.children.len(), 1);
    }

    let roots = store.list_roots(10, 0).expect("list roots");
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].node_count, 1 + (WRITERS * APPENDS * 2) as i64);
}
