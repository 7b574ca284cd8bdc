#![forbid(unsafe_code)]

mod error;
mod nodes;
mod schema;

pub use error::StoreError;

use nodes::SqliteNodes;
use rt_core::ids::{NodeId, RootKey};
use rt_core::{
    AppendReceipt, EncodeOptions, LogPage, LogQuery, ReportTree, TreeError, TreeNode, TreeQuery,
};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const DB_FILE: &str = "reportree.db";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Longer messages are cut on a char boundary when written.
    pub max_message_len: usize,
    /// How long a connection waits on another process's write lock.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_message_len: rt_core::DEFAULT_MAX_MESSAGE_LEN,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootSummary {
    pub root_key: String,
    pub root_id: NodeId,
    pub node_count: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

pub struct SqliteStore {
    storage_dir: PathBuf,
    conn: Connection,
    config: StoreConfig,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(storage_dir, StoreConfig::default())
    }

    pub fn open_with(storage_dir: impl AsRef<Path>, config: StoreConfig) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;
        let db_path = storage_dir.join(DB_FILE);
        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(config.busy_timeout)?;
        schema::register_functions(&conn)?;
        schema::migrate(&conn)?;
        info!(path = %db_path.display(), version = schema::SCHEMA_VERSION, "report store opened");
        Ok(Self {
            storage_dir,
            conn,
            config,
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Appends `forest` under the tree keyed by `root_key`, creating the tree if needed. With
    /// `overwrite` the existing descendants are dropped first. All-or-nothing.
    pub fn create_or_append_tree(
        &mut self,
        root_key: &str,
        forest: &[ReportTree],
        overwrite: bool,
    ) -> Result<AppendReceipt, StoreError> {
        let key = parse_root_key(root_key)?;
        let options = EncodeOptions {
            max_message_len: self.config.max_message_len,
        };
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let receipt = {
            let mut nodes = SqliteNodes::new(&tx, now_ms());
            rt_core::create_or_append_tree(&mut nodes, &key, forest, overwrite, &options)?
        };
        tx.commit()?;
        Ok(receipt)
    }

    pub fn get_tree(
        &mut self,
        root_key: &str,
        query: &TreeQuery,
    ) -> Result<Option<TreeNode>, StoreError> {
        let key = parse_root_key(root_key)?;
        let tx = self.conn.transaction()?;
        let tree = {
            let nodes = SqliteNodes::new(&tx, now_ms());
            not_found_as_none(rt_core::load_tree(&nodes, &key, query))?
        };
        tx.commit()?;
        Ok(tree)
    }

    pub fn get_subtree(
        &mut self,
        id: NodeId,
        query: &TreeQuery,
    ) -> Result<Option<TreeNode>, StoreError> {
        let tx = self.conn.transaction()?;
        let tree = {
            let nodes = SqliteNodes::new(&tx, now_ms());
            not_found_as_none(rt_core::load_subtree(&nodes, id, query))?
        };
        tx.commit()?;
        Ok(tree)
    }

    /// Filtered page of leaf entries. Unknown trees fail with `UnknownId`.
    pub fn list_logs(&mut self, root_key: &str, query: &LogQuery) -> Result<LogPage, StoreError> {
        let key = parse_root_key(root_key)?;
        let tx = self.conn.transaction()?;
        let page = {
            let nodes = SqliteNodes::new(&tx, now_ms());
            rt_core::list_logs(&nodes, &key, query)?
        };
        tx.commit()?;
        Ok(page)
    }

    pub fn delete_tree(&mut self, root_key: &str) -> Result<usize, StoreError> {
        let key = parse_root_key(root_key)?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed = {
            let mut nodes = SqliteNodes::new(&tx, now_ms());
            rt_core::delete_tree(&mut nodes, &key)?
        };
        tx.commit()?;
        Ok(removed)
    }

    /// Removes node `id` and everything under it. Unknown ids remove nothing.
    pub fn delete_subtree(&mut self, id: NodeId) -> Result<usize, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed = {
            let mut nodes = SqliteNodes::new(&tx, now_ms());
            rt_core::delete_subtree(&mut nodes, id)?
        };
        tx.commit()?;
        Ok(removed)
    }

    /// Removes every non-root subtree whose head message equals `message` across the trees
    /// keyed by `root_keys`. Keys without a tree are skipped.
    pub fn delete_subtrees_by_name<K: AsRef<str>>(
        &mut self,
        root_keys: &[K],
        message: &str,
    ) -> Result<usize, StoreError> {
        let keys = root_keys
            .iter()
            .map(|key| parse_root_key(key.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed = {
            let mut nodes = SqliteNodes::new(&tx, now_ms());
            rt_core::delete_subtrees_by_name(&mut nodes, &keys, message)?
        };
        tx.commit()?;
        Ok(removed)
    }

    pub fn list_roots(&self, limit: usize, offset: usize) -> Result<Vec<RootSummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT r.root_key, r.root_id, r.created_at_ms, r.updated_at_ms,
                   (SELECT COUNT(1) FROM report_nodes n WHERE n.root_id = r.root_id)
            FROM report_roots r
            ORDER BY r.root_key ASC
            LIMIT ?1 OFFSET ?2
            "#,
        )?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], |row| {
            Ok(RootSummary {
                root_key: row.get(0)?,
                root_id: NodeId::new(row.get(1)?),
                created_at_ms: row.get(2)?,
                updated_at_ms: row.get(3)?,
                node_count: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn root_exists(&self, root_key: &str) -> Result<bool, StoreError> {
        let key = parse_root_key(root_key)?;
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM report_roots WHERE root_key = ?1",
                params![key.as_str()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn parse_root_key(raw: &str) -> Result<RootKey, StoreError> {
    RootKey::try_new(raw).map_err(|err| StoreError::InvalidInput(err.message()))
}

fn not_found_as_none<T>(result: Result<T, TreeError>) -> Result<Option<T>, StoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(TreeError::NotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn now_ms() -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    now.as_millis() as i64
}
