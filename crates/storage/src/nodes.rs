#![forbid(unsafe_code)]

use rt_core::ids::{NodeId, RootKey};
use rt_core::{
    LeafFilter, LogPage, NodeStore, PageRequest, ReportNode, Severity, SubtreeSpan,
    TreeError,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

const NODE_COLUMNS: &str =
    "n.id, n.parent_id, n.root_id, n.ord, n.end_ord, n.is_leaf, n.message, n.severity";

/// `NodeStore` over one SQLite connection, normally borrowed from an open transaction.
pub(crate) struct SqliteNodes<'c> {
    conn: &'c Connection,
    now_ms: i64,
}

impl<'c> SqliteNodes<'c> {
    pub(crate) fn new(conn: &'c Connection, now_ms: i64) -> Self {
        Self { conn, now_ms }
    }
}

#[derive(Debug)]
struct UnknownSeverity(String);

impl std::fmt::Display for UnknownSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown severity {:?}", self.0)
    }
}

impl std::error::Error for UnknownSeverity {}

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<ReportNode> {
    let severity = match row.get::<_, Option<String>>(7)? {
        None => None,
        Some(raw) => Some(Severity::parse(&raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(UnknownSeverity(raw)))
        })?),
    };
    Ok(ReportNode {
        id: NodeId::new(row.get(0)?),
        parent_id: row.get::<_, Option<i64>>(1)?.map(NodeId::new),
        root_id: NodeId::new(row.get(2)?),
        order: row.get(3)?,
        end_order: row.get(4)?,
        is_leaf: row.get(5)?,
        message: row.get(6)?,
        severity,
    })
}

fn json_array<T: Into<serde_json::Value>>(items: impl IntoIterator<Item = T>) -> String {
    serde_json::Value::Array(items.into_iter().map(Into::into).collect()).to_string()
}

impl SqliteNodes<'_> {
    fn root_sql(&self, key: &RootKey) -> rusqlite::Result<Option<ReportNode>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {NODE_COLUMNS} FROM report_roots r \
                     JOIN report_nodes n ON n.id = r.root_id \
                     WHERE r.root_key = ?1"
                ),
                params![key.as_str()],
                node_from_row,
            )
            .optional()
    }

    fn roots_sql(&self, keys_json: &str) -> rusqlite::Result<Vec<ReportNode>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NODE_COLUMNS} FROM report_roots r \
             JOIN report_nodes n ON n.id = r.root_id \
             WHERE r.root_key IN (SELECT value FROM json_each(?1)) \
             ORDER BY n.id ASC"
        ))?;
        let rows = stmt.query_map(params![keys_json], node_from_row)?;
        rows.collect()
    }

    fn node_sql(&self, id: NodeId) -> rusqlite::Result<Option<ReportNode>> {
        self.conn
            .query_row(
                &format!("SELECT {NODE_COLUMNS} FROM report_nodes n WHERE n.id = ?1"),
                params![id.get()],
                node_from_row,
            )
            .optional()
    }

    fn span_rows_sql(&self, span: SubtreeSpan) -> rusqlite::Result<Vec<ReportNode>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {NODE_COLUMNS} FROM report_nodes n \
             WHERE n.root_id = ?1 AND n.ord BETWEEN ?2 AND ?3 \
             ORDER BY n.ord ASC"
        ))?;
        let rows = stmt.query_map(
            params![span.root_id.get(), span.span.order, span.span.end_order],
            node_from_row,
        )?;
        rows.collect()
    }

    fn find_by_message_sql(
        &self,
        root_ids_json: &str,
        message: &str,
    ) -> rusqlite::Result<Vec<ReportNode>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NODE_COLUMNS} FROM json_each(?1) s \
             JOIN report_nodes n ON n.root_id = s.value \
             WHERE n.message = ?2 AND n.parent_id IS NOT NULL \
             ORDER BY n.root_id ASC, n.ord ASC"
        ))?;
        let rows = stmt.query_map(params![root_ids_json, message], node_from_row)?;
        rows.collect()
    }

    fn leaf_page_sql(
        &self,
        root_id: NodeId,
        filter: &LeafFilter,
        severities_json: Option<&str>,
        page: PageRequest,
    ) -> rusqlite::Result<LogPage> {
        const FILTER: &str = "n.root_id = ?1 AND n.is_leaf = 1 \
             AND (?2 IS NULL OR n.severity IN (SELECT value FROM json_each(?2))) \
             AND (?3 IS NULL \
                  OR (?4 = 'exact' AND n.message = ?3) \
                  OR (?4 = 'substring' AND instr(rt_fold_case(n.message), rt_fold_case(?3)) > 0))";

        let message = filter.message.as_deref();
        let mode = filter.message_match.as_str();
        let total_count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(1) FROM report_nodes n WHERE {FILTER}"),
            params![root_id.get(), severities_json, message, mode],
            |row| row.get(0),
        )?;

        let offset = page
            .offset()
            .and_then(|offset| i64::try_from(offset).ok())
            .filter(|offset| *offset < total_count);
        let items = match offset {
            None => Vec::new(),
            Some(offset) => {
                let mut stmt = self.conn.prepare_cached(&format!(
                    "SELECT {NODE_COLUMNS} FROM report_nodes n WHERE {FILTER} \
                     ORDER BY n.ord ASC LIMIT ?5 OFFSET ?6"
                ))?;
                let rows = stmt.query_map(
                    params![
                        root_id.get(),
                        severities_json,
                        message,
                        mode,
                        i64::from(page.page_size()),
                        offset
                    ],
                    node_from_row,
                )?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        Ok(LogPage {
            items,
            total_count: total_count as u64,
            page,
        })
    }

    fn reserve_ids_sql(&self, count: i64) -> rusqlite::Result<i64> {
        let current: i64 = self
            .conn
            .query_row(
                "SELECT value FROM counters WHERE name = 'node_id'",
                [],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);
        self.conn.execute(
            r#"
            INSERT INTO counters(name, value) VALUES ('node_id', ?1)
            ON CONFLICT(name) DO UPDATE SET value=excluded.value
            "#,
            params![current + count],
        )?;
        Ok(current + 1)
    }

    fn insert_nodes_sql(&self, nodes: &[ReportNode]) -> rusqlite::Result<()> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            INSERT INTO report_nodes(id, parent_id, root_id, ord, end_ord, is_leaf, message, severity)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )?;
        for node in nodes {
            stmt.execute(params![
                node.id.get(),
                node.parent_id.map(NodeId::get),
                node.root_id.get(),
                node.order,
                node.end_order,
                node.is_leaf,
                node.message,
                node.severity.map(Severity::as_str),
            ])?;
        }
        Ok(())
    }

    fn insert_root_sql(&self, key: &RootKey, root: &ReportNode) -> rusqlite::Result<()> {
        self.insert_nodes_sql(std::slice::from_ref(root))?;
        self.conn.execute(
            r#"
            INSERT INTO report_roots(root_key, root_id, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?3)
            "#,
            params![key.as_str(), root.id.get(), self.now_ms],
        )?;
        Ok(())
    }

    fn set_end_order_sql(&self, id: NodeId, end_order: i64) -> rusqlite::Result<()> {
        self.conn.execute(
            "UPDATE report_nodes SET end_ord = ?2 WHERE id = ?1",
            params![id.get(), end_order],
        )?;
        self.conn.execute(
            "UPDATE report_roots SET updated_at_ms = ?2 WHERE root_id = ?1",
            params![id.get(), self.now_ms],
        )?;
        Ok(())
    }

    fn delete_spans_sql(&self, spans_json: &str) -> rusqlite::Result<usize> {
        self.conn.execute(
            r#"
            DELETE FROM report_nodes WHERE id IN (
              SELECT n.id FROM json_each(?1) s
              JOIN report_nodes n
                ON n.root_id = json_extract(s.value, '$[0]')
               AND n.ord BETWEEN json_extract(s.value, '$[1]') AND json_extract(s.value, '$[2]')
            )
            "#,
            params![spans_json],
        )
    }

    fn forget_root_sql(&self, root_id: NodeId) -> rusqlite::Result<()> {
        self.conn.execute(
            "DELETE FROM report_roots WHERE root_id = ?1",
            params![root_id.get()],
        )?;
        Ok(())
    }
}

impl NodeStore for SqliteNodes<'_> {
    fn root(&self, key: &RootKey) -> Result<Option<ReportNode>, TreeError> {
        self.root_sql(key).map_err(TreeError::unavailable)
    }

    fn roots(&self, keys: &[RootKey]) -> Result<Vec<ReportNode>, TreeError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let keys = json_array(keys.iter().map(RootKey::as_str));
        self.roots_sql(&keys).map_err(TreeError::unavailable)
    }

    fn node(&self, id: NodeId) -> Result<Option<ReportNode>, TreeError> {
        self.node_sql(id).map_err(TreeError::unavailable)
    }

    fn span_rows(&self, span: SubtreeSpan) -> Result<Vec<ReportNode>, TreeError> {
        self.span_rows_sql(span).map_err(TreeError::unavailable)
    }

    fn find_by_message(
        &self,
        root_ids: &[NodeId],
        message: &str,
    ) -> Result<Vec<ReportNode>, TreeError> {
        if root_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<i64> = root_ids.iter().map(|id| id.get()).collect();
        ids.sort_unstable();
        ids.dedup();
        self.find_by_message_sql(&json_array(ids), message)
            .map_err(TreeError::unavailable)
    }

    fn leaf_page(
        &self,
        root_id: NodeId,
        filter: &LeafFilter,
        page: PageRequest,
    ) -> Result<LogPage, TreeError> {
        let severities_json = (!filter.severities.is_empty())
            .then(|| json_array(filter.severities.iter().map(Severity::as_str)));
        self.leaf_page_sql(root_id, filter, severities_json.as_deref(), page)
            .map_err(TreeError::unavailable)
    }

    fn reserve_ids(&mut self, count: u64) -> Result<NodeId, TreeError> {
        let count = i64::try_from(count).map_err(|_| TreeError::InvalidInput("id block too large"))?;
        self.reserve_ids_sql(count)
            .map(NodeId::new)
            .map_err(TreeError::unavailable)
    }

    fn insert_root(&mut self, key: &RootKey, root: &ReportNode) -> Result<(), TreeError> {
        self.insert_root_sql(key, root)
            .map_err(TreeError::unavailable)
    }

    fn insert_nodes(&mut self, nodes: &[ReportNode]) -> Result<(), TreeError> {
        self.insert_nodes_sql(nodes).map_err(TreeError::unavailable)
    }

    fn set_end_order(&mut self, id: NodeId, end_order: i64) -> Result<(), TreeError> {
        self.set_end_order_sql(id, end_order)
            .map_err(TreeError::unavailable)
    }

    fn delete_spans(&mut self, spans: &[SubtreeSpan]) -> Result<usize, TreeError> {
        if spans.is_empty() {
            return Ok(0);
        }
        let triples = json_array(spans.iter().map(|span| {
            serde_json::Value::from(vec![span.root_id.get(), span.span.order, span.span.end_order])
        }));
        self.delete_spans_sql(&triples)
            .map_err(TreeError::unavailable)
    }

    fn forget_root(&mut self, root_id: NodeId) -> Result<(), TreeError> {
        self.forget_root_sql(root_id).map_err(TreeError::unavailable)
    }
}
