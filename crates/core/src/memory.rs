#![forbid(unsafe_code)]

use crate::error::TreeError;
use crate::filter::LeafFilter;
use crate::ids::{NodeId, RootKey};
use crate::model::{ReportNode, SubtreeSpan};
use crate::paginate::{LogPage, PageRequest, paginate_leaves};
use crate::store::NodeStore;
use std::collections::{BTreeMap, HashMap};

/// `NodeStore` kept in process memory, ordered by `(root_id, order)` like the SQL index.
#[derive(Debug, Default)]
pub struct MemoryNodeStore {
    rows: BTreeMap<(NodeId, i64), ReportNode>,
    by_id: HashMap<NodeId, (NodeId, i64)>,
    roots: BTreeMap<RootKey, NodeId>,
    next_id: i64,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn tree_rows(&self, root_id: NodeId) -> impl Iterator<Item = &ReportNode> {
        self.rows
            .range((root_id, i64::MIN)..=(root_id, i64::MAX))
            .map(|(_, row)| row)
    }
}

impl NodeStore for MemoryNodeStore {
    fn root(&self, key: &RootKey) -> Result<Option<ReportNode>, TreeError> {
        match self.roots.get(key) {
            Some(id) => self.node(*id),
            None => Ok(None),
        }
    }

    fn roots(&self, keys: &[RootKey]) -> Result<Vec<ReportNode>, TreeError> {
        let mut out = Vec::new();
        for key in keys {
            if let Some(root) = self.root(key)? {
                out.push(root);
            }
        }
        Ok(out)
    }

    fn node(&self, id: NodeId) -> Result<Option<ReportNode>, TreeError> {
        Ok(self
            .by_id
            .get(&id)
            .and_then(|position| self.rows.get(position))
            .cloned())
    }

    fn span_rows(&self, span: SubtreeSpan) -> Result<Vec<ReportNode>, TreeError> {
        if !span.span.is_valid() {
            return Ok(Vec::new());
        }
        Ok(self
            .rows
            .range((span.root_id, span.span.order)..=(span.root_id, span.span.end_order))
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn find_by_message(
        &self,
        root_ids: &[NodeId],
        message: &str,
    ) -> Result<Vec<ReportNode>, TreeError> {
        let mut root_ids = root_ids.to_vec();
        root_ids.sort();
        root_ids.dedup();
        Ok(root_ids
            .into_iter()
            .flat_map(|root_id| self.tree_rows(root_id))
            .filter(|row| !row.is_root() && row.message == message)
            .cloned()
            .collect())
    }

    fn leaf_page(
        &self,
        root_id: NodeId,
        filter: &LeafFilter,
        page: PageRequest,
    ) -> Result<LogPage, TreeError> {
        Ok(paginate_leaves(self.tree_rows(root_id), filter, page))
    }

    fn reserve_ids(&mut self, count: u64) -> Result<NodeId, TreeError> {
        let count = i64::try_from(count).map_err(|_| TreeError::InvalidInput("id block too large"))?;
        let first = self.next_id + 1;
        self.next_id += count;
        Ok(NodeId::new(first))
    }

    fn insert_root(&mut self, key: &RootKey, root: &ReportNode) -> Result<(), TreeError> {
        self.insert_nodes(std::slice::from_ref(root))?;
        self.roots.insert(key.clone(), root.id);
        Ok(())
    }

    fn insert_nodes(&mut self, nodes: &[ReportNode]) -> Result<(), TreeError> {
        for node in nodes {
            let position = (node.root_id, node.order);
            if self.rows.contains_key(&position) || self.by_id.contains_key(&node.id) {
                return Err(TreeError::InvalidInput("node position or id already taken"));
            }
            self.by_id.insert(node.id, position);
            self.rows.insert(position, node.clone());
        }
        Ok(())
    }

    fn set_end_order(&mut self, id: NodeId, end_order: i64) -> Result<(), TreeError> {
        if let Some(position) = self.by_id.get(&id)
            && let Some(row) = self.rows.get_mut(position)
        {
            row.end_order = end_order;
        }
        Ok(())
    }

    fn delete_spans(&mut self, spans: &[SubtreeSpan]) -> Result<usize, TreeError> {
        let mut removed = 0usize;
        for span in spans {
            if !span.span.is_valid() {
                continue;
            }
            let doomed: Vec<(NodeId, i64)> = self
                .rows
                .range((span.root_id, span.span.order)..=(span.root_id, span.span.end_order))
                .map(|(position, _)| *position)
                .collect();
            for position in doomed {
                if let Some(row) = self.rows.remove(&position) {
                    self.by_id.remove(&row.id);
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn forget_root(&mut self, root_id: NodeId) -> Result<(), TreeError> {
        self.roots.retain(|_, id| *id != root_id);
        Ok(())
    }
}
