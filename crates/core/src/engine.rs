#![forbid(unsafe_code)]

use crate::encode::{EncodeOptions, EncodePlacement, encode_forest};
use crate::error::TreeError;
use crate::filter::LeafFilter;
use crate::ids::{NodeId, RootKey};
use crate::model::{OrderSpan, ReportNode, ReportTree, SubtreeSpan, TreeNode};
use crate::paginate::{LogPage, LogQuery};
use crate::reconstruct::reconstruct;
use crate::severity::{aggregate_severities, prune_to_matches, strip_leaves};
use crate::shape::validate_forest;
use crate::store::NodeStore;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeQuery {
    /// `false` returns the container structure only, with aggregated severities.
    pub include_leaf_detail: bool,
    pub filter: LeafFilter,
}

impl Default for TreeQuery {
    fn default() -> Self {
        Self {
            include_leaf_detail: true,
            filter: LeafFilter::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppendReceipt {
    pub root_id: NodeId,
    pub created: bool,
    /// Rows removed first because of `overwrite`.
    pub replaced: usize,
    pub nodes_written: usize,
    /// Interval occupied by the appended nodes; `None` when nothing was appended.
    pub span: Option<OrderSpan>,
}

/// Writes `forest` as new top-level children of the tree keyed by `key`, creating the root when
/// absent. With `overwrite`, the root's current descendants are removed first (the root row and
/// its id survive). New siblings start after the root's `end_order`, which is the maximum
/// `end_order` in the tree, so existing intervals are never touched.
///
/// The caller must run this inside one write transaction per root.
pub fn create_or_append_tree<S>(
    store: &mut S,
    key: &RootKey,
    forest: &[ReportTree],
    overwrite: bool,
    options: &EncodeOptions,
) -> Result<AppendReceipt, TreeError>
where
    S: NodeStore + ?Sized,
{
    validate_forest(forest)?;

    let (root, created) = match store.root(key)? {
        Some(root) => (root, false),
        None => {
            let id = store.reserve_ids(1)?;
            let root = ReportNode::new_root(id, key.as_str());
            store.insert_root(key, &root)?;
            (root, true)
        }
    };

    let mut replaced = 0usize;
    let mut end_order = root.end_order;
    if overwrite && root.end_order > root.order {
        let descendants = SubtreeSpan {
            root_id: root.id,
            span: OrderSpan::new(root.order + 1, root.end_order),
        };
        replaced = store.delete_spans(&[descendants])?;
        end_order = root.order;
    }

    let count = forest.iter().map(ReportTree::node_count).sum::<usize>();
    let mut receipt = AppendReceipt {
        root_id: root.id,
        created,
        replaced,
        nodes_written: 0,
        span: None,
    };
    if count == 0 {
        if end_order != root.end_order {
            store.set_end_order(root.id, end_order)?;
        }
        return Ok(receipt);
    }

    let first_id = store.reserve_ids(count as u64)?;
    let encoded = encode_forest(
        forest,
        EncodePlacement {
            root_id: root.id,
            parent_id: root.id,
            first_order: end_order + 1,
            first_id,
        },
        options,
    )?;
    store.insert_nodes(&encoded.nodes)?;
    if let Some(span) = encoded.span {
        store.set_end_order(root.id, span.end_order)?;
    }

    debug!(
        root = %key,
        root_id = %root.id,
        created,
        replaced,
        written = encoded.nodes.len(),
        "report forest appended"
    );
    receipt.nodes_written = encoded.nodes.len();
    receipt.span = encoded.span;
    Ok(receipt)
}

/// Reads the whole tree keyed by `key`.
pub fn load_tree<S>(store: &S, key: &RootKey, query: &TreeQuery) -> Result<TreeNode, TreeError>
where
    S: NodeStore + ?Sized,
{
    let root = store.root(key)?.ok_or(TreeError::NotFound)?;
    load_view(store, &root, query)
}

/// Reads the subtree headed by node `id`.
pub fn load_subtree<S>(store: &S, id: NodeId, query: &TreeQuery) -> Result<TreeNode, TreeError>
where
    S: NodeStore + ?Sized,
{
    let head = store.node(id)?.ok_or(TreeError::NotFound)?;
    load_view(store, &head, query)
}

fn load_view<S>(store: &S, head: &ReportNode, query: &TreeQuery) -> Result<TreeNode, TreeError>
where
    S: NodeStore + ?Sized,
{
    let rows = store.span_rows(head.subtree_span())?;
    let row_count = rows.len();
    let tree = reconstruct(rows)?.ok_or(TreeError::NotFound)?;
    let mut tree = aggregate_severities(tree);
    if !query.filter.is_unfiltered() {
        tree = prune_to_matches(tree, &query.filter);
    }
    if !query.include_leaf_detail {
        tree = strip_leaves(tree);
    }
    debug!(head = %head.id, rows = row_count, "report tree reconstructed");
    Ok(tree)
}

/// One page of leaf entries under the tree keyed by `key`, in emission order.
pub fn list_logs<S>(store: &S, key: &RootKey, query: &LogQuery) -> Result<LogPage, TreeError>
where
    S: NodeStore + ?Sized,
{
    let root = store.root(key)?.ok_or(TreeError::NotFound)?;
    store.leaf_page(root.id, &query.filter, query.page)
}
