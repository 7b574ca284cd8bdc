#![forbid(unsafe_code)]

use crate::error::TreeError;
use crate::ids::{NodeId, RootKey};
use crate::model::SubtreeSpan;
use crate::store::NodeStore;
use tracing::debug;

/// Removes the tree keyed by `key` with all of its rows.
pub fn delete_tree<S>(store: &mut S, key: &RootKey) -> Result<usize, TreeError>
where
    S: NodeStore + ?Sized,
{
    let root = store.root(key)?.ok_or(TreeError::NotFound)?;
    let removed = store.delete_spans(&[root.subtree_span()])?;
    store.forget_root(root.id)?;
    debug!(root = %key, removed, "report tree deleted");
    Ok(removed)
}

/// Removes node `id` and its descendants with one range delete. Unknown ids remove nothing.
/// Deleting a root by id removes its whole tree, key included.
pub fn delete_subtree<S>(store: &mut S, id: NodeId) -> Result<usize, TreeError>
where
    S: NodeStore + ?Sized,
{
    let Some(node) = store.node(id)? else {
        return Ok(0);
    };
    let removed = store.delete_spans(&[node.subtree_span()])?;
    if node.is_root() {
        store.forget_root(node.id)?;
    }
    debug!(node = %id, removed, "report subtree deleted");
    Ok(removed)
}

/// Removes, across the trees keyed by `keys`, every subtree headed by a node whose message is
/// `message`. Three round-trips regardless of how many trees or matches there are: key
/// resolution, one lookup, one batch delete.
pub fn delete_subtrees_by_name<S>(
    store: &mut S,
    keys: &[RootKey],
    message: &str,
) -> Result<usize, TreeError>
where
    S: NodeStore + ?Sized,
{
    if keys.is_empty() {
        return Ok(0);
    }
    let root_ids: Vec<NodeId> = store.roots(keys)?.into_iter().map(|root| root.id).collect();
    delete_by_message_key(store, &root_ids, message)
}

/// Same as [`delete_subtrees_by_name`] for trees already resolved to their root ids.
pub fn delete_by_message_key<S>(
    store: &mut S,
    root_ids: &[NodeId],
    message: &str,
) -> Result<usize, TreeError>
where
    S: NodeStore + ?Sized,
{
    if root_ids.is_empty() {
        return Ok(0);
    }
    let matches = store.find_by_message(root_ids, message)?;
    let match_count = matches.len();
    let spans = collapse_nested_spans(matches.iter().map(|row| row.subtree_span()).collect());
    if spans.is_empty() {
        return Ok(0);
    }
    let removed = store.delete_spans(&spans)?;
    debug!(
        roots = root_ids.len(),
        matches = match_count,
        spans = spans.len(),
        removed,
        "named subtrees deleted"
    );
    Ok(removed)
}

/// Sorts spans and drops every span nested inside another span of the same tree. Under the
/// interval invariant two spans of one tree are either nested or disjoint.
pub fn collapse_nested_spans(mut spans: Vec<SubtreeSpan>) -> Vec<SubtreeSpan> {
    spans.sort_by_key(|span| (span.root_id, span.span.order, -span.span.end_order));
    let mut out: Vec<SubtreeSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        if let Some(last) = out.last()
            && last.root_id == span.root_id
            && last.span.contains(&span.span)
        {
            continue;
        }
        out.push(span);
    }
    out
}
