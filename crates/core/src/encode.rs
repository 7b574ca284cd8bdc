#![forbid(unsafe_code)]

use crate::error::MalformedTree;
use crate::ids::NodeId;
use crate::model::{OrderSpan, ReportNode, ReportTree};
use tracing::warn;

pub const DEFAULT_MAX_MESSAGE_LEN: usize = 4096;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Maximum message length in characters; longer messages are cut, never rejected.
    pub max_message_len: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

/// Where an encoded forest lands: under which node, from which counter, with which id block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodePlacement {
    pub root_id: NodeId,
    pub parent_id: NodeId,
    pub first_order: i64,
    pub first_id: NodeId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedForest {
    pub nodes: Vec<ReportNode>,
    /// Interval covered by the new nodes; `None` for an empty forest.
    pub span: Option<OrderSpan>,
}

struct EncodeState<'o> {
    placement: EncodePlacement,
    options: &'o EncodeOptions,
    next_order: i64,
    nodes: Vec<ReportNode>,
}

impl EncodeState<'_> {
    fn push(&mut self, tree: &ReportTree, parent_id: NodeId) -> Result<usize, MalformedTree> {
        if !tree.children.is_empty() && tree.severity.is_some() {
            return Err(MalformedTree::SeverityOnContainer {
                message: tree.message.clone(),
            });
        }
        let order = self.next_order;
        self.next_order += 1;
        let id = self
            .placement
            .first_id
            .offset(order - self.placement.first_order);
        self.nodes.push(ReportNode {
            id,
            parent_id: Some(parent_id),
            root_id: self.placement.root_id,
            order,
            end_order: order,
            is_leaf: tree.children.is_empty(),
            message: truncate_message(&tree.message, self.options.max_message_len, order),
            severity: tree.severity,
        });
        Ok(self.nodes.len() - 1)
    }
}

/// Assigns pre-order `(order, end_order)` pairs to every node of `forest`, starting at
/// `placement.first_order`. Ids are taken from the reserved block at the same offsets, so the
/// caller must have reserved at least `forest` node-count ids. Output is ascending by order.
pub fn encode_forest(
    forest: &[ReportTree],
    placement: EncodePlacement,
    options: &EncodeOptions,
) -> Result<EncodedForest, MalformedTree> {
    struct Frame<'t> {
        tree: &'t ReportTree,
        index: usize,
        cursor: usize,
    }

    let capacity = forest.iter().map(ReportTree::node_count).sum();
    let mut state = EncodeState {
        placement,
        options,
        next_order: placement.first_order,
        nodes: Vec::with_capacity(capacity),
    };

    for top in forest {
        let index = state.push(top, placement.parent_id)?;
        let mut stack = vec![Frame {
            tree: top,
            index,
            cursor: 0,
        }];
        while let Some(frame) = stack.last_mut() {
            let tree = frame.tree;
            if let Some(child) = tree.children.get(frame.cursor) {
                frame.cursor += 1;
                let parent_id = state.nodes[frame.index].id;
                let index = state.push(child, parent_id)?;
                stack.push(Frame {
                    tree: child,
                    index,
                    cursor: 0,
                });
                continue;
            }
            let index = frame.index;
            stack.pop();
            state.nodes[index].end_order = state.next_order - 1;
        }
    }

    let span = (state.next_order > placement.first_order)
        .then(|| OrderSpan::new(placement.first_order, state.next_order - 1));
    Ok(EncodedForest {
        nodes: state.nodes,
        span,
    })
}

/// Cuts `message` to `max_len` characters on a char boundary. Same input, same output.
pub fn truncate_message(message: &str, max_len: usize, order: i64) -> String {
    match message.char_indices().nth(max_len) {
        None => message.to_string(),
        Some((cut, _)) => {
            warn!(
                order,
                original_len = message.chars().count(),
                kept_len = max_len,
                "report message truncated"
            );
            message[..cut].to_string()
        }
    }
}
