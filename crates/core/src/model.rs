#![forbid(unsafe_code)]

use crate::ids::NodeId;
use crate::severity::{Severity, SeveritySet};

/// Closed pre-order interval `[order, end_order]` occupied by a node and its descendants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderSpan {
    pub order: i64,
    pub end_order: i64,
}

impl OrderSpan {
    pub const fn new(order: i64, end_order: i64) -> Self {
        Self { order, end_order }
    }

    pub const fn point(order: i64) -> Self {
        Self {
            order,
            end_order: order,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.order <= self.end_order
    }

    pub fn contains(&self, other: &OrderSpan) -> bool {
        self.order <= other.order && other.end_order <= self.end_order
    }

    pub fn contains_order(&self, order: i64) -> bool {
        self.order <= order && order <= self.end_order
    }

    pub fn len(&self) -> u64 {
        if self.is_valid() {
            (self.end_order - self.order) as u64 + 1
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One row of the flat store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportNode {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub root_id: NodeId,
    pub order: i64,
    pub end_order: i64,
    pub is_leaf: bool,
    pub message: String,
    pub severity: Option<Severity>,
}

impl ReportNode {
    /// A fresh, empty root container for `message` (its root key).
    pub fn new_root(id: NodeId, message: impl Into<String>) -> Self {
        Self {
            id,
            parent_id: None,
            root_id: id,
            order: 0,
            end_order: 0,
            is_leaf: false,
            message: message.into(),
            severity: None,
        }
    }

    pub fn span(&self) -> OrderSpan {
        OrderSpan::new(self.order, self.end_order)
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn subtree_span(&self) -> SubtreeSpan {
        SubtreeSpan {
            root_id: self.root_id,
            span: self.span(),
        }
    }
}

/// A node interval scoped to one tree; the unit of range reads and range deletes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubtreeSpan {
    pub root_id: NodeId,
    pub span: OrderSpan,
}

/// Submitted tree shape. A node without children is a leaf log entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportTree {
    pub message: String,
    pub severity: Option<Severity>,
    pub children: Vec<ReportTree>,
}

impl ReportTree {
    pub fn leaf(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity: Some(severity),
            children: Vec::new(),
        }
    }

    pub fn section(message: impl Into<String>, children: Vec<ReportTree>) -> Self {
        Self {
            message: message.into(),
            severity: None,
            children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this tree, itself included.
    pub fn node_count(&self) -> usize {
        let mut count = 0usize;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

impl Drop for ReportTree {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

/// Reconstructed node with derived children and aggregated severities.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode {
    pub node: ReportNode,
    pub severities: SeveritySet,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(node: ReportNode) -> Self {
        Self {
            node,
            severities: SeveritySet::empty(),
            children: Vec::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0usize;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Depth-first pre-order walk, the same order rows are stored in.
    pub fn preorder(&self) -> Vec<&TreeNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Strips store bookkeeping and returns the submitted shape.
    pub fn to_report_tree(&self) -> ReportTree {
        fn shape(tree: &TreeNode) -> ReportTree {
            ReportTree {
                message: tree.node.message.clone(),
                severity: tree.node.severity,
                children: Vec::with_capacity(tree.children.len()),
            }
        }

        // (source, shape being built, next child index)
        let mut stack = vec![(self, shape(self), 0usize)];
        loop {
            let Some((tree, _, next)) = stack.last_mut() else {
                return ReportTree::default();
            };
            let source: &TreeNode = *tree;
            if let Some(child) = source.children.get(*next) {
                *next += 1;
                stack.push((child, shape(child), 0));
                continue;
            }
            let Some((_, closed, _)) = stack.pop() else {
                return ReportTree::default();
            };
            match stack.last_mut() {
                Some((_, parent, _)) => parent.children.push(closed),
                None => return closed,
            }
        }
    }
}

impl Drop for TreeNode {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

/// Iterative post-order rebuild below `root`. `close` receives each descendant with its children
/// detached plus the already-closed children it kept; returning `None` drops it from its parent.
/// The head itself is handed back unclosed, together with its kept children.
pub(crate) fn fold_post_order<F>(root: TreeNode, mut close: F) -> (TreeNode, Vec<TreeNode>)
where
    F: FnMut(TreeNode, Vec<TreeNode>) -> Option<TreeNode>,
{
    struct Frame {
        node: TreeNode,
        pending: std::vec::IntoIter<TreeNode>,
        kept: Vec<TreeNode>,
    }

    fn open(mut node: TreeNode) -> Frame {
        let children = std::mem::take(&mut node.children);
        let kept = Vec::with_capacity(children.len());
        Frame {
            node,
            pending: children.into_iter(),
            kept,
        }
    }

    let mut head = open(root);
    let mut stack: Vec<Frame> = Vec::new();
    loop {
        let next = match stack.last_mut() {
            Some(frame) => frame.pending.next(),
            None => head.pending.next(),
        };
        if let Some(child) = next {
            stack.push(open(child));
            continue;
        }
        let Some(frame) = stack.pop() else {
            return (head.node, head.kept);
        };
        let closed = close(frame.node, frame.kept);
        match stack.last_mut() {
            Some(parent) => parent.kept.extend(closed),
            None => head.kept.extend(closed),
        }
    }
}
