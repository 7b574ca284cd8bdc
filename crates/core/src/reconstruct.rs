#![forbid(unsafe_code)]

use crate::error::MalformedTree;
use crate::model::{ReportNode, TreeNode};

/// Rebuilds the nested tree from `rows`, which must be one node followed by all of its
/// descendants, ascending by order. One linear pass with a stack of open ancestors; siblings
/// come out in order. An empty input yields `Ok(None)`. Any row that contradicts the interval
/// encoding fails the whole reconstruction.
pub fn reconstruct(rows: Vec<ReportNode>) -> Result<Option<TreeNode>, MalformedTree> {
    let mut rows = rows.into_iter();
    let Some(head) = rows.next() else {
        return Ok(None);
    };
    check_span(&head)?;
    let head_span = head.span();
    let root_id = head.root_id;
    let mut last_order = head.order;

    let mut stack = vec![TreeNode::new(head)];
    for row in rows {
        check_span(&row)?;
        if row.order <= last_order {
            return Err(MalformedTree::UnsortedRows {
                id: row.id,
                order: row.order,
            });
        }
        last_order = row.order;
        if row.root_id != root_id || !head_span.contains_order(row.order) {
            return Err(MalformedTree::StrayRow { id: row.id });
        }

        while stack.len() > 1
            && stack
                .last()
                .is_some_and(|open| open.node.end_order < row.order)
        {
            close_top(&mut stack);
        }

        let Some(parent) = stack.last() else {
            return Err(MalformedTree::StrayRow { id: row.id });
        };
        if row.end_order > parent.node.end_order {
            return Err(MalformedTree::OverlappingInterval {
                id: row.id,
                parent: parent.node.id,
            });
        }
        if row.parent_id != Some(parent.node.id) {
            return Err(MalformedTree::ParentMismatch {
                id: row.id,
                expected: Some(parent.node.id),
                actual: row.parent_id,
            });
        }
        stack.push(TreeNode::new(row));
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }
    Ok(stack.pop())
}

fn check_span(row: &ReportNode) -> Result<(), MalformedTree> {
    if row.end_order < row.order || (row.is_leaf && row.end_order != row.order) {
        return Err(MalformedTree::InvalidSpan {
            id: row.id,
            order: row.order,
            end_order: row.end_order,
        });
    }
    Ok(())
}

fn close_top(stack: &mut Vec<TreeNode>) {
    if let Some(closed) = stack.pop()
        && let Some(parent) = stack.last_mut()
    {
        parent.children.push(closed);
    }
}
