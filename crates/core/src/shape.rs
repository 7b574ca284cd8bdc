#![forbid(unsafe_code)]

use crate::error::MalformedTree;
use crate::model::ReportTree;
use crate::severity::Severity;
use std::collections::HashMap;

/// Externally supplied node that names its parent instead of nesting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlatEntry {
    pub key: String,
    pub parent: Option<String>,
    pub message: String,
    pub severity: Option<Severity>,
}

impl ReportTree {
    /// Builds a forest from parent-linked entries. Siblings keep their input order; entries without
    /// a parent become top-level nodes. Entries unreachable from a top-level node sit on a cycle.
    pub fn from_flat(entries: Vec<FlatEntry>) -> Result<Vec<ReportTree>, MalformedTree> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            if index.insert(entry.key.as_str(), position).is_some() {
                return Err(MalformedTree::DuplicateKey {
                    key: entry.key.clone(),
                });
            }
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); entries.len()];
        let mut tops = Vec::new();
        for (position, entry) in entries.iter().enumerate() {
            match entry.parent.as_deref() {
                None => tops.push(position),
                Some(parent) => {
                    let Some(&parent_position) = index.get(parent) else {
                        return Err(MalformedTree::UnknownParent {
                            key: entry.key.clone(),
                            parent: parent.to_string(),
                        });
                    };
                    if parent_position == position {
                        return Err(MalformedTree::Cycle {
                            key: entry.key.clone(),
                        });
                    }
                    children[parent_position].push(position);
                }
            }
        }

        // Post-order over positions so every child is built before its parent.
        let mut order = Vec::with_capacity(entries.len());
        let mut stack: Vec<(usize, bool)> = tops.iter().rev().map(|&top| (top, false)).collect();
        while let Some((position, expanded)) = stack.pop() {
            if expanded {
                order.push(position);
                continue;
            }
            stack.push((position, true));
            stack.extend(children[position].iter().rev().map(|&child| (child, false)));
        }

        if order.len() < entries.len() {
            let mut reached = vec![false; entries.len()];
            for &position in &order {
                reached[position] = true;
            }
            let key = reached
                .iter()
                .position(|reached| !reached)
                .map(|position| entries[position].key.clone())
                .unwrap_or_default();
            return Err(MalformedTree::Cycle { key });
        }

        let mut slots: Vec<Option<FlatEntry>> = entries.into_iter().map(Some).collect();
        let mut built: Vec<Option<ReportTree>> = vec![None; slots.len()];
        for position in order {
            let Some(entry) = slots[position].take() else {
                continue;
            };
            let nested = children[position]
                .iter()
                .filter_map(|&child| built[child].take())
                .collect();
            built[position] = Some(ReportTree {
                message: entry.message,
                severity: entry.severity,
                children: nested,
            });
        }

        Ok(tops
            .into_iter()
            .filter_map(|top| built[top].take())
            .collect())
    }
}

/// Checks leaf/container rules on a submitted forest before anything is written.
pub fn validate_forest(forest: &[ReportTree]) -> Result<(), MalformedTree> {
    let mut stack: Vec<&ReportTree> = forest.iter().collect();
    while let Some(node) = stack.pop() {
        if !node.children.is_empty() && node.severity.is_some() {
            return Err(MalformedTree::SeverityOnContainer {
                message: node.message.clone(),
            });
        }
        stack.extend(node.children.iter());
    }
    Ok(())
}
