#![forbid(unsafe_code)]

use crate::filter::LeafFilter;
use crate::model::{TreeNode, fold_post_order};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(value))
            .or_else(|| value.eq_ignore_ascii_case("WARNING").then_some(Severity::Warn))
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of severities, iterated in ascending order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SeveritySet(u8);

impl SeveritySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn single(severity: Severity) -> Self {
        Self(severity.bit())
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn contains(self, severity: Severity) -> bool {
        self.0 & severity.bit() != 0
    }

    pub fn insert(&mut self, severity: Severity) {
        self.0 |= severity.bit();
    }

    pub fn union(self, other: SeveritySet) -> SeveritySet {
        Self(self.0 | other.0)
    }

    pub fn iter(self) -> impl Iterator<Item = Severity> {
        Severity::ALL
            .into_iter()
            .filter(move |severity| self.contains(*severity))
    }

    pub fn max(self) -> Option<Severity> {
        self.iter().last()
    }

    /// Parses a comma separated list such as `"error, warn"`.
    pub fn parse_list(value: &str) -> Result<Self, String> {
        let mut out = Self::empty();
        for raw in value.split(',') {
            if raw.trim().is_empty() {
                continue;
            }
            let severity = Severity::parse(raw).ok_or_else(|| raw.trim().to_string())?;
            out.insert(severity);
        }
        Ok(out)
    }
}

impl FromIterator<Severity> for SeveritySet {
    fn from_iter<T: IntoIterator<Item = Severity>>(iter: T) -> Self {
        let mut out = Self::empty();
        for severity in iter {
            out.insert(severity);
        }
        out
    }
}

impl std::fmt::Debug for SeveritySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Fills `severities` on every node: a leaf gets its own stored severity, a container the union
/// of its children. Runs as one post-order pass over the reconstructed tree.
pub fn aggregate_severities(root: TreeNode) -> TreeNode {
    let (head, children) = fold_post_order(root, |node, children| {
        Some(close_aggregate(node, children))
    });
    close_aggregate(head, children)
}

fn close_aggregate(mut node: TreeNode, children: Vec<TreeNode>) -> TreeNode {
    node.severities = if node.node.is_leaf {
        node.node.severity.map(SeveritySet::single).unwrap_or_default()
    } else {
        children
            .iter()
            .fold(SeveritySet::empty(), |acc, child| acc.union(child.severities))
    };
    node.children = children;
    node
}

/// Keeps leaves accepted by `filter` and every container with at least one kept descendant.
/// The head is always returned, possibly with no children left.
pub fn prune_to_matches(root: TreeNode, filter: &LeafFilter) -> TreeNode {
    let (mut head, children) = fold_post_order(root, |mut node, children| {
        if node.node.is_leaf {
            return filter.matches(&node.node).then_some(node);
        }
        if children.is_empty() {
            return None;
        }
        node.children = children;
        Some(node)
    });
    head.children = children;
    head
}

/// Structure-only view: drops leaf entries, containers keep their aggregated severities.
pub fn strip_leaves(root: TreeNode) -> TreeNode {
    let (mut head, children) = fold_post_order(root, |mut node, children| {
        if node.node.is_leaf {
            return None;
        }
        node.children = children;
        Some(node)
    });
    head.children = children;
    head
}
