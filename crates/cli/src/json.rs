#![forbid(unsafe_code)]

use rt_core::{
    AppendReceipt, FlatEntry, LogPage, MalformedTree, ReportNode, ReportTree, Severity, TreeNode,
};
use rt_storage::RootSummary;
use serde::Deserialize;
use serde_json::{Value, json};

/// Accepted `put` payloads: a nested forest, or parent-linked entries under `entries`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ForestInput {
    Nested(Vec<TreeInput>),
    Flat { entries: Vec<FlatInput> },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TreeInput {
    message: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    children: Vec<TreeInput>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FlatInput {
    key: String,
    #[serde(default)]
    parent: Option<String>,
    message: String,
    #[serde(default)]
    severity: Option<String>,
}

#[derive(Debug)]
pub(crate) enum InputError {
    Json(serde_json::Error),
    UnknownSeverity(String),
    Malformed(MalformedTree),
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid report json: {err}"),
            Self::UnknownSeverity(value) => write!(f, "unknown severity: {value}"),
            Self::Malformed(err) => write!(f, "malformed tree: {err}"),
        }
    }
}

impl std::error::Error for InputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::Malformed(err) => Some(err),
            Self::UnknownSeverity(_) => None,
        }
    }
}

impl From<serde_json::Error> for InputError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<MalformedTree> for InputError {
    fn from(value: MalformedTree) -> Self {
        Self::Malformed(value)
    }
}

pub(crate) fn parse_forest(raw: &str) -> Result<Vec<ReportTree>, InputError> {
    match serde_json::from_str::<ForestInput>(raw)? {
        ForestInput::Nested(trees) => trees.into_iter().map(into_report_tree).collect(),
        ForestInput::Flat { entries } => {
            let entries = entries
                .into_iter()
                .map(|entry| {
                    Ok(FlatEntry {
                        key: entry.key,
                        parent: entry.parent,
                        message: entry.message,
                        severity: parse_severity(entry.severity)?,
                    })
                })
                .collect::<Result<Vec<_>, InputError>>()?;
            Ok(ReportTree::from_flat(entries)?)
        }
    }
}

fn into_report_tree(input: TreeInput) -> Result<ReportTree, InputError> {
    Ok(ReportTree {
        message: input.message,
        severity: parse_severity(input.severity)?,
        children: input
            .children
            .into_iter()
            .map(into_report_tree)
            .collect::<Result<_, _>>()?,
    })
}

fn parse_severity(raw: Option<String>) -> Result<Option<Severity>, InputError> {
    match raw {
        None => Ok(None),
        Some(raw) => Severity::parse(&raw)
            .map(Some)
            .ok_or(InputError::UnknownSeverity(raw)),
    }
}

fn severity_json(severity: Option<Severity>) -> Value {
    match severity {
        Some(severity) => Value::String(severity.as_str().to_string()),
        None => Value::Null,
    }
}

pub(crate) fn node_json(node: &ReportNode) -> Value {
    json!({
        "id": node.id.get(),
        "parent_id": node.parent_id.map(|id| id.get()),
        "order": node.order,
        "end_order": node.end_order,
        "leaf": node.is_leaf,
        "message": node.message,
        "severity": severity_json(node.severity),
    })
}

/// Renders a reconstructed tree without recursing on depth.
pub(crate) fn tree_json(root: &TreeNode) -> Value {
    struct Frame<'a> {
        tree: &'a TreeNode,
        next: usize,
        children: Vec<Value>,
    }

    fn frame(tree: &TreeNode) -> Frame<'_> {
        Frame {
            tree,
            next: 0,
            children: Vec::with_capacity(tree.children.len()),
        }
    }

    let mut stack = vec![frame(root)];
    let mut done = Value::Null;
    while let Some(top) = stack.last_mut() {
        let tree = top.tree;
        if let Some(child) = tree.children.get(top.next) {
            top.next += 1;
            stack.push(frame(child));
            continue;
        }
        let Some(closed) = stack.pop() else {
            break;
        };
        let mut value = node_json(&closed.tree.node);
        value["severities"] = closed
            .tree
            .severities
            .iter()
            .map(|severity| Value::String(severity.as_str().to_string()))
            .collect();
        value["children"] = Value::Array(closed.children);
        match stack.last_mut() {
            Some(parent) => parent.children.push(value),
            None => done = value,
        }
    }
    done
}

pub(crate) fn receipt_json(root_key: &str, receipt: &AppendReceipt) -> Value {
    json!({
        "root": root_key,
        "root_id": receipt.root_id.get(),
        "created": receipt.created,
        "replaced": receipt.replaced,
        "nodes_written": receipt.nodes_written,
        "span": receipt.span.map(|span| json!({
            "order": span.order,
            "end_order": span.end_order,
        })),
    })
}

pub(crate) fn log_page_json(root_key: &str, page: &LogPage) -> Value {
    json!({
        "root": root_key,
        "page": page.page.page(),
        "page_size": page.page.page_size(),
        "total_count": page.total_count,
        "has_more": page.has_more(),
        "items": page.items.iter().map(node_json).collect::<Vec<_>>(),
    })
}

pub(crate) fn roots_json(roots: &[RootSummary]) -> Value {
    let items = roots
        .iter()
        .map(|root| {
            json!({
                "root": root.root_key,
                "root_id": root.root_id.get(),
                "node_count": root.node_count,
                "created_at_ms": root.created_at_ms,
                "updated_at_ms": root.updated_at_ms,
            })
        })
        .collect::<Vec<_>>();
    json!({ "roots": items })
}

pub(crate) fn removed_json(removed: usize) -> Value {
    json!({ "removed": removed })
}
