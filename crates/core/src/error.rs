#![forbid(unsafe_code)]

use crate::ids::NodeId;

/// Structural defect that makes a tree unencodable or a row sequence unreconstructable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MalformedTree {
    DuplicateKey {
        key: String,
    },
    UnknownParent {
        key: String,
        parent: String,
    },
    Cycle {
        key: String,
    },
    SeverityOnContainer {
        message: String,
    },
    UnsortedRows {
        id: NodeId,
        order: i64,
    },
    InvalidSpan {
        id: NodeId,
        order: i64,
        end_order: i64,
    },
    OverlappingInterval {
        id: NodeId,
        parent: NodeId,
    },
    ParentMismatch {
        id: NodeId,
        expected: Option<NodeId>,
        actual: Option<NodeId>,
    },
    StrayRow {
        id: NodeId,
    },
}

impl std::fmt::Display for MalformedTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey { key } => write!(f, "duplicate node key (key={key})"),
            Self::UnknownParent { key, parent } => {
                write!(f, "unknown parent (key={key}, parent={parent})")
            }
            Self::Cycle { key } => write!(f, "parent cycle (key={key})"),
            Self::SeverityOnContainer { message } => {
                write!(f, "severity on container node (message={message})")
            }
            Self::UnsortedRows { id, order } => {
                write!(f, "rows not ascending by order (id={id}, order={order})")
            }
            Self::InvalidSpan {
                id,
                order,
                end_order,
            } => write!(
                f,
                "invalid interval (id={id}, order={order}, end_order={end_order})"
            ),
            Self::OverlappingInterval { id, parent } => {
                write!(f, "interval escapes its parent (id={id}, parent={parent})")
            }
            Self::ParentMismatch {
                id,
                expected,
                actual,
            } => write!(
                f,
                "parent mismatch (id={id}, expected={}, actual={})",
                display_opt(expected),
                display_opt(actual)
            ),
            Self::StrayRow { id } => write!(f, "row outside the requested subtree (id={id})"),
        }
    }
}

impl std::error::Error for MalformedTree {}

fn display_opt(id: &Option<NodeId>) -> String {
    match id {
        Some(id) => id.to_string(),
        None => "none".to_string(),
    }
}

/// Store failure surfaced unchanged; retry policy belongs to the caller.
#[derive(Debug)]
pub struct StoreFault(Box<dyn std::error::Error + Send + Sync + 'static>);

impl StoreFault {
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(err))
    }

    pub fn from_boxed(err: Box<dyn std::error::Error + Send + Sync + 'static>) -> Self {
        Self(err)
    }

    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self.0
    }
}

impl std::fmt::Display for StoreFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for StoreFault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

#[derive(Debug)]
pub enum TreeError {
    NotFound,
    InvalidInput(&'static str),
    Malformed(MalformedTree),
    StoreUnavailable(StoreFault),
}

impl TreeError {
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::StoreUnavailable(StoreFault::new(err))
    }
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::Malformed(err) => write!(f, "malformed tree: {err}"),
            Self::StoreUnavailable(err) => write!(f, "store unavailable: {err}"),
        }
    }
}

impl std::error::Error for TreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            Self::StoreUnavailable(err) => Some(err.0.as_ref()),
            Self::NotFound | Self::InvalidInput(_) => None,
        }
    }
}

impl From<MalformedTree> for TreeError {
    fn from(value: MalformedTree) -> Self {
        Self::Malformed(value)
    }
}
