#![forbid(unsafe_code)]

use crate::error::TreeError;
use crate::filter::LeafFilter;
use crate::ids::{NodeId, RootKey};
use crate::model::{ReportNode, SubtreeSpan};
use crate::paginate::{LogPage, PageRequest};

/// Flat record store the engine runs against. Every method is one round-trip; implementations
/// surface their own failures as `TreeError::StoreUnavailable` and never retry.
///
/// Mutating calls made by one engine operation must be applied atomically by the caller
/// (a transaction for SQL stores).
pub trait NodeStore {
    fn root(&self, key: &RootKey) -> Result<Option<ReportNode>, TreeError>;

    /// Resolves many keys at once; unknown keys are skipped.
    fn roots(&self, keys: &[RootKey]) -> Result<Vec<ReportNode>, TreeError>;

    fn node(&self, id: NodeId) -> Result<Option<ReportNode>, TreeError>;

    /// All rows of `span.root_id` whose order lies in `span.span`, ascending by order.
    fn span_rows(&self, span: SubtreeSpan) -> Result<Vec<ReportNode>, TreeError>;

    /// Non-root rows of the given trees whose message equals `message`, by root then order.
    fn find_by_message(
        &self,
        root_ids: &[NodeId],
        message: &str,
    ) -> Result<Vec<ReportNode>, TreeError>;

    /// Leaf rows of one tree accepted by `filter`, ascending by order, cut to `page`.
    fn leaf_page(
        &self,
        root_id: NodeId,
        filter: &LeafFilter,
        page: PageRequest,
    ) -> Result<LogPage, TreeError>;

    /// Reserves `count` consecutive never-used ids and returns the first.
    fn reserve_ids(&mut self, count: u64) -> Result<NodeId, TreeError>;

    fn insert_root(&mut self, key: &RootKey, root: &ReportNode) -> Result<(), TreeError>;

    fn insert_nodes(&mut self, nodes: &[ReportNode]) -> Result<(), TreeError>;

    fn set_end_order(&mut self, id: NodeId, end_order: i64) -> Result<(), TreeError>;

    /// Removes every row inside any of `spans`; returns the number of rows removed.
    fn delete_spans(&mut self, spans: &[SubtreeSpan]) -> Result<usize, TreeError>;

    /// Drops the key mapping of a tree whose rows are gone.
    fn forget_root(&mut self, root_id: NodeId) -> Result<(), TreeError>;
}
