use crate::model::node::NodeId;

/// Error type for tree, filter and view operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("node not found: {0}")]
    NotFound(NodeId),
    #[error("node not displayed in this view: {0}")]
    NotDisplayed(NodeId),
    #[error("relationship {parent} -> {child} would create a cycle")]
    CircularRelationship { parent: NodeId, child: NodeId },
    #[error("unknown filter: {0}")]
    UnknownFilter(String),
    #[error("filters cannot be applied to the static main view")]
    StaticView,
    #[error("the id {0} is reserved for the root")]
    ReservedId(NodeId),
    #[error("{child} is not a child of {parent}")]
    NotChildOf { parent: NodeId, child: NodeId },
    #[error("invalid child order for {0}: expected a permutation of the current children")]
    InvalidOrder(NodeId),
    #[error("unknown view: {0}")]
    UnknownView(u64),
}
