use serde::Serialize;

use super::node::{Identified, NodeId, Path};

/// Kind selector for structural changes emitted by the main tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Reordered,
}

/// A structural change in the main tree.
///
/// Changes name a node only; observers that need positions use a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "node", rename_all = "lowercase")]
pub enum TreeChange {
    Added(NodeId),
    Modified(NodeId),
    Deleted(NodeId),
    /// The children of this node (or of the root) changed order
    Reordered(NodeId),
}

impl TreeChange {
    pub fn kind(&self) -> ChangeKind {
        match self {
            TreeChange::Added(_) => ChangeKind::Added,
            TreeChange::Modified(_) => ChangeKind::Modified,
            TreeChange::Deleted(_) => ChangeKind::Deleted,
            TreeChange::Reordered(_) => ChangeKind::Reordered,
        }
    }
}

impl Identified for TreeChange {
    fn node_id(&self) -> &NodeId {
        match self {
            TreeChange::Added(id)
            | TreeChange::Modified(id)
            | TreeChange::Deleted(id)
            | TreeChange::Reordered(id) => id,
        }
    }
}

/// Kind selector for view events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewEventKind {
    Added,
    Deleted,
    Modified,
    Reordered,
}

/// A change in a filtered view, addressed by the path at which the observer
/// can resolve the node at the moment the event is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ViewEvent {
    /// The node became visible at `path`
    Added { node: NodeId, path: Path },
    /// The node is no longer visible at `path`
    Deleted { node: NodeId, path: Path },
    /// The node is still visible at `path` but may render differently
    Modified { node: NodeId, path: Path },
    /// The children of `node` at `path` were permuted: the child now at
    /// position `i` was previously at position `new_order[i]`
    Reordered {
        node: NodeId,
        path: Path,
        new_order: Vec<usize>,
    },
}

impl ViewEvent {
    pub fn kind(&self) -> ViewEventKind {
        match self {
            ViewEvent::Added { .. } => ViewEventKind::Added,
            ViewEvent::Deleted { .. } => ViewEventKind::Deleted,
            ViewEvent::Modified { .. } => ViewEventKind::Modified,
            ViewEvent::Reordered { .. } => ViewEventKind::Reordered,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ViewEvent::Added { path, .. }
            | ViewEvent::Deleted { path, .. }
            | ViewEvent::Modified { path, .. }
            | ViewEvent::Reordered { path, .. } => path,
        }
    }
}

impl Identified for ViewEvent {
    fn node_id(&self) -> &NodeId {
        match self {
            ViewEvent::Added { node, .. }
            | ViewEvent::Deleted { node, .. }
            | ViewEvent::Modified { node, .. }
            | ViewEvent::Reordered { node, .. } => node,
        }
    }
}
