use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::model::node::{Identified, Node, NodeId};

/// Drain order class of a queued request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

/// Payload edit shipped through the queue
pub type PayloadUpdate<T> = Box<dyn FnOnce(&mut T) + Send>;

/// A structural mutation waiting to be applied by the tree owner
pub enum Request<T> {
    AddNode { node: Node<T>, parent: Option<NodeId> },
    RemoveNode { id: NodeId, recursive: bool },
    ModifyNode(NodeId),
    UpdatePayload { id: NodeId, update: PayloadUpdate<T> },
    NewRelationship { parent: NodeId, child: NodeId },
    BreakRelationship { parent: NodeId, child: NodeId },
    MoveNode { id: NodeId, parent: Option<NodeId> },
}

impl<T> Request<T> {
    /// Short operation name, for logs and reports
    pub fn op(&self) -> &'static str {
        match self {
            Request::AddNode { .. } => "add_node",
            Request::RemoveNode { .. } => "remove_node",
            Request::ModifyNode(_) => "modify_node",
            Request::UpdatePayload { .. } => "update_payload",
            Request::NewRelationship { .. } => "new_relationship",
            Request::BreakRelationship { .. } => "break_relationship",
            Request::MoveNode { .. } => "move_node",
        }
    }
}

/// The node the request is about (the child, for relationships)
impl<T> Identified for Request<T> {
    fn node_id(&self) -> &NodeId {
        match self {
            Request::AddNode { node, .. } => node.id(),
            Request::RemoveNode { id, .. }
            | Request::ModifyNode(id)
            | Request::UpdatePayload { id, .. }
            | Request::MoveNode { id, .. } => id,
            Request::NewRelationship { child, .. } | Request::BreakRelationship { child, .. } => child,
        }
    }
}

impl<T> fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.op(), self.node_id())
    }
}

struct Lanes<T> {
    high: VecDeque<Request<T>>,
    normal: VecDeque<Request<T>>,
    low: VecDeque<Request<T>>,
}

impl<T> Lanes<T> {
    fn lane(&mut self, priority: Priority) -> &mut VecDeque<Request<T>> {
        match priority {
            Priority::High => &mut self.high,
            Priority::Normal => &mut self.normal,
            Priority::Low => &mut self.low,
        }
    }
}

/// Priority FIFO of mutation requests.
///
/// Clones share the same queue, so producer threads each hold a clone and
/// push; the thread owning the tree drains it with `Tree::process_queue`.
/// Draining is high before normal before low, FIFO within a priority.
pub struct MutationQueue<T> {
    inner: Arc<Mutex<Lanes<T>>>,
}

impl<T> Clone for MutationQueue<T> {
    fn clone(&self) -> Self {
        MutationQueue {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for MutationQueue<T> {
    fn default() -> Self {
        MutationQueue {
            inner: Arc::new(Mutex::new(Lanes {
                high: VecDeque::new(),
                normal: VecDeque::new(),
                low: VecDeque::new(),
            })),
        }
    }
}

impl<T> fmt::Debug for MutationQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationQueue").field("len", &self.len()).finish()
    }
}

impl<T> MutationQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    // The lanes hold plain data, so a panic in another producer cannot leave
    // them half-written.
    fn lanes(&self) -> MutexGuard<'_, Lanes<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, request: Request<T>, priority: Priority) {
        self.lanes().lane(priority).push_back(request);
    }

    pub fn add_node(&self, node: Node<T>, parent: Option<NodeId>, priority: Priority) {
        self.push(Request::AddNode { node, parent }, priority);
    }

    pub fn remove_node(&self, id: impl Into<NodeId>, recursive: bool, priority: Priority) {
        self.push(
            Request::RemoveNode {
                id: id.into(),
                recursive,
            },
            priority,
        );
    }

    pub fn modify_node(&self, id: impl Into<NodeId>, priority: Priority) {
        self.push(Request::ModifyNode(id.into()), priority);
    }

    pub fn new_relationship(&self, parent: impl Into<NodeId>, child: impl Into<NodeId>, priority: Priority) {
        self.push(
            Request::NewRelationship {
                parent: parent.into(),
                child: child.into(),
            },
            priority,
        );
    }

    pub fn break_relationship(&self, parent: impl Into<NodeId>, child: impl Into<NodeId>, priority: Priority) {
        self.push(
            Request::BreakRelationship {
                parent: parent.into(),
                child: child.into(),
            },
            priority,
        );
    }

    /// Next request in drain order
    pub fn pop(&self) -> Option<Request<T>> {
        let mut lanes = self.lanes();
        lanes
            .high
            .pop_front()
            .or_else(|| lanes.normal.pop_front())
            .or_else(|| lanes.low.pop_front())
    }

    pub fn len(&self) -> usize {
        let lanes = self.lanes();
        lanes.high.len() + lanes.normal.len() + lanes.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
