use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved id of the virtual root node.
pub const ROOT_ID: &str = "root";

/// Stable identifier of a node.
///
/// Ids are plain strings; two nodes are the same node iff their ids are equal.
/// The value [`ROOT_ID`] is reserved for the virtual root and never names a
/// stored node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    /// The id of the virtual root
    pub fn root() -> Self {
        NodeId(ROOT_ID.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

impl From<&NodeId> for NodeId {
    fn from(id: &NodeId) -> Self {
        id.clone()
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for NodeId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NodeId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A sequence of node ids leading from the virtual root (excluded) down to a
/// node (included). The root itself has the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<NodeId>);

impl Path {
    /// The path of the virtual root
    pub fn root() -> Self {
        Path(Vec::new())
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        Path(ids.into_iter().map(Into::into).collect())
    }

    /// A new path one level deeper, ending at `id`
    pub fn child(&self, id: &NodeId) -> Path {
        let mut ids = Vec::with_capacity(self.0.len() + 1);
        ids.extend(self.0.iter().cloned());
        ids.push(id.clone());
        Path(ids)
    }

    /// The path of the parent, or `None` for the root path
    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            return None;
        }
        Some(Path(self.0[..self.0.len() - 1].to_vec()))
    }

    /// The node this path leads to (`None` for the root path)
    pub fn last(&self) -> Option<&NodeId> {
        self.0.last()
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}

/// A stored node: payload plus its canonical relations.
///
/// Relations are id lists looked up through the owning `MainTree`; only the
/// tree edits them, which keeps parent and child lists symmetric.
#[derive(Debug, Clone)]
pub struct Node<T> {
    id: NodeId,
    payload: T,
    pub(crate) parents: Vec<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl<T> Node<T> {
    /// Create a detached node
    pub fn new(id: impl Into<NodeId>, payload: T) -> Self {
        Node {
            id: id.into(),
            payload,
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Mutable payload access. Callers owning the tree must follow up with
    /// `modify_node` so views re-evaluate the node.
    pub fn payload_mut(&mut self) -> &mut T {
        &mut self.payload
    }

    pub fn into_payload(self) -> T {
        self.payload
    }

    /// Parent ids, in the order the relationships were created
    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    /// Child ids, in sibling order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn has_parent(&self) -> bool {
        !self.parents.is_empty()
    }

    pub fn has_child(&self, id: &str) -> bool {
        self.children.iter().any(|c| c == id)
    }

    pub fn is_child_of(&self, id: &str) -> bool {
        self.parents.iter().any(|p| p == id)
    }

    pub fn n_children(&self) -> usize {
        self.children.len()
    }
}

/// Anything addressable by a [`NodeId`]
pub trait Identified {
    fn node_id(&self) -> &NodeId;
}

impl<T> Identified for Node<T> {
    fn node_id(&self) -> &NodeId {
        &self.id
    }
}
