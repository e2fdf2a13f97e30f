use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::TreeError;
use crate::model::event::{ChangeKind, TreeChange};
use crate::model::node::{Node, NodeId, Path};
use crate::util::signal::{ListenerId, Listeners};

/// The canonical node store.
///
/// Owns every node and is the only place parent/child edges are edited.
/// Every edit is recorded as a [`TreeChange`]: connected listeners see it
/// immediately, and the change journal keeps it until the owner drains it.
#[derive(Debug)]
pub struct MainTree<T> {
    nodes: IndexMap<NodeId, Node<T>>,
    /// Nodes without a parent, in sibling order
    root_children: Vec<NodeId>,
    /// `(parent, child)` pairs waiting for one of their endpoints
    pending: Vec<(NodeId, NodeId)>,
    journal: Vec<TreeChange>,
    listeners: Listeners<TreeChange>,
}

/// Plain-data copy of the canonical structure, for comparisons and dumps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub root_children: Vec<NodeId>,
    pub pending: Vec<(NodeId, NodeId)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub parents: Vec<NodeId>,
    pub children: Vec<NodeId>,
}

impl<T> Default for MainTree<T> {
    fn default() -> Self {
        MainTree {
            nodes: IndexMap::new(),
            root_children: Vec::new(),
            pending: Vec::new(),
            journal: Vec::new(),
            listeners: Listeners::new(),
        }
    }
}

impl<T> MainTree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get_node(&self, id: &str) -> Result<&Node<T>, TreeError> {
        self.nodes
            .get(id)
            .ok_or_else(|| TreeError::NotFound(NodeId::from(id)))
    }

    /// Mutable payload access without notification; follow with
    /// [`MainTree::modify_node`].
    pub fn payload_mut(&mut self, id: &str) -> Result<&mut T, TreeError> {
        self.nodes
            .get_mut(id)
            .map(Node::payload_mut)
            .ok_or_else(|| TreeError::NotFound(NodeId::from(id)))
    }

    /// All node ids in insertion order
    pub fn get_all_nodes(&self) -> Vec<NodeId> {
        self.nodes.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node<T>> {
        self.nodes.values()
    }

    /// Ids of the nodes without parents, in sibling order
    pub fn root_children(&self) -> &[NodeId] {
        &self.root_children
    }

    /// Children of a node; the root id yields the root-level nodes
    pub fn children_of(&self, id: &str) -> Result<&[NodeId], TreeError> {
        if id == crate::model::node::ROOT_ID {
            return Ok(&self.root_children);
        }
        Ok(self.get_node(id)?.children())
    }

    pub fn pending_relationships(&self) -> &[(NodeId, NodeId)] {
        &self.pending
    }

    /// True if `ancestor` is reachable by following parent links from `node`
    pub fn is_ancestor(&self, ancestor: &str, node: &str) -> bool {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![node];
        while let Some(current) = stack.pop() {
            let Some(n) = self.nodes.get(current) else {
                continue;
            };
            for parent in n.parents() {
                if parent == ancestor {
                    return true;
                }
                if visited.insert(parent.as_str()) {
                    stack.push(parent.as_str());
                }
            }
        }
        false
    }

    /// Every root-relative path to the node, one per parent chain
    pub fn get_paths_for_node(&self, id: &str) -> Result<Vec<Path>, TreeError> {
        if id == crate::model::node::ROOT_ID {
            return Ok(vec![Path::root()]);
        }
        let node = self.get_node(id)?;
        if !node.has_parent() {
            return Ok(vec![Path::root().child(node.id())]);
        }
        let mut paths = Vec::new();
        for parent in node.parents() {
            for path in self.get_paths_for_node(parent.as_str())? {
                paths.push(path.child(node.id()));
            }
        }
        Ok(paths)
    }

    /// The sibling after `id` under `parent` (or under its first parent, or
    /// the root when it has none).
    pub fn next_node(&self, id: &str, parent: Option<&str>) -> Result<Option<NodeId>, TreeError> {
        let node = self.get_node(id)?;
        let siblings: &[NodeId] = match parent {
            Some(p) if p == crate::model::node::ROOT_ID => &self.root_children,
            Some(p) => {
                let parent_node = self.get_node(p)?;
                if !parent_node.has_child(id) {
                    return Err(TreeError::NotChildOf {
                        parent: NodeId::from(p),
                        child: NodeId::from(id),
                    });
                }
                parent_node.children()
            }
            None => match node.parents().first() {
                Some(first) => self.get_node(first.as_str())?.children(),
                None => &self.root_children,
            },
        };
        let pos = siblings.iter().position(|s| s == id).ok_or_else(|| TreeError::NotChildOf {
            parent: parent.map(NodeId::from).unwrap_or_else(NodeId::root),
            child: NodeId::from(id),
        })?;
        Ok(siblings.get(pos + 1).cloned())
    }

    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            nodes: self
                .nodes
                .values()
                .map(|n| NodeSnapshot {
                    id: n.id().clone(),
                    parents: n.parents().to_vec(),
                    children: n.children().to_vec(),
                })
                .collect(),
            root_children: self.root_children.clone(),
            pending: self.pending.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Listeners and journal
    // -----------------------------------------------------------------------

    pub fn connect(&mut self, kind: ChangeKind, callback: impl FnMut(&TreeChange) + 'static) -> ListenerId {
        self.listeners.connect(kind, callback)
    }

    pub fn connect_all(&mut self, callback: impl FnMut(&TreeChange) + 'static) -> ListenerId {
        self.listeners.connect_all(callback)
    }

    pub fn disconnect(&mut self, id: ListenerId) -> bool {
        self.listeners.disconnect(id)
    }

    /// Take every change recorded since the last drain, oldest first
    pub fn drain_changes(&mut self) -> Vec<TreeChange> {
        std::mem::take(&mut self.journal)
    }

    fn record(&mut self, change: TreeChange) {
        self.listeners.emit(&change);
        self.journal.push(change);
    }

    // -----------------------------------------------------------------------
    // Structural edits
    // -----------------------------------------------------------------------

    /// Insert a node, optionally under `parent`.
    ///
    /// Returns `Ok(false)` without touching anything if the id is already
    /// present. A parent that does not exist yet is remembered as a pending
    /// relationship; the node sits at the root until the parent arrives.
    pub fn add_node(&mut self, node: Node<T>, parent: Option<&str>) -> Result<bool, TreeError> {
        let id = node.id().clone();
        if id.is_root() {
            return Err(TreeError::ReservedId(id));
        }
        if self.nodes.contains_key(id.as_str()) {
            warn!(node = %id, "node already exists, ignoring add");
            return Ok(false);
        }
        if let Some(p) = parent {
            if p == crate::model::node::ROOT_ID {
                return Err(TreeError::ReservedId(NodeId::from(p)));
            }
            if self.add_would_cycle(&id, p) {
                return Err(TreeError::CircularRelationship {
                    parent: NodeId::from(p),
                    child: id,
                });
            }
        }

        let mut node = node;
        node.parents.clear();
        node.children.clear();
        self.nodes.insert(id.clone(), node);
        self.root_children.push(id.clone());
        debug!(node = %id, parent = ?parent, "node added");

        let mut touched = self.resolve_pending(&id);
        if let Some(p) = parent {
            if self.nodes.contains_key(p) {
                if !self.would_cycle(p, id.as_str()) {
                    self.link(p, id.as_str());
                    touched.push(NodeId::from(p));
                }
            } else {
                self.push_pending(NodeId::from(p), id.clone());
            }
        }

        self.record(TreeChange::Added(id));
        let mut seen = HashSet::new();
        for neighbour in touched {
            if seen.insert(neighbour.clone()) {
                self.record(TreeChange::Modified(neighbour));
            }
        }
        Ok(true)
    }

    /// Remove a node. With `recursive`, its whole descendant subtree goes
    /// first (post-order). Otherwise children that lose their last parent
    /// move to the root; children with other parents stay where they are.
    pub fn remove_node(&mut self, id: &str, recursive: bool) -> Result<(), TreeError> {
        if !self.nodes.contains_key(id) {
            return Err(TreeError::NotFound(NodeId::from(id)));
        }
        self.remove_inner(id, recursive);
        Ok(())
    }

    fn remove_inner(&mut self, id: &str, recursive: bool) {
        if recursive {
            let children = self.nodes.get(id).map(|n| n.children.clone()).unwrap_or_default();
            for child in children {
                if self.nodes.contains_key(child.as_str()) {
                    self.remove_inner(child.as_str(), true);
                }
            }
        }

        let Some(node) = self.nodes.shift_remove(id) else {
            return;
        };
        for parent in &node.parents {
            if let Some(p) = self.nodes.get_mut(parent.as_str()) {
                p.children.retain(|c| c != id);
            }
        }
        for child in &node.children {
            if let Some(c) = self.nodes.get_mut(child.as_str()) {
                c.parents.retain(|p| p != id);
                if c.parents.is_empty() {
                    self.root_children.push(child.clone());
                }
            }
        }
        self.root_children.retain(|r| r != id);
        self.pending.retain(|(p, c)| p != id && c != id);
        debug!(node = %id, recursive, "node removed");

        self.record(TreeChange::Deleted(node.id().clone()));
        for neighbour in node.parents.iter().chain(node.children.iter()) {
            if self.nodes.contains_key(neighbour.as_str()) {
                self.record(TreeChange::Modified(neighbour.clone()));
            }
        }
    }

    /// Announce a payload change without touching structure
    pub fn modify_node(&mut self, id: &str) -> Result<(), TreeError> {
        let node = self.get_node(id)?;
        let id = node.id().clone();
        self.record(TreeChange::Modified(id));
        Ok(())
    }

    /// Mutate a payload in place and announce it
    pub fn update_payload(&mut self, id: &str, f: impl FnOnce(&mut T)) -> Result<(), TreeError> {
        f(self.payload_mut(id)?);
        self.modify_node(id)
    }

    /// Announce a change for every node, e.g. when a time-based filter
    /// parameter moved on
    pub fn refresh_all(&mut self) {
        for id in self.get_all_nodes() {
            self.record(TreeChange::Modified(id));
        }
    }

    /// Make `child` a child of `parent`.
    ///
    /// Returns `Ok(false)` if the edge already exists, or if an endpoint is
    /// missing (the pair is then kept pending).
    pub fn new_relationship(&mut self, parent: &str, child: &str) -> Result<bool, TreeError> {
        if parent == child {
            return Err(TreeError::CircularRelationship {
                parent: NodeId::from(parent),
                child: NodeId::from(child),
            });
        }
        for end in [parent, child] {
            if end == crate::model::node::ROOT_ID {
                return Err(TreeError::ReservedId(NodeId::from(end)));
            }
        }
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            self.push_pending(NodeId::from(parent), NodeId::from(child));
            return Ok(false);
        }
        if self.nodes[parent].has_child(child) {
            return Ok(false);
        }
        if self.would_cycle(parent, child) {
            return Err(TreeError::CircularRelationship {
                parent: NodeId::from(parent),
                child: NodeId::from(child),
            });
        }

        self.link(parent, child);
        debug!(parent, child, "relationship created");
        self.record(TreeChange::Modified(NodeId::from(child)));
        self.record(TreeChange::Modified(NodeId::from(parent)));
        Ok(true)
    }

    /// Remove the edge `parent -> child`. A child left without parents moves
    /// to the root. Returns `Ok(false)` if there was no such edge.
    pub fn break_relationship(&mut self, parent: &str, child: &str) -> Result<bool, TreeError> {
        self.pending.retain(|(p, c)| !(p == parent && c == child));
        let linked = self
            .nodes
            .get(parent)
            .is_some_and(|p| p.has_child(child))
            && self.nodes.contains_key(child);
        if !linked {
            return Ok(false);
        }

        self.unlink(parent, child);
        debug!(parent, child, "relationship broken");
        self.record(TreeChange::Modified(NodeId::from(child)));
        self.record(TreeChange::Modified(NodeId::from(parent)));
        Ok(true)
    }

    /// Detach a node from all its parents and attach it under `new_parent`
    /// (or the root). Validated up front: on error nothing changes.
    pub fn move_node(&mut self, id: &str, new_parent: Option<&str>) -> Result<(), TreeError> {
        let old_parents = self.get_node(id)?.parents.clone();
        if let Some(p) = new_parent {
            if !self.nodes.contains_key(p) {
                return Err(TreeError::NotFound(NodeId::from(p)));
            }
            if self.would_cycle(p, id) {
                return Err(TreeError::CircularRelationship {
                    parent: NodeId::from(p),
                    child: NodeId::from(id),
                });
            }
        }

        for parent in &old_parents {
            if Some(parent.as_str()) != new_parent {
                self.unlink(parent.as_str(), id);
            }
        }
        if let Some(p) = new_parent
            && !self.nodes[p].has_child(id)
        {
            self.link(p, id);
        }
        debug!(node = id, parent = ?new_parent, "node moved");

        self.record(TreeChange::Modified(NodeId::from(id)));
        for parent in old_parents.iter().map(NodeId::as_str).chain(new_parent) {
            if parent != id {
                self.record(TreeChange::Modified(NodeId::from(parent)));
            }
        }
        Ok(())
    }

    /// Replace the child order of `parent` (the root id reorders the
    /// root-level nodes). `order` must be a permutation of the current
    /// children.
    pub fn reorder_children(&mut self, parent: &str, order: &[NodeId]) -> Result<(), TreeError> {
        let current = self.children_of(parent)?;
        let is_permutation = current.len() == order.len() && {
            let wanted: HashSet<&NodeId> = order.iter().collect();
            wanted.len() == order.len() && current.iter().all(|c| wanted.contains(c))
        };
        if !is_permutation {
            return Err(TreeError::InvalidOrder(NodeId::from(parent)));
        }

        if parent == crate::model::node::ROOT_ID {
            self.root_children = order.to_vec();
        } else if let Some(p) = self.nodes.get_mut(parent) {
            p.children = order.to_vec();
        }
        self.record(TreeChange::Reordered(NodeId::from(parent)));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Would the edge `parent -> child` close a cycle?
    fn would_cycle(&self, parent: &str, child: &str) -> bool {
        parent == child || self.is_ancestor(child, parent)
    }

    /// Would adding `id` under `parent` close a cycle once the pending
    /// relationships naming `id` as parent are resolved?
    fn add_would_cycle(&self, id: &NodeId, parent: &str) -> bool {
        if id == parent {
            return true;
        }
        self.pending
            .iter()
            .filter(|(p, c)| p == id && self.nodes.contains_key(c.as_str()))
            .any(|(_, c)| c == parent || self.is_ancestor(c.as_str(), parent))
    }

    fn push_pending(&mut self, parent: NodeId, child: NodeId) {
        if !self.pending.iter().any(|(p, c)| *p == parent && *c == child) {
            debug!(%parent, %child, "relationship pending");
            self.pending.push((parent, child));
        }
    }

    /// Apply pending pairs that became complete with `id`. Returns the
    /// neighbours that gained an edge.
    fn resolve_pending(&mut self, id: &NodeId) -> Vec<NodeId> {
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|(p, c)| {
                (p == id || c == id)
                    && self.nodes.contains_key(p.as_str())
                    && self.nodes.contains_key(c.as_str())
            });
        self.pending = waiting;

        let mut touched = Vec::new();
        for (parent, child) in ready {
            if self.nodes[parent.as_str()].has_child(child.as_str()) {
                continue;
            }
            if self.would_cycle(parent.as_str(), child.as_str()) {
                warn!(%parent, %child, "dropping pending relationship that would create a cycle");
                continue;
            }
            self.link(parent.as_str(), child.as_str());
            touched.push(if parent == *id { child } else { parent });
        }
        touched
    }

    fn link(&mut self, parent: &str, child: &str) {
        if let Some(c) = self.nodes.get_mut(child) {
            if c.parents.is_empty() {
                self.root_children.retain(|r| r != child);
            }
            c.parents.push(NodeId::from(parent));
        }
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(NodeId::from(child));
        }
    }

    fn unlink(&mut self, parent: &str, child: &str) {
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|c| c != child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parents.retain(|p| p != parent);
            if c.parents.is_empty() {
                self.root_children.push(NodeId::from(child));
            }
        }
    }
}
