use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, trace};

use crate::error::TreeError;
use crate::model::event::{TreeChange, ViewEvent, ViewEventKind};
use crate::model::node::{NodeId, Path};
use crate::ops::filter_bank::{FilterBank, FilterParams, param_flag};
use crate::ops::main_tree::MainTree;
use crate::util::signal::{ListenerId, Listeners};

/// Which neighbours an update may cascade to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Re-evaluate displayed parents (their admission may depend on us)
    Up,
    /// Pick up admitted children not yet in the view
    Down,
    Both,
}

impl Direction {
    fn up(self) -> bool {
        matches!(self, Direction::Up | Direction::Both)
    }

    fn down(self) -> bool {
        matches!(self, Direction::Down | Direction::Both)
    }
}

/// Position of `id` in a main-tree child list; unlisted ids sort last
fn sibling_rank(order: &[NodeId], id: &NodeId) -> usize {
    order.iter().position(|o| o == id).unwrap_or(usize::MAX)
}

/// Read access to what a view projects: the canonical tree and the filters.
pub struct Source<'a, T> {
    pub tree: &'a MainTree<T>,
    pub bank: &'a FilterBank<T>,
}

impl<T> Clone for Source<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Source<'_, T> {}

/// A filter as applied to one view
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedFilter {
    pub name: String,
    /// Filter defaults overlaid with the parameters given at apply time
    pub params: FilterParams,
    pub flat: bool,
    pub transparent: bool,
}

/// Displayed edges of one node
#[derive(Debug, Clone, Default)]
struct Entry {
    parents: Vec<NodeId>,
    children: Vec<NodeId>,
}

/// An incrementally maintained, filtered projection of a [`MainTree`].
///
/// The cache holds exactly the nodes that pass every applied filter, plus
/// an entry for the virtual root. A node whose admitted parents are all
/// filtered out hangs under the root. Every change is reported to observers
/// as [`ViewEvent`]s whose paths resolve in the cache at the moment of
/// delivery: removals go bottom-up, additions top-down.
pub struct FilteredView {
    is_static: bool,
    applied: Vec<AppliedFilter>,
    flat: bool,
    nodes: HashMap<NodeId, Entry>,
    observers: Listeners<ViewEvent>,
}

impl std::fmt::Debug for FilteredView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteredView")
            .field("is_static", &self.is_static)
            .field("applied", &self.list_applied_filters())
            .field("flat", &self.flat)
            .field("displayed", &(self.nodes.len() - 1))
            .field("observers", &self.observers)
            .finish()
    }
}

impl FilteredView {
    pub(crate) fn new(is_static: bool) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(NodeId::root(), Entry::default());
        FilteredView {
            is_static,
            applied: Vec::new(),
            flat: false,
            nodes,
            observers: Listeners::new(),
        }
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn is_flat(&self) -> bool {
        self.flat
    }

    // -----------------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------------

    pub fn connect(&mut self, kind: ViewEventKind, callback: impl FnMut(&ViewEvent) + 'static) -> ListenerId {
        self.observers.connect(kind, callback)
    }

    pub fn connect_all(&mut self, callback: impl FnMut(&ViewEvent) + 'static) -> ListenerId {
        self.observers.connect_all(callback)
    }

    pub fn disconnect(&mut self, id: ListenerId) -> bool {
        self.observers.disconnect(id)
    }

    /// The current projection as a top-down sequence of `Added` events, for
    /// observers attaching to an already populated view.
    pub fn get_current_state(&self) -> Vec<ViewEvent> {
        let mut events = Vec::new();
        self.walk(|id, path| {
            events.push(ViewEvent::Added {
                node: id.clone(),
                path: path.clone(),
            })
        });
        events
    }

    /// Send [`FilteredView::get_current_state`] to the connected observers
    pub fn replay_current_state(&mut self) {
        for event in self.get_current_state() {
            self.observers.emit(&event);
        }
    }

    // -----------------------------------------------------------------------
    // Filters
    // -----------------------------------------------------------------------

    pub fn list_applied_filters(&self) -> Vec<&str> {
        self.applied.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn applied_filters(&self) -> &[AppliedFilter] {
        &self.applied
    }

    pub fn is_filtered_by(&self, name: &str) -> bool {
        self.applied.iter().any(|f| f.name == name)
    }

    pub(crate) fn apply_filter<T>(
        &mut self,
        src: Source<'_, T>,
        name: &str,
        params: Option<FilterParams>,
        reset: bool,
        refresh: bool,
    ) -> Result<(), TreeError> {
        if self.is_static {
            return Err(TreeError::StaticView);
        }
        let filter = src
            .bank
            .get_filter(name)
            .ok_or_else(|| TreeError::UnknownFilter(name.to_string()))?;

        if reset {
            self.applied.clear();
        }
        let mut effective = filter.params().clone();
        if let Some(params) = params {
            effective.extend(params);
        }
        let applied = AppliedFilter {
            name: name.to_string(),
            flat: filter.is_flat() || param_flag(&effective, "flat"),
            transparent: filter.is_transparent() || param_flag(&effective, "transparent"),
            params: effective,
        };
        match self.applied.iter_mut().find(|f| f.name == name) {
            Some(existing) => *existing = applied,
            None => self.applied.push(applied),
        }
        debug!(filter = name, reset, refresh, "filter applied");

        if refresh {
            self.refilter(src);
        }
        Ok(())
    }

    /// Returns false if the filter was not applied to this view
    pub(crate) fn unapply_filter<T>(&mut self, src: Source<'_, T>, name: &str, refresh: bool) -> Result<bool, TreeError> {
        if self.is_static {
            return Err(TreeError::StaticView);
        }
        if !src.bank.has_filter(name) && !self.is_filtered_by(name) {
            return Err(TreeError::UnknownFilter(name.to_string()));
        }
        Ok(self.drop_applied(src, name, refresh))
    }

    /// Remove an applied filter, whether or not the bank still knows it.
    /// Returns false if it was not applied.
    pub(crate) fn drop_applied<T>(&mut self, src: Source<'_, T>, name: &str, refresh: bool) -> bool {
        let before = self.applied.len();
        self.applied.retain(|f| f.name != name);
        if self.applied.len() == before {
            return false;
        }
        debug!(filter = name, refresh, "filter unapplied");
        if refresh {
            self.refilter(src);
        }
        true
    }

    pub(crate) fn reset_filters<T>(&mut self, src: Source<'_, T>, refresh: bool, transparent_only: bool) -> Result<(), TreeError> {
        if self.is_static {
            return Err(TreeError::StaticView);
        }
        self.applied.retain(|f| transparent_only && !f.transparent);
        if refresh {
            self.refilter(src);
        }
        Ok(())
    }

    /// Does the node exist and pass every applied filter?
    pub(crate) fn admits<T>(&self, src: Source<'_, T>, id: &str) -> bool {
        if id == crate::model::node::ROOT_ID {
            return false;
        }
        let Ok(node) = src.tree.get_node(id) else {
            return false;
        };
        self.applied.iter().all(|applied| match src.bank.get_filter(&applied.name) {
            Some(filter) => filter.evaluate(node, src.tree, &applied.params),
            // Removed from the bank after being applied: no longer restricts
            None => true,
        })
    }

    /// Parents the node should be displayed under
    pub(crate) fn view_parents<T>(&self, src: Source<'_, T>, id: &str) -> Vec<NodeId> {
        if self.flat {
            return vec![NodeId::root()];
        }
        let parents: Vec<NodeId> = match src.tree.get_node(id) {
            Ok(node) => node
                .parents()
                .iter()
                .filter(|p| self.admits(src, p.as_str()))
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        };
        if parents.is_empty() {
            vec![NodeId::root()]
        } else {
            parents
        }
    }

    /// Children the node should display
    fn view_children<T>(&self, src: Source<'_, T>, id: &str) -> Vec<NodeId> {
        if self.flat {
            return Vec::new();
        }
        match src.tree.get_node(id) {
            Ok(node) => node
                .children()
                .iter()
                .filter(|c| self.admits(src, c.as_str()))
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    /// Drop the whole projection and rebuild it from the main tree
    pub(crate) fn refilter<T>(&mut self, src: Source<'_, T>) {
        self.flat = self.applied.iter().any(|f| f.flat);

        let root = NodeId::root();
        let top: Vec<NodeId> = self.nodes[&root].children.clone();
        for id in top.iter().rev() {
            self.emit_subtree_removal(id, &root);
        }
        self.nodes.clear();
        self.nodes.insert(root, Entry::default());

        let mut queue: VecDeque<NodeId> = src.tree.root_children().iter().cloned().collect();
        let mut visited: HashSet<NodeId> = HashSet::new();
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id.clone()) {
                continue;
            }
            if !self.nodes.contains_key(&id) {
                self.update_node(src, &id, Direction::Both);
            }
            if let Ok(node) = src.tree.get_node(id.as_str()) {
                queue.extend(node.children().iter().cloned());
            }
        }
        debug!(displayed = self.nodes.len() - 1, flat = self.flat, "view refiltered");
    }

    /// React to one structural change of the main tree
    pub(crate) fn on_change<T>(&mut self, src: Source<'_, T>, change: &TreeChange) {
        match change {
            TreeChange::Added(id) | TreeChange::Modified(id) | TreeChange::Deleted(id) => {
                self.update_node(src, id, Direction::Both);
            }
            TreeChange::Reordered(id) => self.reorder(src, id),
        }
    }

    /// Bring one node's cache entry in line with the main tree and filters,
    /// cascading to neighbours per `direction`.
    pub(crate) fn update_node<T>(&mut self, src: Source<'_, T>, id: &NodeId, direction: Direction) {
        if id.is_root() {
            return;
        }
        let current_display = self.nodes.contains_key(id);
        let new_display = self.admits(src, id.as_str());
        trace!(node = %id, current_display, new_display, ?direction, "update node");

        match (current_display, new_display) {
            (false, false) => return,
            (true, false) => {
                self.delete_node(src, id);
                return;
            }
            (false, true) => {
                self.nodes.insert(id.clone(), Entry::default());
            }
            (true, true) => {}
        }
        let added = !current_display;

        let mut direction = direction;
        let new_parents = self.view_parents(src, id.as_str());
        let current_parents = self.nodes[id].parents.clone();
        let remove_from: Vec<NodeId> = current_parents
            .iter()
            .filter(|p| !new_parents.contains(*p))
            .cloned()
            .collect();
        let add_to: Vec<NodeId> = new_parents
            .iter()
            .filter(|p| !current_parents.contains(*p))
            .cloned()
            .collect();
        let stay: Vec<NodeId> = new_parents
            .iter()
            .filter(|p| current_parents.contains(*p))
            .cloned()
            .collect();

        if direction == Direction::Down && add_to.iter().any(NodeId::is_root) {
            direction = Direction::Both;
        }

        for parent in &remove_from {
            if !self.is_linked(parent, id) {
                continue;
            }
            self.emit_subtree_removal(id, parent);
            self.unlink(parent, id);
            if !parent.is_root() {
                self.update_node(src, parent, Direction::Up);
            }
        }

        for parent in &add_to {
            if !self.nodes.contains_key(parent) {
                // Admitted but not materialised yet
                self.update_node(src, parent, Direction::Up);
            }
            if !self.nodes.contains_key(parent) {
                continue;
            }
            if !self.nodes.contains_key(id) {
                return;
            }
            if self.is_linked(parent, id) {
                continue;
            }
            self.link(src, parent, id);
            self.emit_subtree_addition(id, parent);
            if direction.up() && !parent.is_root() {
                self.update_node(src, parent, Direction::Up);
            }
        }

        if let Some(entry) = self.nodes.get_mut(id) {
            entry
                .parents
                .sort_by_key(|p| new_parents.iter().position(|n| n == p).unwrap_or(usize::MAX));
        }

        if !added {
            for path in self.paths(id) {
                self.observers.emit(&ViewEvent::Modified {
                    node: id.clone(),
                    path,
                });
            }
        }

        if direction.up() {
            for parent in &stay {
                if !parent.is_root() && self.nodes.contains_key(parent) {
                    self.update_node(src, parent, Direction::Up);
                }
            }
        }

        if direction.down() && self.nodes.contains_key(id) {
            for child in self.view_children(src, id.as_str()) {
                if !self.is_linked(id, &child) {
                    self.update_node(src, &child, Direction::Down);
                }
            }
        }
    }

    /// Remove a node that stopped passing the filters (or left the tree)
    fn delete_node<T>(&mut self, src: Source<'_, T>, id: &NodeId) {
        let paths = self.paths(id);
        self.emit_removal(id, &paths);

        let Some(entry) = self.nodes.remove(id) else {
            return;
        };
        for parent in &entry.parents {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|c| c != id);
            }
        }
        for child in &entry.children {
            if let Some(c) = self.nodes.get_mut(child) {
                c.parents.retain(|p| p != id);
            }
        }
        trace!(node = %id, "node left the view");

        // Orphaned children re-attach elsewhere (or leave too)
        for child in &entry.children {
            self.update_node(src, child, Direction::Both);
        }
        for parent in &entry.parents {
            if !parent.is_root() && self.nodes.contains_key(parent) {
                self.update_node(src, parent, Direction::Up);
            }
        }
    }

    fn reorder<T>(&mut self, src: Source<'_, T>, id: &NodeId) {
        if !self.nodes.contains_key(id) || (self.flat && !id.is_root()) {
            return;
        }
        let Ok(order) = src.tree.children_of(id.as_str()) else {
            return;
        };
        let old = self.nodes[id].children.clone();
        let mut new = old.clone();
        new.sort_by_key(|c| sibling_rank(order, c));
        if new == old {
            return;
        }

        let new_order: Vec<usize> = new
            .iter()
            .filter_map(|c| old.iter().position(|o| o == c))
            .collect();
        if let Some(entry) = self.nodes.get_mut(id) {
            entry.children = new;
        }
        for path in self.paths(id) {
            self.observers.emit(&ViewEvent::Reordered {
                node: id.clone(),
                path,
                new_order: new_order.clone(),
            });
        }
    }

    // -----------------------------------------------------------------------
    // Cache edits and event emission
    // -----------------------------------------------------------------------

    fn is_linked(&self, parent: &NodeId, child: &NodeId) -> bool {
        self.nodes
            .get(parent)
            .is_some_and(|e| e.children.contains(child))
    }

    /// Siblings keep main-tree order; nodes without a position under
    /// `parent` in the main tree (root-level stand-ins, flat views) follow
    /// them in arrival order.
    fn link<T>(&mut self, src: Source<'_, T>, parent: &NodeId, child: &NodeId) {
        let order = src.tree.children_of(parent.as_str()).unwrap_or(&[]);
        if let Some(p) = self.nodes.get_mut(parent) {
            let rank = sibling_rank(order, child);
            let at = p
                .children
                .iter()
                .position(|c| sibling_rank(order, c) > rank)
                .unwrap_or(p.children.len());
            p.children.insert(at, child.clone());
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parents.push(parent.clone());
        }
    }

    fn unlink(&mut self, parent: &NodeId, child: &NodeId) {
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|c| c != child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parents.retain(|p| p != parent);
        }
    }

    /// Announce the removal of `id` and its displayed descendants at every
    /// path that runs through `parent`
    fn emit_subtree_removal(&mut self, id: &NodeId, parent: &NodeId) {
        let paths: Vec<Path> = self.paths(parent).iter().map(|p| p.child(id)).collect();
        self.emit_removal(id, &paths);
    }

    fn emit_removal(&mut self, id: &NodeId, paths: &[Path]) {
        if paths.is_empty() {
            return;
        }
        let children = self.nodes.get(id).map(|e| e.children.clone()).unwrap_or_default();
        for child in children.iter().rev() {
            let child_paths: Vec<Path> = paths.iter().map(|p| p.child(child)).collect();
            self.emit_removal(child, &child_paths);
        }
        for path in paths {
            self.observers.emit(&ViewEvent::Deleted {
                node: id.clone(),
                path: path.clone(),
            });
        }
    }

    fn emit_subtree_addition(&mut self, id: &NodeId, parent: &NodeId) {
        let paths: Vec<Path> = self.paths(parent).iter().map(|p| p.child(id)).collect();
        self.emit_addition(id, &paths);
    }

    fn emit_addition(&mut self, id: &NodeId, paths: &[Path]) {
        if paths.is_empty() {
            return;
        }
        for path in paths {
            self.observers.emit(&ViewEvent::Added {
                node: id.clone(),
                path: path.clone(),
            });
        }
        let children = self.nodes.get(id).map(|e| e.children.clone()).unwrap_or_default();
        for child in &children {
            let child_paths: Vec<Path> = paths.iter().map(|p| p.child(child)).collect();
            self.emit_addition(child, &child_paths);
        }
    }

    /// Paths computed from the cache alone: empty for undisplayed nodes
    fn paths(&self, id: &NodeId) -> Vec<Path> {
        if id.is_root() {
            return vec![Path::root()];
        }
        let Some(entry) = self.nodes.get(id) else {
            return Vec::new();
        };
        let mut paths = Vec::new();
        for parent in &entry.parents {
            for path in self.paths(parent) {
                paths.push(path.child(id));
            }
        }
        paths
    }

    // -----------------------------------------------------------------------
    // Queries (cache only)
    // -----------------------------------------------------------------------

    fn entry(&self, id: Option<&str>) -> Result<&Entry, TreeError> {
        let key = id.unwrap_or(crate::model::node::ROOT_ID);
        self.nodes
            .get(key)
            .ok_or_else(|| TreeError::NotDisplayed(NodeId::from(key)))
    }

    pub fn is_displayed(&self, id: &str) -> bool {
        id != crate::model::node::ROOT_ID && self.nodes.contains_key(id)
    }

    /// Displayed children of a node (`None` for the root)
    pub fn node_all_children(&self, id: Option<&str>) -> Result<Vec<NodeId>, TreeError> {
        Ok(self.entry(id)?.children.clone())
    }

    /// Number of displayed children, or of distinct displayed descendants
    /// with `recursive`
    pub fn node_n_children(&self, id: Option<&str>, recursive: bool) -> Result<usize, TreeError> {
        let entry = self.entry(id)?;
        if !recursive {
            return Ok(entry.children.len());
        }
        let mut seen: HashSet<&NodeId> = HashSet::new();
        let mut stack: Vec<&NodeId> = entry.children.iter().collect();
        while let Some(current) = stack.pop() {
            if seen.insert(current)
                && let Some(e) = self.nodes.get(current)
            {
                stack.extend(e.children.iter());
            }
        }
        Ok(seen.len())
    }

    pub fn node_nth_child(&self, id: Option<&str>, n: usize) -> Result<Option<NodeId>, TreeError> {
        Ok(self.entry(id)?.children.get(n).cloned())
    }

    /// Displayed parents; empty for nodes hanging under the root
    pub fn node_parents(&self, id: &str) -> Result<Vec<NodeId>, TreeError> {
        if id == crate::model::node::ROOT_ID {
            return Ok(Vec::new());
        }
        Ok(self
            .entry(Some(id))?
            .parents
            .iter()
            .filter(|p| !p.is_root())
            .cloned()
            .collect())
    }

    pub fn node_has_child(&self, id: Option<&str>, child: &str) -> Result<bool, TreeError> {
        Ok(self.entry(id)?.children.iter().any(|c| c == child))
    }

    pub fn node_has_parent(&self, id: &str) -> Result<bool, TreeError> {
        Ok(!self.node_parents(id)?.is_empty())
    }

    /// The displayed sibling after `id` under `parent` (default: its first
    /// displayed parent, which may be the root)
    pub fn next_node(&self, id: &str, parent: Option<&str>) -> Result<Option<NodeId>, TreeError> {
        let entry = self.entry(Some(id))?;
        let parent_id = match parent {
            Some(p) => NodeId::from(p),
            None => entry.parents.first().cloned().unwrap_or_else(NodeId::root),
        };
        let siblings = &self.entry(Some(parent_id.as_str()))?.children;
        let pos = siblings
            .iter()
            .position(|s| s == id)
            .ok_or_else(|| TreeError::NotChildOf {
                parent: parent_id.clone(),
                child: NodeId::from(id),
            })?;
        Ok(siblings.get(pos + 1).cloned())
    }

    /// Every path at which the node is displayed; the root has the empty path
    pub fn get_paths_for_node(&self, id: &str) -> Result<Vec<Path>, TreeError> {
        let id = NodeId::from(id);
        if !id.is_root() && !self.nodes.contains_key(&id) {
            return Err(TreeError::NotDisplayed(id));
        }
        Ok(self.paths(&id))
    }

    /// Resolve a path against the displayed structure
    pub fn get_node_for_path(&self, path: &Path) -> Result<NodeId, TreeError> {
        let mut current = NodeId::root();
        for step in path.ids() {
            if !self.is_linked(&current, step) {
                return Err(TreeError::NotDisplayed(step.clone()));
            }
            current = step.clone();
        }
        Ok(current)
    }

    /// Positional form of a path: the index of each step among its
    /// displayed siblings
    pub fn index_path(&self, path: &Path) -> Result<Vec<usize>, TreeError> {
        let mut current = NodeId::root();
        let mut indices = Vec::with_capacity(path.len());
        for step in path.ids() {
            let children = &self.entry(Some(current.as_str()))?.children;
            let pos = children
                .iter()
                .position(|c| c == step)
                .ok_or_else(|| TreeError::NotDisplayed(step.clone()))?;
            indices.push(pos);
            current = step.clone();
        }
        Ok(indices)
    }

    /// Every displayed node once, in depth-first display order
    pub fn get_all_nodes(&self) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.walk(|id, _| {
            if seen.insert(id.clone()) {
                out.push(id.clone());
            }
        });
        out
    }

    /// Visit every displayed (node, path) pair depth-first, parents before
    /// children; a multi-parent node is visited once per path
    pub fn walk(&self, mut visit: impl FnMut(&NodeId, &Path)) {
        fn go(view: &FilteredView, id: &NodeId, path: &Path, visit: &mut dyn FnMut(&NodeId, &Path)) {
            visit(id, path);
            if let Some(entry) = view.nodes.get(id) {
                for child in &entry.children {
                    go(view, child, &path.child(child), visit);
                }
            }
        }
        for child in &self.nodes[&NodeId::root()].children {
            go(self, child, &Path::root().child(child), &mut visit);
        }
    }

    /// Indented outline of the projection, one line per displayed path
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.walk(|id, path| {
            out.push_str(&"  ".repeat(path.len() - 1));
            out.push_str(id.as_str());
            out.push('\n');
        });
        out
    }

    /// Displayed node count, excluding the root
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(id, displayed parents, displayed children)` for every cached node,
    /// the root included; used by the consistency checker
    pub fn cache_entries(&self) -> impl Iterator<Item = (&NodeId, &[NodeId], &[NodeId])> {
        self.nodes
            .iter()
            .map(|(id, e)| (id, e.parents.as_slice(), e.children.as_slice()))
    }

    /// Count nodes.
    ///
    /// * no extra filters, transparent included: the cache size;
    /// * extra filters, transparent included: cached nodes that also pass
    ///   `with_filters`;
    /// * transparent excluded: recomputed over the whole main tree with the
    ///   non-transparent applied filters plus `with_filters`.
    pub(crate) fn get_n_nodes<T>(
        &self,
        src: Source<'_, T>,
        with_filters: &[&str],
        include_transparent: bool,
    ) -> Result<usize, TreeError> {
        if with_filters.is_empty() && include_transparent {
            return Ok(self.len());
        }
        let extra = with_filters
            .iter()
            .map(|name| {
                src.bank
                    .get_filter(name)
                    .ok_or_else(|| TreeError::UnknownFilter(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let passes_extra = |id: &str| -> bool {
            match src.tree.get_node(id) {
                Ok(node) => extra.iter().all(|f| f.is_displayed(node, src.tree)),
                Err(_) => false,
            }
        };

        if include_transparent {
            return Ok(self
                .nodes
                .keys()
                .filter(|id| !id.is_root() && passes_extra(id.as_str()))
                .count());
        }

        let opaque: Vec<&AppliedFilter> = self.applied.iter().filter(|f| !f.transparent).collect();
        Ok(src
            .tree
            .iter()
            .filter(|node| {
                opaque.iter().all(|applied| match src.bank.get_filter(&applied.name) {
                    Some(filter) => filter.evaluate(node, src.tree, &applied.params),
                    None => true,
                }) && passes_extra(node.id().as_str())
            })
            .count())
    }
}
