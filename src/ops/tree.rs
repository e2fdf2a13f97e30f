use std::fmt;
use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::TreeError;
use crate::model::node::{Identified, Node, NodeId};
use crate::ops::filter_bank::{Filter, FilterBank, FilterParams};
use crate::ops::main_tree::MainTree;
use crate::ops::queue::{MutationQueue, Request};
use crate::ops::view::{FilteredView, Source};

/// Handle of a view owned by a [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ViewId(u64);

impl ViewId {
    /// The static, unfiltered view every tree has
    pub const MAIN: ViewId = ViewId(0);

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Outcome of one drained request, handed to the commit hook
#[derive(Debug, Clone)]
pub struct Commit {
    pub op: &'static str,
    pub node: NodeId,
    pub outcome: Result<(), TreeError>,
}

/// What a queue drain did
#[derive(Debug, Default, Serialize)]
pub struct DrainReport {
    pub applied: usize,
    pub failed: Vec<FailedRequest>,
}

#[derive(Debug, Serialize)]
pub struct FailedRequest {
    pub op: &'static str,
    pub node: NodeId,
    pub error: String,
}

type CommitHook<T> = Box<dyn FnMut(&mut Tree<T>, &Commit)>;

/// One main tree, one filter bank, and the views projecting them.
///
/// Every structural edit goes through here: the main tree applies it, then
/// each recorded change is handed, in order, to every view.
pub struct Tree<T> {
    main: MainTree<T>,
    bank: FilterBank<T>,
    views: IndexMap<ViewId, FilteredView>,
    next_view: u64,
    commit_hook: Option<CommitHook<T>>,
}

impl<T> fmt::Debug for Tree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("nodes", &self.main.len())
            .field("filters", &self.bank.list_filters())
            .field("views", &self.views.len())
            .finish_non_exhaustive()
    }
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        let mut views = IndexMap::new();
        views.insert(ViewId::MAIN, FilteredView::new(true));
        Tree {
            main: MainTree::new(),
            bank: FilterBank::new(),
            views,
            next_view: 1,
            commit_hook: None,
        }
    }
}

impl<T> Tree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn main_tree(&self) -> &MainTree<T> {
        &self.main
    }

    pub fn filters(&self) -> &FilterBank<T> {
        &self.bank
    }

    pub fn get_node(&self, id: &str) -> Result<&Node<T>, TreeError> {
        self.main.get_node(id)
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.main.has_node(id)
    }

    // -----------------------------------------------------------------------
    // Filters
    // -----------------------------------------------------------------------

    pub fn add_filter(&mut self, filter: Filter<T>) -> bool {
        self.bank.add_filter(filter)
    }

    pub fn add_builtin_filter(&mut self, filter: Filter<T>) -> bool {
        self.bank.add_builtin_filter(filter)
    }

    /// Remove a runtime filter; views that had it applied drop it and
    /// refilter.
    pub fn remove_filter(&mut self, name: &str) -> bool {
        if !self.bank.remove_filter(name) {
            return false;
        }
        let src = Source {
            tree: &self.main,
            bank: &self.bank,
        };
        for view in self.views.values_mut() {
            if view.is_static() {
                continue;
            }
            view.drop_applied(src, name, true);
        }
        true
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// Create a new filtered view. Without `refresh` it starts empty and
    /// fills as changes arrive or when refiltered.
    pub fn get_viewtree(&mut self, refresh: bool) -> ViewId {
        let id = ViewId(self.next_view);
        self.next_view += 1;
        let mut view = FilteredView::new(false);
        if refresh {
            view.refilter(Source {
                tree: &self.main,
                bank: &self.bank,
            });
        }
        self.views.insert(id, view);
        debug!(view = id.0, "view created");
        id
    }

    /// Drop a view. The main view cannot be dropped.
    pub fn drop_view(&mut self, id: ViewId) -> bool {
        id != ViewId::MAIN && self.views.shift_remove(&id).is_some()
    }

    pub fn main_view(&self) -> &FilteredView {
        &self.views[&ViewId::MAIN]
    }

    pub fn view(&self, id: ViewId) -> Result<ViewRef<'_, T>, TreeError> {
        let view = self.views.get(&id).ok_or(TreeError::UnknownView(id.0))?;
        Ok(ViewRef {
            view,
            src: Source {
                tree: &self.main,
                bank: &self.bank,
            },
        })
    }

    pub fn view_mut(&mut self, id: ViewId) -> Result<ViewMut<'_, T>, TreeError> {
        let view = self.views.get_mut(&id).ok_or(TreeError::UnknownView(id.0))?;
        Ok(ViewMut {
            view,
            src: Source {
                tree: &self.main,
                bank: &self.bank,
            },
        })
    }

    pub fn view_ids(&self) -> Vec<ViewId> {
        self.views.keys().copied().collect()
    }

    /// Every view, the main view first
    pub fn views(&self) -> impl Iterator<Item = (ViewId, ViewRef<'_, T>)> {
        let src = Source {
            tree: &self.main,
            bank: &self.bank,
        };
        self.views.iter().map(move |(id, view)| (*id, ViewRef { view, src }))
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    fn dispatch(&mut self) {
        let changes = self.main.drain_changes();
        if changes.is_empty() {
            return;
        }
        let src = Source {
            tree: &self.main,
            bank: &self.bank,
        };
        for change in &changes {
            for view in self.views.values_mut() {
                view.on_change(src, change);
            }
        }
    }

    /// Add a node, optionally under `parent`. `Ok(false)` if the id exists.
    pub fn add_node(&mut self, node: Node<T>, parent: Option<&str>) -> Result<bool, TreeError> {
        let result = self.main.add_node(node, parent);
        self.dispatch();
        result
    }

    pub fn del_node(&mut self, id: &str, recursive: bool) -> Result<(), TreeError> {
        let result = self.main.remove_node(id, recursive);
        self.dispatch();
        result
    }

    pub fn modify_node(&mut self, id: &str) -> Result<(), TreeError> {
        let result = self.main.modify_node(id);
        self.dispatch();
        result
    }

    /// Mutate a payload and let every view re-evaluate the node
    pub fn update_payload(&mut self, id: &str, f: impl FnOnce(&mut T)) -> Result<(), TreeError> {
        let result = self.main.update_payload(id, f);
        self.dispatch();
        result
    }

    /// Make `parent` a parent of `id`
    pub fn add_parent(&mut self, id: &str, parent: &str) -> Result<bool, TreeError> {
        self.new_relationship(parent, id)
    }

    pub fn new_relationship(&mut self, parent: &str, child: &str) -> Result<bool, TreeError> {
        let result = self.main.new_relationship(parent, child);
        self.dispatch();
        result
    }

    pub fn break_relationship(&mut self, parent: &str, child: &str) -> Result<bool, TreeError> {
        let result = self.main.break_relationship(parent, child);
        self.dispatch();
        result
    }

    pub fn move_node(&mut self, id: &str, new_parent: Option<&str>) -> Result<(), TreeError> {
        let result = self.main.move_node(id, new_parent);
        self.dispatch();
        result
    }

    pub fn reorder_children(&mut self, parent: &str, order: &[NodeId]) -> Result<(), TreeError> {
        let result = self.main.reorder_children(parent, order);
        self.dispatch();
        result
    }

    /// Re-evaluate every node in every view
    pub fn refresh_all(&mut self) {
        self.main.refresh_all();
        self.dispatch();
    }

    // -----------------------------------------------------------------------
    // Queue
    // -----------------------------------------------------------------------

    /// Run after every drained request, with the tree and the outcome
    pub fn set_commit_hook(&mut self, hook: impl FnMut(&mut Tree<T>, &Commit) + 'static) {
        self.commit_hook = Some(Box::new(hook));
    }

    pub fn clear_commit_hook(&mut self) {
        self.commit_hook = None;
    }

    /// Apply one request now
    pub fn apply(&mut self, request: Request<T>) -> Result<(), TreeError> {
        match request {
            Request::AddNode { node, parent } => self.add_node(node, parent.as_ref().map(NodeId::as_str)).map(|_| ()),
            Request::RemoveNode { id, recursive } => self.del_node(id.as_str(), recursive),
            Request::ModifyNode(id) => self.modify_node(id.as_str()),
            Request::UpdatePayload { id, update } => self.update_payload(id.as_str(), update),
            Request::NewRelationship { parent, child } => {
                self.new_relationship(parent.as_str(), child.as_str()).map(|_| ())
            }
            Request::BreakRelationship { parent, child } => {
                self.break_relationship(parent.as_str(), child.as_str()).map(|_| ())
            }
            Request::MoveNode { id, parent } => self.move_node(id.as_str(), parent.as_ref().map(NodeId::as_str)),
        }
    }

    /// Drain the queue, one request at a time. A failing request is logged
    /// and reported; draining continues with the next one.
    pub fn process_queue(&mut self, queue: &MutationQueue<T>) -> DrainReport {
        let mut report = DrainReport::default();
        while let Some(request) = queue.pop() {
            let op = request.op();
            let node = request.node_id().clone();
            let outcome = self.apply(request);
            match &outcome {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    warn!(op, node = %node, "queued request failed: {e}");
                    report.failed.push(FailedRequest {
                        op,
                        node: node.clone(),
                        error: e.to_string(),
                    });
                }
            }
            if let Some(mut hook) = self.commit_hook.take() {
                hook(self, &Commit { op, node, outcome });
                if self.commit_hook.is_none() {
                    self.commit_hook = Some(hook);
                }
            }
        }
        report
    }
}

/// Shared access to one view, able to answer counting queries that need the
/// main tree and filters
pub struct ViewRef<'a, T> {
    view: &'a FilteredView,
    src: Source<'a, T>,
}

impl<T> Deref for ViewRef<'_, T> {
    type Target = FilteredView;

    fn deref(&self) -> &FilteredView {
        self.view
    }
}

impl<'a, T> ViewRef<'a, T> {
    pub(crate) fn source(&self) -> Source<'a, T> {
        self.src
    }

    /// See [`FilteredView::get_n_nodes`]
    pub fn get_n_nodes(&self, with_filters: &[&str], include_transparent: bool) -> Result<usize, TreeError> {
        self.view.get_n_nodes(self.src, with_filters, include_transparent)
    }
}

/// Exclusive access to one view: filter application and observers
pub struct ViewMut<'a, T> {
    view: &'a mut FilteredView,
    src: Source<'a, T>,
}

impl<T> Deref for ViewMut<'_, T> {
    type Target = FilteredView;

    fn deref(&self) -> &FilteredView {
        self.view
    }
}

impl<T> DerefMut for ViewMut<'_, T> {
    fn deref_mut(&mut self) -> &mut FilteredView {
        self.view
    }
}

impl<T> ViewMut<'_, T> {
    /// Apply a filter by name. `params` overlay the filter's defaults;
    /// `reset` drops the filters applied so far; `refresh` rebuilds the
    /// projection now.
    pub fn apply_filter(
        &mut self,
        name: &str,
        params: Option<FilterParams>,
        reset: bool,
        refresh: bool,
    ) -> Result<(), TreeError> {
        self.view.apply_filter(self.src, name, params, reset, refresh)
    }

    pub fn unapply_filter(&mut self, name: &str, refresh: bool) -> Result<bool, TreeError> {
        self.view.unapply_filter(self.src, name, refresh)
    }

    pub fn reset_filters(&mut self, refresh: bool, transparent_only: bool) -> Result<(), TreeError> {
        self.view.reset_filters(self.src, refresh, transparent_only)
    }

    /// Rebuild the projection from scratch
    pub fn refilter(&mut self) {
        self.view.refilter(self.src);
    }

    pub fn get_n_nodes(&self, with_filters: &[&str], include_transparent: bool) -> Result<usize, TreeError> {
        self.view.get_n_nodes(self.src, with_filters, include_transparent)
    }
}
