use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

use crate::model::node::Node;
use crate::ops::main_tree::MainTree;

/// Parameters handed to a predicate on every evaluation.
///
/// The keys `flat` and `transparent` are also read as filter modifiers.
pub type FilterParams = serde_json::Map<String, serde_json::Value>;

/// A node test. It sees the node, the whole (read-only) tree for predicates
/// that depend on neighbours, and the effective parameters.
pub type Predicate<T> = Box<dyn Fn(&Node<T>, &MainTree<T>, &FilterParams) -> bool>;

/// True if `params[key]` is the boolean `true`
pub fn param_flag(params: &FilterParams, key: &str) -> bool {
    params.get(key).and_then(serde_json::Value::as_bool).unwrap_or(false)
}

/// A named predicate with its modifiers.
pub struct Filter<T> {
    name: String,
    predicate: Predicate<T>,
    flat: bool,
    transparent: bool,
    params: FilterParams,
    builtin: bool,
}

impl<T> fmt::Debug for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("name", &self.name)
            .field("flat", &self.flat)
            .field("transparent", &self.transparent)
            .field("params", &self.params)
            .field("builtin", &self.builtin)
            .finish_non_exhaustive()
    }
}

impl<T> Filter<T> {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&Node<T>, &MainTree<T>, &FilterParams) -> bool + 'static,
    ) -> Self {
        Filter {
            name: name.into(),
            predicate: Box::new(predicate),
            flat: false,
            transparent: false,
            params: FilterParams::new(),
            builtin: false,
        }
    }

    /// Children of admitted nodes are not shown as children
    pub fn flat(mut self, flat: bool) -> Self {
        self.flat = flat;
        self
    }

    /// Ignored by counting queries that exclude transparent filters
    pub fn transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    /// Default parameters. `flat`/`transparent` keys switch the modifiers on.
    pub fn with_params(mut self, params: FilterParams) -> Self {
        self.flat |= param_flag(&params, "flat");
        self.transparent |= param_flag(&params, "transparent");
        self.params = params;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_flat(&self) -> bool {
        self.flat
    }

    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    /// Run the predicate with the given parameters
    pub fn evaluate(&self, node: &Node<T>, tree: &MainTree<T>, params: &FilterParams) -> bool {
        (self.predicate)(node, tree, params)
    }

    /// Run the predicate with the default parameters
    pub fn is_displayed(&self, node: &Node<T>, tree: &MainTree<T>) -> bool {
        self.evaluate(node, tree, &self.params)
    }
}

/// Registry of named filters shared by every view of a tree.
pub struct FilterBank<T> {
    filters: IndexMap<String, Filter<T>>,
}

impl<T> Default for FilterBank<T> {
    fn default() -> Self {
        FilterBank {
            filters: IndexMap::new(),
        }
    }
}

impl<T> fmt::Debug for FilterBank<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.filters.values()).finish()
    }
}

impl<T> FilterBank<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter. Returns false if the name is taken.
    pub fn add_filter(&mut self, filter: Filter<T>) -> bool {
        if self.filters.contains_key(filter.name()) {
            return false;
        }
        debug!(filter = filter.name(), "filter added");
        self.filters.insert(filter.name.clone(), filter);
        true
    }

    /// Register a permanent filter that `remove_filter` will refuse
    pub fn add_builtin_filter(&mut self, mut filter: Filter<T>) -> bool {
        filter.builtin = true;
        self.add_filter(filter)
    }

    /// Remove a filter added at runtime. Returns false for unknown or
    /// built-in names.
    pub fn remove_filter(&mut self, name: &str) -> bool {
        match self.filters.get(name) {
            Some(f) if !f.builtin => {
                self.filters.shift_remove(name);
                debug!(filter = name, "filter removed");
                true
            }
            _ => false,
        }
    }

    pub fn get_filter(&self, name: &str) -> Option<&Filter<T>> {
        self.filters.get(name)
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Filter names in registration order
    pub fn list_filters(&self) -> Vec<&str> {
        self.filters.keys().map(String::as_str).collect()
    }
}
