use std::cell::RefCell;

use chrono::{Local, NaiveDate};
use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::model::node::Node;
use crate::model::task::Task;
use crate::ops::filter_bank::{Filter, FilterParams};
use crate::ops::main_tree::MainTree;
use crate::ops::tree::Tree;

/// Name and one-line description of every standard task filter, in
/// registration order
pub const STANDARD_FILTERS: &[(&str, &str)] = &[
    ("active", "tasks that are neither done nor dismissed"),
    ("closed", "done or dismissed tasks, listed flat"),
    ("workview", "actionable tasks: active, started, no active subtasks (param: today)"),
    ("tag", "tasks carrying a tag (param: tag)"),
    ("notag", "tasks without any tag"),
    ("leaf", "nodes without children"),
    ("overdue", "active tasks past their due date (param: today)"),
    ("search", "title or tag matches a case-insensitive regex, listed flat (param: query)"),
    ("flat", "every task, listed flat"),
];

/// `params["today"]` as a date, else the local date
fn today(params: &FilterParams) -> NaiveDate {
    params
        .get("today")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| Local::now().date_naive())
}

fn has_active_child(node: &Node<Task>, tree: &MainTree<Task>) -> bool {
    node.children()
        .iter()
        .filter_map(|c| tree.get_node(c.as_str()).ok())
        .any(|c| c.payload().is_active())
}

/// Admit nodes with no children in the main tree; works for any payload
pub fn leaf_filter<T: 'static>() -> Filter<T> {
    Filter::new("leaf", |node: &Node<T>, _: &MainTree<T>, _: &FilterParams| {
        node.n_children() == 0
    })
}

fn search_filter() -> Filter<Task> {
    // The last compiled query, reused while the parameter stays the same
    let cache: RefCell<Option<(String, Option<Regex>)>> = RefCell::new(None);
    Filter::new("search", move |node: &Node<Task>, _: &MainTree<Task>, params: &FilterParams| {
        let Some(query) = params.get("query").and_then(|v| v.as_str()) else {
            return false;
        };
        let mut cache = cache.borrow_mut();
        if cache.as_ref().is_none_or(|(q, _)| q != query) {
            let compiled = RegexBuilder::new(query).case_insensitive(true).build();
            if let Err(e) = &compiled {
                warn!(query, "invalid search pattern: {e}");
            }
            *cache = Some((query.to_string(), compiled.ok()));
        }
        let Some((_, Some(re))) = cache.as_ref() else {
            return false;
        };
        let task = node.payload();
        re.is_match(&task.title) || task.tags.iter().any(|t| re.is_match(t))
    })
    .flat(true)
}

/// The standard task filters, in the order of [`STANDARD_FILTERS`]
pub fn standard_filters() -> Vec<Filter<Task>> {
    vec![
        Filter::new("active", |n: &Node<Task>, _: &MainTree<Task>, _: &FilterParams| {
            n.payload().is_active()
        }),
        Filter::new("closed", |n: &Node<Task>, _: &MainTree<Task>, _: &FilterParams| {
            n.payload().status.is_closed()
        })
        .flat(true),
        Filter::new("workview", |n: &Node<Task>, tree: &MainTree<Task>, p: &FilterParams| {
            let task = n.payload();
            task.is_active() && task.is_started(today(p)) && !has_active_child(n, tree)
        }),
        Filter::new("tag", |n: &Node<Task>, _: &MainTree<Task>, p: &FilterParams| {
            p.get("tag")
                .and_then(|v| v.as_str())
                .is_some_and(|tag| n.payload().has_tag(tag))
        }),
        Filter::new("notag", |n: &Node<Task>, _: &MainTree<Task>, _: &FilterParams| {
            n.payload().tags.is_empty()
        }),
        leaf_filter(),
        Filter::new("overdue", |n: &Node<Task>, _: &MainTree<Task>, p: &FilterParams| {
            n.payload().is_overdue(today(p))
        }),
        search_filter(),
        Filter::new("flat", |_: &Node<Task>, _: &MainTree<Task>, _: &FilterParams| true).flat(true),
    ]
}

/// Register every standard filter on the tree as a built-in
pub fn register_task_filters(tree: &mut Tree<Task>) {
    for filter in standard_filters() {
        tree.add_builtin_filter(filter);
    }
}
