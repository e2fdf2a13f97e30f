use chrono::NaiveDate;
use serde::Serialize;

use crate::model::node::{NodeId, Path};
use crate::model::task::{Task, TaskStatus};
use crate::ops::check::{CheckError, CheckResult, CheckWarning};
use crate::ops::main_tree::MainTree;
use crate::ops::view::FilteredView;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

/// A displayed task and its displayed subtasks
#[derive(Serialize)]
pub struct NodeJson {
    pub id: NodeId,
    pub title: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeJson>,
}

#[derive(Serialize)]
pub struct ShowJson {
    pub filters: Vec<String>,
    pub flat: bool,
    pub nodes: Vec<NodeJson>,
}

#[derive(Serialize)]
pub struct CountJson {
    pub filters: Vec<String>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct PathsJson {
    pub id: NodeId,
    pub paths: Vec<Path>,
}

#[derive(Serialize)]
pub struct FilterJson {
    pub name: &'static str,
    pub description: &'static str,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// The displayed forest below `parent` (the root when `None`)
pub fn view_to_json(view: &FilteredView, tree: &MainTree<Task>, parent: Option<&str>) -> Vec<NodeJson> {
    let children = view.node_all_children(parent).unwrap_or_default();
    children
        .iter()
        .filter_map(|id| {
            let task = tree.get_node(id.as_str()).ok()?.payload();
            Some(NodeJson {
                id: id.clone(),
                title: task.title.clone(),
                status: task.status,
                tags: task.tags.clone(),
                due: task.due,
                children: view_to_json(view, tree, Some(id.as_str())),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// One outline line: `[x] id  title @tag`
pub fn format_task_line(id: &NodeId, task: &Task, depth: usize) -> String {
    let mut line = format!(
        "{}[{}] {}  {}",
        "  ".repeat(depth),
        task.status.checkbox_char(),
        id,
        task.title
    );
    for tag in &task.tags {
        line.push_str(" @");
        line.push_str(tag);
    }
    if let Some(due) = task.due {
        line.push_str(&format!(" (due {})", due));
    }
    line
}

/// Every displayed path of the view as an indented outline
pub fn format_outline(view: &FilteredView, tree: &MainTree<Task>) -> Vec<String> {
    let mut lines = Vec::new();
    view.walk(|id, path| {
        if let Ok(node) = tree.get_node(id.as_str()) {
            lines.push(format_task_line(id, node.payload(), path.len() - 1));
        }
    });
    lines
}

pub fn format_check_error(err: &CheckError) -> String {
    let scope = |view: &Option<u64>| match view {
        Some(v) => format!("view {}", v),
        None => "main tree".to_string(),
    };
    match err {
        CheckError::AsymmetricEdge { view, parent, child } => {
            format!("[{}] edge {} -> {} recorded on one side only", scope(view), parent, child)
        }
        CheckError::DanglingEdge { view, from, to } => {
            format!("[{}] {} links to missing node {}", scope(view), from, to)
        }
        CheckError::RootMismatch { view, node } => {
            format!("[{}] {} has wrong root membership", scope(view), node)
        }
        CheckError::Cycle { node } => format!("[main tree] {} is its own ancestor", node),
        CheckError::DisplayedButFiltered { view, node } => {
            format!("[view {}] {} is displayed but filtered out", view, node)
        }
        CheckError::AdmittedButHidden { view, node } => {
            format!("[view {}] {} passes the filters but is not displayed", view, node)
        }
        CheckError::WrongParents { view, node } => {
            format!("[view {}] {} is displayed under the wrong parents", view, node)
        }
        CheckError::FlatViewNested { view, node } => {
            format!("[view {}] {} has children in a flat view", view, node)
        }
        CheckError::PathMismatch { view, node, path } => {
            format!("[view {}] path {} does not resolve to {}", view, path, node)
        }
    }
}

pub fn format_check_warning(warning: &CheckWarning) -> String {
    match warning {
        CheckWarning::PendingRelationship { parent, child } => {
            format!("{} waits for missing parent {}", child, parent)
        }
    }
}

pub fn format_check_result(result: &CheckResult) -> Vec<String> {
    let mut lines = Vec::new();
    if !result.errors.is_empty() {
        lines.push("Errors:".to_string());
        lines.extend(result.errors.iter().map(|e| format!("  {}", format_check_error(e))));
    }
    if !result.warnings.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Warnings:".to_string());
        lines.extend(result.warnings.iter().map(|w| format!("  {}", format_check_warning(w))));
    }
    lines.push(if result.valid {
        "✓ tree is consistent".to_string()
    } else {
        "✗ tree has errors".to_string()
    });
    lines
}
