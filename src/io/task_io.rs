use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::node::{Node, NodeId};
use crate::model::task::Task;
use crate::ops::main_tree::MainTree;
use crate::ops::queue::{MutationQueue, Priority};

/// One task as stored in a task file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: NodeId,
    #[serde(flatten)]
    pub task: Task,
    /// Parent ids; parents may appear later in the file
    #[serde(default)]
    pub parents: Vec<NodeId>,
}

/// Error type for task file I/O
#[derive(Debug, thiserror::Error)]
pub enum TaskFileError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse task file: {0}")]
    ParseError(#[from] serde_json::Error),
}

pub fn parse_tasks(text: &str) -> Result<Vec<TaskRecord>, TaskFileError> {
    Ok(serde_json::from_str(text)?)
}

pub fn read_tasks(path: &Path) -> Result<Vec<TaskRecord>, TaskFileError> {
    let text = fs::read_to_string(path).map_err(|e| TaskFileError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_tasks(&text)
}

/// Queue every record: each node under its first parent, then one
/// relationship per further parent. Missing parents stay pending until
/// they arrive.
pub fn enqueue_tasks(queue: &MutationQueue<Task>, records: Vec<TaskRecord>) {
    let mut extra = Vec::new();
    for record in records {
        let mut parents = record.parents.into_iter();
        let first = parents.next();
        extra.extend(parents.map(|p| (p, record.id.clone())));
        queue.add_node(Node::new(record.id, record.task), first, Priority::Normal);
    }
    for (parent, child) in extra {
        queue.new_relationship(parent, child, Priority::Normal);
    }
}

/// Task records for every node, in insertion order
pub fn collect_tasks(tree: &MainTree<Task>) -> Vec<TaskRecord> {
    tree.iter()
        .map(|node| TaskRecord {
            id: node.id().clone(),
            task: node.payload().clone(),
            parents: node.parents().to_vec(),
        })
        .collect()
}

/// Write records as pretty JSON. The file is replaced atomically.
pub fn write_tasks(path: &Path, records: &[TaskRecord]) -> Result<(), TaskFileError> {
    let write_err = |e: std::io::Error| TaskFileError::WriteError {
        path: path.to_path_buf(),
        source: e,
    };
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    serde_json::to_writer_pretty(&mut tmp, records)?;
    tmp.write_all(b"\n").map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    debug!(path = %path.display(), tasks = records.len(), "tasks written");
    Ok(())
}
