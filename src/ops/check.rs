use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::model::node::{NodeId, Path};
use crate::ops::main_tree::MainTree;
use crate::ops::tree::{Tree, ViewId, ViewRef};

/// Structured result of a consistency check, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A broken invariant. `view` is `None` for the main tree itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// An edge is recorded on one side only
    #[serde(rename = "asymmetric_edge")]
    AsymmetricEdge {
        view: Option<u64>,
        parent: NodeId,
        child: NodeId,
    },
    /// An edge names a node that is not stored
    #[serde(rename = "dangling_edge")]
    DanglingEdge {
        view: Option<u64>,
        from: NodeId,
        to: NodeId,
    },
    /// Root membership disagrees with the parent list
    #[serde(rename = "root_mismatch")]
    RootMismatch { view: Option<u64>, node: NodeId },
    /// A chain of parent links returns to this node
    #[serde(rename = "cycle")]
    Cycle { node: NodeId },
    /// A displayed node fails the view's filters
    #[serde(rename = "displayed_but_filtered")]
    DisplayedButFiltered { view: u64, node: NodeId },
    /// A node passes the view's filters but is not displayed
    #[serde(rename = "admitted_but_hidden")]
    AdmittedButHidden { view: u64, node: NodeId },
    /// A displayed node hangs under other parents than its filters allow
    #[serde(rename = "wrong_parents")]
    WrongParents { view: u64, node: NodeId },
    /// A flat view still shows nesting
    #[serde(rename = "flat_view_nested")]
    FlatViewNested { view: u64, node: NodeId },
    /// A reported path does not resolve back to its node
    #[serde(rename = "path_mismatch")]
    PathMismatch {
        view: u64,
        node: NodeId,
        path: Path,
    },
}

/// Something unusual but legal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// A relationship still waits for one of its endpoints
    #[serde(rename = "pending_relationship")]
    PendingRelationship { parent: NodeId, child: NodeId },
}

// ---------------------------------------------------------------------------
// Main check entry point
// ---------------------------------------------------------------------------

/// Validate a tree and every view attached to it.
///
/// Checks performed:
/// 1. Parent/child lists are symmetric and name stored nodes
/// 2. Exactly the parentless nodes hang under the root
/// 3. No parent chain loops
/// 4. Every view displays exactly the nodes its filters admit
/// 5. Displayed nodes hang under exactly their displayed parents, and flat
///    views have no nesting
/// 6. Every displayed path resolves back to its node
pub fn check_tree<T>(tree: &Tree<T>) -> CheckResult {
    let mut result = CheckResult::default();

    check_main_tree(tree.main_tree(), &mut result);
    for (id, view) in tree.views() {
        check_view(id, &view, &mut result);
    }

    result.valid = result.errors.is_empty();
    result
}

// ---------------------------------------------------------------------------
// Main tree
// ---------------------------------------------------------------------------

fn check_main_tree<T>(main: &MainTree<T>, result: &mut CheckResult) {
    for node in main.iter() {
        for parent in node.parents() {
            match main.get_node(parent.as_str()) {
                Ok(p) if p.has_child(node.id().as_str()) => {}
                Ok(_) => result.errors.push(CheckError::AsymmetricEdge {
                    view: None,
                    parent: parent.clone(),
                    child: node.id().clone(),
                }),
                Err(_) => result.errors.push(CheckError::DanglingEdge {
                    view: None,
                    from: node.id().clone(),
                    to: parent.clone(),
                }),
            }
        }
        for child in node.children() {
            match main.get_node(child.as_str()) {
                Ok(c) if c.is_child_of(node.id().as_str()) => {}
                Ok(_) => result.errors.push(CheckError::AsymmetricEdge {
                    view: None,
                    parent: node.id().clone(),
                    child: child.clone(),
                }),
                Err(_) => result.errors.push(CheckError::DanglingEdge {
                    view: None,
                    from: node.id().clone(),
                    to: child.clone(),
                }),
            }
        }

        let at_root = main.root_children().contains(node.id());
        if at_root == node.has_parent() {
            result.errors.push(CheckError::RootMismatch {
                view: None,
                node: node.id().clone(),
            });
        }
    }
    for id in main.root_children() {
        if !main.has_node(id.as_str()) {
            result.errors.push(CheckError::DanglingEdge {
                view: None,
                from: NodeId::root(),
                to: id.clone(),
            });
        }
    }

    for node in find_cycles(main) {
        result.errors.push(CheckError::Cycle { node });
    }

    for (parent, child) in main.pending_relationships() {
        result.warnings.push(CheckWarning::PendingRelationship {
            parent: parent.clone(),
            child: child.clone(),
        });
    }
}

/// Nodes that can reach themselves through parent links
fn find_cycles<T>(main: &MainTree<T>) -> Vec<NodeId> {
    main.iter()
        .filter(|node| {
            node.parents().iter().any(|p| p == node.id()) || main.is_ancestor(node.id().as_str(), node.id().as_str())
        })
        .map(|node| node.id().clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

fn check_view<T>(id: ViewId, view: &ViewRef<'_, T>, result: &mut CheckResult) {
    let vid = id.as_u64();
    let src = view.source();
    let entries: HashMap<&NodeId, (&[NodeId], &[NodeId])> = view
        .cache_entries()
        .map(|(node, parents, children)| (node, (parents, children)))
        .collect();

    for (node, (parents, children)) in &entries {
        for parent in parents.iter() {
            match entries.get(parent) {
                Some((_, pc)) if pc.contains(*node) => {}
                Some(_) => result.errors.push(CheckError::AsymmetricEdge {
                    view: Some(vid),
                    parent: parent.clone(),
                    child: (*node).clone(),
                }),
                None => result.errors.push(CheckError::DanglingEdge {
                    view: Some(vid),
                    from: (*node).clone(),
                    to: parent.clone(),
                }),
            }
        }
        for child in children.iter() {
            match entries.get(child) {
                Some((cp, _)) if cp.contains(*node) => {}
                Some(_) => result.errors.push(CheckError::AsymmetricEdge {
                    view: Some(vid),
                    parent: (*node).clone(),
                    child: child.clone(),
                }),
                None => result.errors.push(CheckError::DanglingEdge {
                    view: Some(vid),
                    from: (*node).clone(),
                    to: child.clone(),
                }),
            }
        }

        if node.is_root() {
            continue;
        }
        // A displayed node hangs under the root iff it has no real parent
        let real_parents = parents.iter().filter(|p| !p.is_root()).count();
        let under_root = parents.iter().any(NodeId::is_root);
        if parents.is_empty() || under_root != (real_parents == 0) {
            result.errors.push(CheckError::RootMismatch {
                view: Some(vid),
                node: (*node).clone(),
            });
        }
        if !view.admits(src, node.as_str()) {
            result.errors.push(CheckError::DisplayedButFiltered {
                view: vid,
                node: (*node).clone(),
            });
        }
        let expected: HashSet<NodeId> = view.view_parents(src, node.as_str()).into_iter().collect();
        if parents.len() != expected.len() || parents.iter().any(|p| !expected.contains(p)) {
            result.errors.push(CheckError::WrongParents {
                view: vid,
                node: (*node).clone(),
            });
        }
        if view.is_flat() && !children.is_empty() {
            result.errors.push(CheckError::FlatViewNested {
                view: vid,
                node: (*node).clone(),
            });
        }
    }

    let displayed: HashSet<&NodeId> = entries.keys().copied().collect();
    for node in src.tree.iter() {
        if !displayed.contains(node.id()) && view.admits(src, node.id().as_str()) {
            result.errors.push(CheckError::AdmittedButHidden {
                view: vid,
                node: node.id().clone(),
            });
        }
    }

    for node in view.get_all_nodes() {
        let Ok(paths) = view.get_paths_for_node(node.as_str()) else {
            continue;
        };
        for path in paths {
            if view.get_node_for_path(&path).as_ref() != Ok(&node) {
                result.errors.push(CheckError::PathMismatch {
                    view: vid,
                    node: node.clone(),
                    path,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::Node;
    use crate::ops::filter_bank::{Filter, FilterParams};

    fn sample_tree() -> Tree<u32> {
        let mut tree = Tree::new();
        tree.add_node(Node::new("a", 1), None).unwrap();
        tree.add_node(Node::new("b", 2), Some("a")).unwrap();
        tree.add_node(Node::new("c", 3), Some("a")).unwrap();
        tree.add_node(Node::new("d", 4), Some("b")).unwrap();
        tree.add_parent("d", "c").unwrap();
        tree
    }

    #[test]
    fn test_check_clean_tree() {
        let mut tree = sample_tree();
        tree.add_filter(Filter::new("even", |n: &Node<u32>, _: &MainTree<u32>, _: &FilterParams| {
            n.payload() % 2 == 0
        }));
        let view = tree.get_viewtree(true);
        tree.view_mut(view).unwrap().apply_filter("even", None, false, true).unwrap();

        let result = check_tree(&tree);
        assert!(result.valid, "unexpected errors: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_check_reports_pending_relationships() {
        let mut tree = sample_tree();
        tree.add_node(Node::new("orphan", 9), Some("missing")).unwrap();
        let result = check_tree(&tree);
        assert!(result.valid);
        assert_eq!(
            result.warnings,
            vec![CheckWarning::PendingRelationship {
                parent: "missing".into(),
                child: "orphan".into(),
            }]
        );
    }

    #[test]
    fn test_check_result_serializes_to_json() {
        let result = CheckResult {
            valid: false,
            errors: vec![CheckError::Cycle { node: "x".into() }],
            warnings: vec![],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["errors"][0]["type"], "cycle");
        assert_eq!(json["errors"][0]["node"], "x");
    }
}
