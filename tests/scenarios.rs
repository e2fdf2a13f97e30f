//! End-to-end behaviour of the tree, its filters and its views.
//!
//! Every view in these tests carries a mirror: a set of paths built only
//! from the events the view emitted. After each step the mirror must equal
//! the view's own outline, and every event must have been resolvable when
//! it was delivered.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use larch::model::event::ViewEvent;
use larch::ops::check::check_tree;
use larch::ops::task_filters::leaf_filter;
use larch::{Filter, FilterParams, Identified, MainTree, Node, NodeId, Path, Tree, TreeError, ViewId};
use pretty_assertions::assert_eq;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Paths announced by a view, maintained from its events alone
#[derive(Default)]
struct Mirror {
    paths: BTreeSet<Path>,
    log: Vec<String>,
}

impl Mirror {
    fn apply(&mut self, event: &ViewEvent) {
        let path = event.path().clone();
        match event {
            ViewEvent::Added { .. } => {
                let parent = path.parent().unwrap_or_default();
                assert!(
                    parent.is_empty() || self.paths.contains(&parent),
                    "{} added under unknown {}",
                    path,
                    parent
                );
                assert!(self.paths.insert(path.clone()), "{} added twice", path);
                self.log.push(format!("+{}", path));
            }
            ViewEvent::Deleted { .. } => {
                assert!(
                    !self.paths.iter().any(|p| p.len() > path.len() && p.ids().starts_with(path.ids())),
                    "{} deleted before its descendants",
                    path
                );
                assert!(self.paths.remove(&path), "{} deleted but never added", path);
                self.log.push(format!("-{}", path));
            }
            // The root path is always resolvable
            ViewEvent::Modified { .. } | ViewEvent::Reordered { .. } => {
                assert!(
                    path.is_empty() || self.paths.contains(&path),
                    "{} modified but not displayed",
                    path
                );
            }
        }
        if !path.is_empty() {
            assert_eq!(path.last(), Some(event.node_id()));
        }
    }

    fn take_log(&mut self) -> Vec<String> {
        std::mem::take(&mut self.log)
    }
}

fn attach_mirror<T>(tree: &mut Tree<T>, view: ViewId) -> Rc<RefCell<Mirror>> {
    let mirror = Rc::new(RefCell::new(Mirror::default()));
    let mut v = tree.view_mut(view).unwrap();
    let sink = Rc::clone(&mirror);
    v.connect_all(move |event| sink.borrow_mut().apply(event));
    v.replay_current_state();
    mirror.borrow_mut().take_log();
    mirror
}

fn view_paths<T>(tree: &Tree<T>, view: ViewId) -> BTreeSet<Path> {
    let mut paths = BTreeSet::new();
    tree.view(view).unwrap().walk(|_, path| {
        paths.insert(path.clone());
    });
    paths
}

fn assert_consistent<T>(tree: &Tree<T>, mirrors: &[(ViewId, &Rc<RefCell<Mirror>>)]) {
    let result = check_tree(tree);
    assert!(result.valid, "consistency errors: {:?}", result.errors);
    for (view, mirror) in mirrors {
        assert_eq!(mirror.borrow().paths, view_paths(tree, *view));
    }
}

fn ids(list: &[&str]) -> Vec<NodeId> {
    list.iter().map(|s| NodeId::from(*s)).collect()
}

/// Root siblings `0..=9`, then the staircase `9 > 10 > 11 > 12 > 13 > 14`
fn staircase() -> Tree<()> {
    let mut tree = Tree::new();
    for i in 0..=9 {
        tree.add_node(Node::new(i.to_string(), ()), None).unwrap();
    }
    for i in 10..=14 {
        let parent = (i - 1).to_string();
        tree.add_node(Node::new(i.to_string(), ()), Some(parent.as_str())).unwrap();
    }
    tree
}

fn flat_filter<T: 'static>() -> Filter<T> {
    Filter::new("flat", |_: &Node<T>, _: &MainTree<T>, _: &FilterParams| true).flat(true)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn removing_a_parent_promotes_its_child_with_subtree() {
    let mut tree = staircase();
    let view = tree.get_viewtree(true);
    let mirror = attach_mirror(&mut tree, view);

    tree.del_node("9", false).unwrap();

    let v = tree.view(view).unwrap();
    assert!(v.node_parents("10").unwrap().is_empty());
    assert!(v.node_has_child(None, "10").unwrap());
    assert_eq!(
        v.get_paths_for_node("14").unwrap(),
        vec![Path::from_ids(["10", "11", "12", "13", "14"])]
    );
    assert!(!v.is_displayed("9"));
    assert_eq!(tree.main_view().node_parents("10").unwrap(), Vec::<NodeId>::new());
    assert_eq!(
        mirror.borrow_mut().take_log(),
        vec![
            "-/9/10/11/12/13/14",
            "-/9/10/11/12/13",
            "-/9/10/11/12",
            "-/9/10/11",
            "-/9/10",
            "-/9",
            "+/10",
            "+/10/11",
            "+/10/11/12",
            "+/10/11/12/13",
            "+/10/11/12/13/14",
        ]
    );
    assert_consistent(&tree, &[(view, &mirror)]);
}

#[test]
fn orphans_go_to_the_root_not_to_a_grandparent() {
    let mut tree = staircase();
    let view = tree.get_viewtree(true);
    let mirror = attach_mirror(&mut tree, view);

    tree.del_node("13", false).unwrap();

    assert!(tree.main_tree().root_children().contains(&NodeId::from("14")));
    assert!(tree.get_node("12").unwrap().children().is_empty());
    let v = tree.view(view).unwrap();
    assert!(v.node_parents("14").unwrap().is_empty());
    assert!(!v.node_has_child(Some("12"), "14").unwrap());
    assert_eq!(v.get_paths_for_node("14").unwrap(), vec![Path::from_ids(["14"])]);
    assert_consistent(&tree, &[(view, &mirror)]);
}

#[test]
fn leaf_filter_follows_new_children() {
    let mut tree: Tree<()> = Tree::new();
    tree.add_filter(leaf_filter());
    tree.add_node(Node::new("9", ()), None).unwrap();
    for i in 10..=14 {
        let parent = (i - 1).to_string();
        tree.add_node(Node::new(i.to_string(), ()), Some(parent.as_str())).unwrap();
    }
    let view = tree.get_viewtree(false);
    tree.view_mut(view).unwrap().apply_filter("leaf", None, false, true).unwrap();
    let mirror = attach_mirror(&mut tree, view);

    assert_eq!(tree.view(view).unwrap().get_all_nodes(), ids(&["14"]));

    tree.add_node(Node::new("15", ()), Some("14")).unwrap();

    let v = tree.view(view).unwrap();
    assert_eq!(v.get_all_nodes(), ids(&["15"]));
    assert_eq!(v.node_nth_child(None, 0).unwrap(), Some(NodeId::from("15")));
    assert_eq!(v.index_path(&Path::from_ids(["15"])).unwrap(), vec![0]);
    assert_eq!(mirror.borrow_mut().take_log(), vec!["+/15", "-/14"]);
    assert_consistent(&tree, &[(view, &mirror)]);
}

#[test]
fn parents_keep_the_order_they_were_added_in() {
    let mut tree: Tree<()> = Tree::new();
    for id in ["A", "B", "C"] {
        tree.add_node(Node::new(id, ()), None).unwrap();
    }
    let view = tree.get_viewtree(true);
    let mirror = attach_mirror(&mut tree, view);

    tree.add_parent("C", "A").unwrap();
    tree.add_parent("C", "B").unwrap();

    let v = tree.view(view).unwrap();
    assert_eq!(v.node_parents("C").unwrap(), ids(&["A", "B"]));
    assert_eq!(
        v.get_paths_for_node("C").unwrap(),
        vec![Path::from_ids(["A", "C"]), Path::from_ids(["B", "C"])]
    );
    for path in v.get_paths_for_node("C").unwrap() {
        assert_eq!(v.get_node_for_path(&path).unwrap(), "C");
    }
    assert_eq!(mirror.borrow_mut().take_log(), vec!["-/C", "+/A/C", "+/B/C"]);
    assert_consistent(&tree, &[(view, &mirror)]);
}

#[test]
fn cycles_are_rejected_without_any_change() {
    let mut tree = staircase();
    let view = tree.get_viewtree(true);
    let mirror = attach_mirror(&mut tree, view);
    let before = tree.main_tree().snapshot();
    let outline = tree.view(view).unwrap().outline();

    assert!(matches!(
        tree.add_parent("0", "0"),
        Err(TreeError::CircularRelationship { .. })
    ));
    // 12 descends from 10, so it cannot become 10's parent
    assert!(matches!(
        tree.add_parent("10", "12"),
        Err(TreeError::CircularRelationship { .. })
    ));
    assert!(matches!(
        tree.add_node(Node::new("9", ()), Some("14")),
        Ok(false)
    ));
    assert!(matches!(
        tree.move_node("9", Some("11")),
        Err(TreeError::CircularRelationship { .. })
    ));

    assert_eq!(tree.main_tree().snapshot(), before);
    assert_eq!(tree.view(view).unwrap().outline(), outline);
    assert!(mirror.borrow_mut().take_log().is_empty());
    assert_consistent(&tree, &[(view, &mirror)]);
}

#[test]
fn flat_filter_puts_everything_at_the_root() {
    let mut tree = staircase();
    tree.add_filter(flat_filter());
    tree.add_parent("12", "3").unwrap();
    let view = tree.get_viewtree(false);
    tree.view_mut(view).unwrap().apply_filter("flat", None, false, true).unwrap();
    let mirror = attach_mirror(&mut tree, view);

    let v = tree.view(view).unwrap();
    assert!(v.is_flat());
    assert_eq!(v.node_n_children(None, false).unwrap(), v.len());
    assert_eq!(v.len(), 15);
    for id in v.get_all_nodes() {
        assert!(v.node_all_children(Some(id.as_str())).unwrap().is_empty());
        assert!(v.node_parents(id.as_str()).unwrap().is_empty());
    }

    // New nesting stays flat
    tree.add_node(Node::new("15", ()), Some("14")).unwrap();
    let v = tree.view(view).unwrap();
    assert_eq!(v.node_n_children(None, false).unwrap(), 16);
    assert_eq!(mirror.borrow_mut().take_log(), vec!["+/15"]);
    assert_consistent(&tree, &[(view, &mirror)]);
}

// ---------------------------------------------------------------------------
// Further behaviour
// ---------------------------------------------------------------------------

#[test]
fn main_view_rejects_filters() {
    let mut tree = staircase();
    tree.add_filter(flat_filter());
    assert!(tree.main_view().is_static());
    assert_eq!(
        tree.view_mut(ViewId::MAIN).unwrap().apply_filter("flat", None, false, true),
        Err(TreeError::StaticView)
    );
    assert_eq!(tree.main_view().len(), 15);
}

#[test]
fn unknown_filters_and_undisplayed_nodes_fail() {
    let mut tree = staircase();
    let even = Filter::new("even", |n: &Node<()>, _: &MainTree<()>, _: &FilterParams| {
        n.id().as_str().parse::<u32>().is_ok_and(|i| i % 2 == 0)
    });
    tree.add_filter(even);
    let view = tree.get_viewtree(true);
    let mut v = tree.view_mut(view).unwrap();
    assert_eq!(
        v.apply_filter("nope", None, false, true),
        Err(TreeError::UnknownFilter("nope".to_string()))
    );
    v.apply_filter("even", None, false, true).unwrap();

    let v = tree.view(view).unwrap();
    assert_eq!(v.get_paths_for_node("3"), Err(TreeError::NotDisplayed("3".into())));
    assert_eq!(v.node_all_children(Some("3")), Err(TreeError::NotDisplayed("3".into())));
    // Odd parents are filtered out, so 10, 12 and 14 hang under the root
    assert_eq!(v.node_all_children(None).unwrap(), ids(&["0", "2", "4", "6", "8", "10", "12", "14"]));
}

#[test]
fn filters_react_to_payload_changes() {
    let mut tree: Tree<u32> = Tree::new();
    tree.add_filter(Filter::new("big", |n: &Node<u32>, _: &MainTree<u32>, p: &FilterParams| {
        let min = p.get("min").and_then(|v| v.as_u64()).unwrap_or(10);
        u64::from(*n.payload()) >= min
    }));
    tree.add_node(Node::new("p", 50), None).unwrap();
    tree.add_node(Node::new("c", 20), Some("p")).unwrap();
    tree.add_node(Node::new("g", 30), Some("c")).unwrap();

    let view = tree.get_viewtree(false);
    tree.view_mut(view).unwrap().apply_filter("big", None, false, true).unwrap();
    let mirror = attach_mirror(&mut tree, view);
    assert_eq!(tree.view(view).unwrap().outline(), "p\n  c\n    g\n");

    tree.update_payload("c", |v| *v = 1).unwrap();
    assert_eq!(tree.view(view).unwrap().outline(), "p\ng\n");
    assert_eq!(mirror.borrow_mut().take_log(), vec!["-/p/c/g", "-/p/c", "+/g"]);

    tree.update_payload("c", |v| *v = 99).unwrap();
    assert_eq!(tree.view(view).unwrap().outline(), "p\n  c\n    g\n");
    assert_consistent(&tree, &[(view, &mirror)]);

    // Per-view parameters overlay the defaults
    tree.view_mut(view)
        .unwrap()
        .apply_filter("big", serde_json::json!({"min": 40}).as_object().cloned(), false, true)
        .unwrap();
    assert_eq!(tree.view(view).unwrap().outline(), "p\n  c\n");
    assert_consistent(&tree, &[(view, &mirror)]);
}

#[test]
fn transparent_filters_only_change_counting() {
    let mut tree = staircase();
    tree.add_filter(
        Filter::new("low", |n: &Node<()>, _: &MainTree<()>, _: &FilterParams| {
            n.id().as_str().parse::<u32>().is_ok_and(|i| i < 5)
        })
        .transparent(true),
    );
    tree.add_filter(leaf_filter());
    let view = tree.get_viewtree(false);
    tree.view_mut(view).unwrap().apply_filter("low", None, false, true).unwrap();

    let v = tree.view(view).unwrap();
    assert_eq!(v.len(), 5);
    assert_eq!(v.get_n_nodes(&[], true).unwrap(), 5);
    assert_eq!(v.get_n_nodes(&[], false).unwrap(), 15);
    assert_eq!(v.get_n_nodes(&["leaf"], true).unwrap(), 5);
    assert_eq!(v.get_n_nodes(&["leaf"], false).unwrap(), 10);
    assert_eq!(
        v.get_n_nodes(&["missing"], true),
        Err(TreeError::UnknownFilter("missing".to_string()))
    );
}

#[test]
fn unapplying_a_flat_filter_restores_nesting() {
    let mut tree = staircase();
    tree.add_filter(flat_filter());
    let view = tree.get_viewtree(false);
    tree.view_mut(view).unwrap().apply_filter("flat", None, false, true).unwrap();
    let mirror = attach_mirror(&mut tree, view);

    assert_eq!(tree.view_mut(view).unwrap().unapply_filter("flat", true), Ok(true));
    assert_eq!(tree.view_mut(view).unwrap().unapply_filter("flat", true), Ok(false));
    let v = tree.view(view).unwrap();
    assert!(!v.is_flat());
    assert_eq!(v.node_n_children(Some("9"), true).unwrap(), 5);
    assert_consistent(&tree, &[(view, &mirror)]);
}

#[test]
fn removing_a_filter_from_the_bank_unapplies_it() {
    let mut tree = staircase();
    tree.add_filter(flat_filter());
    let view = tree.get_viewtree(false);
    tree.view_mut(view).unwrap().apply_filter("flat", None, false, true).unwrap();

    assert!(tree.remove_filter("flat"));
    let v = tree.view(view).unwrap();
    assert!(v.list_applied_filters().is_empty());
    assert!(v.node_has_child(Some("9"), "10").unwrap());
}

#[test]
fn reorder_is_reported_with_the_permutation() {
    let mut tree: Tree<()> = Tree::new();
    tree.add_node(Node::new("p", ()), None).unwrap();
    for id in ["a", "b", "c"] {
        tree.add_node(Node::new(id, ()), Some("p")).unwrap();
    }
    let view = tree.get_viewtree(true);
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    tree.view_mut(view)
        .unwrap()
        .connect(larch::model::event::ViewEventKind::Reordered, move |e| sink.borrow_mut().push(e.clone()));

    tree.reorder_children("p", &ids(&["c", "a", "b"])).unwrap();

    assert_eq!(tree.view(view).unwrap().node_all_children(Some("p")).unwrap(), ids(&["c", "a", "b"]));
    assert_eq!(
        *events.borrow(),
        vec![ViewEvent::Reordered {
            node: "p".into(),
            path: Path::from_ids(["p"]),
            new_order: vec![2, 0, 1],
        }]
    );
    assert_eq!(
        tree.reorder_children("p", &ids(&["a", "b"])),
        Err(TreeError::InvalidOrder("p".into()))
    );
}

#[test]
fn late_observers_replay_the_current_state() {
    let tree = staircase();
    let state = tree.main_view().get_current_state();
    assert_eq!(state.len(), 15);
    assert_eq!(
        state.last(),
        Some(&ViewEvent::Added {
            node: "14".into(),
            path: Path::from_ids(["9", "10", "11", "12", "13", "14"]),
        })
    );
}

#[test]
fn disconnected_observers_stop_receiving() {
    let mut tree = staircase();
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    let token = tree.view_mut(ViewId::MAIN).unwrap().connect_all(move |_| *sink.borrow_mut() += 1);

    tree.add_node(Node::new("x", ()), None).unwrap();
    assert_eq!(*count.borrow(), 1);
    assert!(tree.view_mut(ViewId::MAIN).unwrap().disconnect(token));
    tree.add_node(Node::new("y", ()), None).unwrap();
    assert_eq!(*count.borrow(), 1);
}

#[test]
fn pending_parents_attach_when_they_arrive() {
    let mut tree: Tree<()> = Tree::new();
    let view = tree.get_viewtree(true);
    let mirror = attach_mirror(&mut tree, view);

    tree.add_node(Node::new("child", ()), Some("parent")).unwrap();
    assert_eq!(tree.view(view).unwrap().get_all_nodes(), ids(&["child"]));
    tree.add_node(Node::new("parent", ()), None).unwrap();

    let v = tree.view(view).unwrap();
    assert_eq!(v.node_parents("child").unwrap(), ids(&["parent"]));
    assert_eq!(mirror.borrow_mut().take_log(), vec!["+/child", "+/parent", "-/child", "+/parent/child"]);
    assert!(tree.main_tree().pending_relationships().is_empty());
    assert_consistent(&tree, &[(view, &mirror)]);
}
