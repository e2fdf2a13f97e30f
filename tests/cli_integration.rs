//! Integration tests for the `larch` CLI.
//!
//! Each test writes a task file into a temp directory, runs `larch` as a
//! subprocess, and verifies stdout and/or written files.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Get the path to the built `larch` binary.
fn larch_bin() -> PathBuf {
    // cargo test builds to target/debug/
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("larch");
    path
}

/// project
///   write @docs (due 2026-03-01)
///   review [done]
///   groceries @home
/// errands @home
///   groceries @home
fn create_task_file(root: &Path) -> PathBuf {
    let file = root.join("tasks.json");
    fs::write(
        &file,
        r#"[
  {"id": "project", "title": "Project launch"},
  {"id": "write", "title": "Write docs", "tags": ["docs"], "due": "2026-03-01", "parents": ["project"]},
  {"id": "review", "title": "Review docs", "status": "done", "parents": ["project"]},
  {"id": "errands", "title": "Errands", "tags": ["home"]},
  {"id": "groceries", "title": "Buy groceries", "tags": ["home"], "parents": ["errands", "project"]}
]
"#,
    )
    .unwrap();
    file
}

/// Run `larch` in `dir`, return (stdout, stderr, success).
fn run_larch(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(larch_bin())
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run larch");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Run `larch` expecting success, return stdout.
fn run_larch_ok(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_larch(dir, args);
    if !success {
        panic!("larch {:?} failed:\nstdout: {}\nstderr: {}", args, stdout, stderr);
    }
    stdout
}

fn setup() -> tempfile::TempDir {
    let tmp = tempfile::TempDir::new().unwrap();
    create_task_file(tmp.path());
    tmp
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

#[test]
fn test_show_outline() {
    let tmp = setup();
    let out = run_larch_ok(tmp.path(), &["show", "tasks.json"]);
    assert!(out.contains("[ ] project  Project launch\n"));
    assert!(out.contains("  [ ] write  Write docs @docs (due 2026-03-01)\n"));
    assert!(out.contains("  [x] review  Review docs\n"));
    // Listed once under each parent
    assert_eq!(out.matches("[ ] groceries  Buy groceries @home").count(), 2);
}

#[test]
fn test_show_filtered_json() {
    let tmp = setup();
    let out = run_larch_ok(tmp.path(), &["show", "tasks.json", "-f", "active", "--json"]);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["filters"], serde_json::json!(["active"]));
    assert_eq!(json["flat"], false);

    let nodes = json["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0]["id"], "project");
    let children: Vec<&str> = nodes[0]["children"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert!(children.contains(&"write"));
    assert!(!children.contains(&"review"));
}

#[test]
fn test_show_flat_with_params() {
    let tmp = setup();
    let out = run_larch_ok(tmp.path(), &["show", "tasks.json", "-f", "tag:tag=home", "--flat"]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l.starts_with("[ ] ")));
    assert!(out.contains("errands"));
    assert!(out.contains("groceries"));
}

#[test]
fn test_show_unknown_filter_fails() {
    let tmp = setup();
    let (_, stderr, success) = run_larch(tmp.path(), &["show", "tasks.json", "-f", "nope"]);
    assert!(!success);
    assert!(stderr.contains("nope"));
}

#[test]
fn test_missing_task_file_fails() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (_, stderr, success) = run_larch(tmp.path(), &["show", "missing.json"]);
    assert!(!success);
    assert!(stderr.contains("error"));
}

#[test]
fn test_missing_parent_puts_task_at_top() {
    let tmp = tempfile::TempDir::new().unwrap();
    fs::write(
        tmp.path().join("orphan.json"),
        r#"[{"id": "child", "title": "Child", "parents": ["ghost"]}]"#,
    )
    .unwrap();
    let out = run_larch_ok(tmp.path(), &["show", "orphan.json"]);
    assert_eq!(out, "[ ] child  Child\n");

    let out = run_larch_ok(tmp.path(), &["check", "orphan.json"]);
    assert!(out.contains("child waits for missing parent ghost"));
    assert!(out.contains("✓ tree is consistent"));
}

// ---------------------------------------------------------------------------
// count / paths
// ---------------------------------------------------------------------------

#[test]
fn test_count() {
    let tmp = setup();
    assert_eq!(run_larch_ok(tmp.path(), &["count", "tasks.json"]), "5\n");
    assert_eq!(run_larch_ok(tmp.path(), &["count", "tasks.json", "-f", "active"]), "4\n");
    assert_eq!(run_larch_ok(tmp.path(), &["count", "tasks.json", "--with", "notag"]), "2\n");

    let out = run_larch_ok(tmp.path(), &["count", "tasks.json", "-f", "closed", "--json"]);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["count"], 1);
    assert_eq!(json["filters"], serde_json::json!(["closed"]));
}

#[test]
fn test_paths() {
    let tmp = setup();
    let out = run_larch_ok(tmp.path(), &["paths", "tasks.json", "groceries"]);
    let mut lines: Vec<&str> = out.lines().collect();
    lines.sort();
    assert_eq!(lines, vec!["/errands/groceries", "/project/groceries"]);

    let out = run_larch_ok(tmp.path(), &["paths", "tasks.json", "groceries", "-f", "tag:tag=home", "--json"]);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["id"], "groceries");
    assert_eq!(json["paths"].as_array().unwrap().len(), 1);
}

#[test]
fn test_paths_of_hidden_task_fails() {
    let tmp = setup();
    let (_, _, success) = run_larch(tmp.path(), &["paths", "tasks.json", "review", "-f", "active"]);
    assert!(!success);
}

// ---------------------------------------------------------------------------
// check / filters
// ---------------------------------------------------------------------------

#[test]
fn test_check() {
    let tmp = setup();
    let out = run_larch_ok(tmp.path(), &["check", "tasks.json"]);
    assert!(out.contains("✓ tree is consistent"));

    let out = run_larch_ok(tmp.path(), &["check", "tasks.json", "--json"]);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["valid"], true);
    assert_eq!(json["errors"].as_array().unwrap().len(), 0);
}

#[test]
fn test_filters_list() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = run_larch_ok(tmp.path(), &["filters"]);
    assert!(out.lines().any(|l| l.starts_with("workview")));

    let out = run_larch_ok(tmp.path(), &["filters", "--json"]);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json[0]["name"], "active");
}

// ---------------------------------------------------------------------------
// export / config
// ---------------------------------------------------------------------------

#[test]
fn test_export_keeps_displayed_parents() {
    let tmp = setup();
    let (_, stderr, success) = run_larch(
        tmp.path(),
        &["export", "tasks.json", "-f", "tag:tag=home", "-o", "home.json"],
    );
    assert!(success);
    assert!(stderr.contains("exported 2 tasks"));

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("home.json")).unwrap()).unwrap();
    let records = written.as_array().unwrap();
    assert_eq!(records.len(), 2);
    let groceries = records.iter().find(|r| r["id"] == "groceries").unwrap();
    assert_eq!(groceries["parents"], serde_json::json!(["errands"]));

    // The export is itself a loadable task file
    let out = run_larch_ok(tmp.path(), &["show", "home.json"]);
    assert!(out.contains("  [ ] groceries"));
}

#[test]
fn test_saved_view_from_config() {
    let tmp = setup();
    fs::write(
        tmp.path().join("views.toml"),
        r#"[logging]
level = "error"

[[views]]
name = "closed"
filters = [{ name = "closed" }]

[[views]]
name = "home"
filters = [{ name = "tag", params = { tag = "home" } }]
"#,
    )
    .unwrap();

    let out = run_larch_ok(tmp.path(), &["-c", "views.toml", "count", "tasks.json", "--view", "home"]);
    assert_eq!(out, "2\n");
    let out = run_larch_ok(tmp.path(), &["show", "tasks.json", "--view", "closed", "-c", "views.toml"]);
    assert_eq!(out, "[x] review  Review docs\n");

    let (_, stderr, success) = run_larch(tmp.path(), &["-c", "views.toml", "show", "tasks.json", "--view", "nope"]);
    assert!(!success);
    assert!(stderr.contains("no view named 'nope'"));
}

#[test]
fn test_default_config_file_is_read() {
    let tmp = setup();
    fs::write(tmp.path().join("larch.toml"), "[[views]]\nname = \"todo\"\nfilters = [{ name = \"active\" }]\n").unwrap();
    assert_eq!(run_larch_ok(tmp.path(), &["count", "tasks.json", "--view", "todo"]), "4\n");
}

#[test]
fn test_bad_config_fails() {
    let tmp = setup();
    fs::write(tmp.path().join("larch.toml"), "views = 3\n").unwrap();
    let (_, _, success) = run_larch(tmp.path(), &["count", "tasks.json"]);
    assert!(!success);
}
