use std::path::Path;

use tracing::{info, warn};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::task_io::{self, TaskRecord};
use crate::model::config::{FilterRef, LarchConfig};
use crate::model::task::Task;
use crate::ops::check;
use crate::ops::filter_bank::FilterParams;
use crate::ops::queue::MutationQueue;
use crate::ops::task_filters::{STANDARD_FILTERS, register_task_filters};
use crate::ops::tree::{Tree, ViewId};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli, config: &LarchConfig) -> CmdResult {
    let json = cli.json;
    match cli.command {
        Commands::Show(args) => cmd_show(args, config, json),
        Commands::Count(args) => cmd_count(args, config, json),
        Commands::Paths(args) => cmd_paths(args, config, json),
        Commands::Check(args) => cmd_check(args, json),
        Commands::Filters => cmd_filters(json),
        Commands::Export(args) => cmd_export(args, config),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load a task file into a tree with the standard filters registered.
/// Records go through the mutation queue; rejected ones are logged and
/// skipped.
fn load_tree(path: &Path) -> Result<Tree<Task>, Box<dyn std::error::Error>> {
    let records = task_io::read_tasks(path)?;
    let mut tree = Tree::new();
    register_task_filters(&mut tree);

    let queue = MutationQueue::new();
    task_io::enqueue_tasks(&queue, records);
    let report = tree.process_queue(&queue);
    info!(
        applied = report.applied,
        failed = report.failed.len(),
        nodes = tree.main_tree().len(),
        "task file loaded"
    );
    for pending in tree.main_tree().pending_relationships() {
        warn!(parent = %pending.0, child = %pending.1, "parent not found in task file");
    }
    Ok(tree)
}

/// Parse `NAME` or `NAME:KEY=VALUE,KEY=VALUE`. Values that read as JSON
/// (`true`, `3`) keep their type; anything else is a string.
pub fn parse_filter_spec(spec: &str) -> Result<FilterRef, String> {
    let (name, rest) = match spec.split_once(':') {
        Some((name, rest)) => (name, Some(rest)),
        None => (spec, None),
    };
    if name.is_empty() {
        return Err(format!("missing filter name in '{}'", spec));
    }
    let params = match rest {
        None => None,
        Some(rest) => {
            let mut params = FilterParams::new();
            for pair in rest.split(',').filter(|p| !p.is_empty()) {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("expected KEY=VALUE in '{}', got '{}'", spec, pair))?;
                let value = serde_json::from_str(value)
                    .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
                params.insert(key.to_string(), value);
            }
            Some(params)
        }
    };
    Ok(FilterRef {
        name: name.to_string(),
        params,
    })
}

/// Create a view with the saved view's filters, then the command line
/// filters, then `--flat`, and build it once.
fn open_view(tree: &mut Tree<Task>, args: &ViewArgs, config: &LarchConfig) -> Result<ViewId, Box<dyn std::error::Error>> {
    let mut filters: Vec<FilterRef> = Vec::new();
    if let Some(name) = &args.view {
        let saved = config
            .view(name)
            .ok_or_else(|| format!("no view named '{}' in config", name))?;
        filters.extend(saved.filters.iter().cloned());
    }
    for spec in &args.filters {
        filters.push(parse_filter_spec(spec)?);
    }
    if args.flat {
        filters.push(FilterRef {
            name: "flat".to_string(),
            params: None,
        });
    }

    let id = tree.get_viewtree(false);
    let mut view = tree.view_mut(id)?;
    for filter in filters {
        view.apply_filter(&filter.name, filter.params, false, false)?;
    }
    view.refilter();
    Ok(id)
}

fn applied_names(tree: &Tree<Task>, id: ViewId) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    Ok(tree
        .view(id)?
        .list_applied_filters()
        .into_iter()
        .map(String::from)
        .collect())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_show(args: ShowArgs, config: &LarchConfig, json: bool) -> CmdResult {
    let mut tree = load_tree(&args.view.file)?;
    let id = open_view(&mut tree, &args.view, config)?;
    let view = tree.view(id)?;

    if json {
        let out = ShowJson {
            filters: applied_names(&tree, id)?,
            flat: view.is_flat(),
            nodes: view_to_json(&view, tree.main_tree(), None),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for line in format_outline(&view, tree.main_tree()) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_count(args: CountArgs, config: &LarchConfig, json: bool) -> CmdResult {
    let mut tree = load_tree(&args.view.file)?;
    let id = open_view(&mut tree, &args.view, config)?;
    let with: Vec<&str> = args.with_filters.iter().map(String::as_str).collect();
    let count = tree.view(id)?.get_n_nodes(&with, !args.opaque)?;

    if json {
        let out = CountJson {
            filters: applied_names(&tree, id)?,
            count,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", count);
    }
    Ok(())
}

fn cmd_paths(args: PathsArgs, config: &LarchConfig, json: bool) -> CmdResult {
    let mut tree = load_tree(&args.view.file)?;
    let id = open_view(&mut tree, &args.view, config)?;
    let paths = tree.view(id)?.get_paths_for_node(&args.id)?;

    if json {
        let out = PathsJson {
            id: args.id.as_str().into(),
            paths,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for path in paths {
            println!("{}", path);
        }
    }
    Ok(())
}

fn cmd_check(args: CheckArgs, json: bool) -> CmdResult {
    let mut tree = load_tree(&args.file)?;
    // One view per standard filter, so every filter's projection is checked
    for (name, _) in STANDARD_FILTERS {
        let id = tree.get_viewtree(false);
        tree.view_mut(id)?.apply_filter(name, None, false, true)?;
    }
    let result = check::check_tree(&tree);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for line in format_check_result(&result) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_filters(json: bool) -> CmdResult {
    if json {
        let out: Vec<FilterJson> = STANDARD_FILTERS
            .iter()
            .map(|&(name, description)| FilterJson { name, description })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for (name, description) in STANDARD_FILTERS {
            println!("{:<10} {}", name, description);
        }
    }
    Ok(())
}

/// Displayed tasks only, each with its displayed parents
fn cmd_export(args: ExportArgs, config: &LarchConfig) -> CmdResult {
    let mut tree = load_tree(&args.view.file)?;
    let id = open_view(&mut tree, &args.view, config)?;
    let view = tree.view(id)?;

    let mut records = Vec::new();
    for node_id in view.get_all_nodes() {
        let node = tree.get_node(node_id.as_str())?;
        records.push(TaskRecord {
            parents: view.node_parents(node_id.as_str())?,
            task: node.payload().clone(),
            id: node_id,
        });
    }
    task_io::write_tasks(&args.output, &records)?;
    eprintln!("exported {} tasks to {}", records.len(), args.output.display());
    Ok(())
}
