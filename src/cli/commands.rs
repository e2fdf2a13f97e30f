use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "larch", about = concat!("larch v", env!("CARGO_PKG_VERSION"), " - filtered live views over a task tree"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (default: ./larch.toml if present)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a filtered view as an outline
    Show(ShowArgs),
    /// Count the nodes of a filtered view
    Count(CountArgs),
    /// List every path of a task in a filtered view
    Paths(PathsArgs),
    /// Validate tree and view consistency
    Check(CheckArgs),
    /// List the standard filters
    Filters,
    /// Write the tasks of a filtered view to a new task file
    Export(ExportArgs),
}

// ---------------------------------------------------------------------------
// Shared args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ViewArgs {
    /// Task file (JSON)
    pub file: PathBuf,
    /// Saved view from the config file
    #[arg(long)]
    pub view: Option<String>,
    /// Apply a filter: NAME or NAME:KEY=VALUE,KEY=VALUE (repeatable)
    #[arg(short, long = "filter", value_name = "SPEC")]
    pub filters: Vec<String>,
    /// Show every task at the top level
    #[arg(long)]
    pub flat: bool,
}

// ---------------------------------------------------------------------------
// Command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub view: ViewArgs,
}

#[derive(Args)]
pub struct CountArgs {
    #[command(flatten)]
    pub view: ViewArgs,
    /// Count as if these filters were applied too (repeatable)
    #[arg(long = "with", value_name = "FILTER")]
    pub with_filters: Vec<String>,
    /// Ignore transparent filters while counting
    #[arg(long)]
    pub opaque: bool,
}

#[derive(Args)]
pub struct PathsArgs {
    #[command(flatten)]
    pub view: ViewArgs,
    /// Task ID
    pub id: String,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Task file (JSON)
    pub file: PathBuf,
}

#[derive(Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub view: ViewArgs,
    /// Output task file
    #[arg(short, long)]
    pub output: PathBuf,
}
