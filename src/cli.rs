use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::budgeter::CounterKind;

/// Shared application context for global flags
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color (or NO_COLOR set)
    pub verbose: u8,    // global -v count
}

#[derive(Parser)]
#[command(name = "dpack")]
#[command(about = "Pack a git diff into a token-budgeted context for LLM code review")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect a diff and assemble a budgeted context from it
    Pack(PackArgs),

    /// Collect a diff and print its statistics
    Stats(StatsArgs),

    /// Print whole-file context for one path at a ref
    File(FileArgs),

    /// Initialize a diffpack.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Which changes to collect; unset values fall back to config
#[derive(Args, Debug, Clone, Default)]
pub struct DiffArgs {
    /// Ref to compare against (default: config `diff.target`, then "main")
    #[arg(short, long)]
    pub target: Option<String>,

    /// Ref with the changes; omit to compare the target with the working tree
    #[arg(short, long, conflicts_with = "uncommitted")]
    pub source: Option<String>,

    /// Diff staged and unstaged changes against HEAD
    #[arg(long, conflicts_with = "target")]
    pub uncommitted: bool,

    /// Only include paths matching these globs (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub include: Vec<String>,

    /// Exclude paths matching these globs (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Maximum number of files to process
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Ignore whitespace-only changes
    #[arg(long, value_name = "BOOL")]
    pub ignore_whitespace: Option<bool>,

    /// Drop paths whose extension marks them as binary
    #[arg(long)]
    pub skip_binary: bool,

    /// Repository directory
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Seconds before a git invocation is killed
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct PackArgs {
    #[command(flatten)]
    pub diff: DiffArgs,

    /// Token budget for the assembled context
    #[arg(short, long)]
    pub budget: Option<usize>,

    /// How tokens are counted
    #[arg(long, value_enum)]
    pub counter: Option<CounterKind>,

    /// Model or encoding name for the tiktoken counter
    #[arg(long)]
    pub model: Option<String>,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Emit JSON with the context, summary and truncation details
    #[arg(long)]
    pub json: bool,

    /// Copy the result to the clipboard
    #[arg(long)]
    pub clipboard: bool,
}

#[derive(Parser, Debug)]
pub struct StatsArgs {
    #[command(flatten)]
    pub diff: DiffArgs,

    /// Emit the whole diff model as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct FileArgs {
    /// Path relative to the repository root
    pub path: String,

    /// Ref to read the file from
    #[arg(long = "ref", default_value = "HEAD")]
    pub reference: String,

    /// Cut the file after this many lines (default: config `context.file_max_lines`)
    #[arg(long)]
    pub max_lines: Option<usize>,

    /// Repository directory
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Seconds before a git invocation is killed
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Target shell; detected from $SHELL when omitted
    #[arg(value_enum)]
    pub shell: Option<Shell>,

    /// Output directory; required unless --stdout is set
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
