use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::strategy::Placement;

/// Batch file renamer with conflict-aware previews and undo.
#[derive(Parser)]
#[command(name = "renamer", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Output structured JSON lines to stdout.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Which entries are considered.
#[derive(Args, Debug, Clone, Default)]
pub struct ScopeArgs {
    /// Working directory (defaults to the current directory).
    #[arg(long, global = true, value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// Descend into subdirectories.
    #[arg(short, long, global = true)]
    pub recursive: bool,

    /// Offer directories as candidates too.
    #[arg(short = 'd', long, global = true)]
    pub include_dirs: bool,

    /// Include hidden entries.
    #[arg(long, global = true)]
    pub hidden: bool,

    /// Deepest level to descend to when recursive (0 = unlimited).
    #[arg(long, global = true, default_value_t = 0)]
    pub max_depth: usize,

    /// `|`-separated extension filter, e.g. `.jpg|.png`.
    #[arg(short, long, global = true, value_name = "EXTS")]
    pub extensions: Option<String>,
}

/// Preview / apply switches shared by every renaming command.
#[derive(Args, Debug, Clone, Default)]
pub struct ApplyArgs {
    /// Only preview the plan.
    #[arg(long, conflicts_with = "yes")]
    pub dry_run: bool,

    /// Apply without asking for confirmation.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// List candidates in scope.
    List,
    /// Rename using a regex pattern and an `@N` template.
    Regex(RegexArgs),
    /// Replace literal substrings in names.
    Replace(ReplaceArgs),
    /// Remove literal substrings from names.
    Remove(RemoveArgs),
    /// Change file extensions.
    Extension(ExtensionArgs),
    /// Insert text at a position within each stem.
    Insert(InsertArgs),
    /// Number files in order.
    Sequence(SequenceArgs),
    /// Apply a rename plan produced by an external generator.
    Ai(AiArgs),
    /// Revert the most recent batch.
    Undo,
    /// Print JSON Schema for external rename plans.
    Schema,
}

#[derive(Args)]
pub struct RegexArgs {
    /// Pattern matched against each name stem.
    pub pattern: String,
    /// Template such as `@2_@1`; `@@` is a literal `@`.
    pub template: String,
    #[command(flatten)]
    pub apply: ApplyArgs,
}

#[derive(Args)]
pub struct ReplaceArgs {
    /// One or more patterns followed by the replacement.
    #[arg(required = true, num_args = 2.., value_name = "PATTERN... REPLACEMENT")]
    pub args: Vec<String>,
    #[command(flatten)]
    pub apply: ApplyArgs,
}

#[derive(Args)]
pub struct RemoveArgs {
    /// Tokens removed in order.
    #[arg(required = true, num_args = 1.., value_name = "TOKEN")]
    pub tokens: Vec<String>,
    #[command(flatten)]
    pub apply: ApplyArgs,
}

#[derive(Args)]
pub struct ExtensionArgs {
    /// Source extensions followed by the target extension.
    #[arg(required = true, num_args = 2.., value_name = "SOURCE... TARGET")]
    pub args: Vec<String>,
    #[command(flatten)]
    pub apply: ApplyArgs,
}

#[derive(Args)]
pub struct InsertArgs {
    /// `^`, `$`, `^N`, `N$`, `N` or `-N`.
    #[arg(allow_hyphen_values = true)]
    pub position: String,
    pub text: String,
    #[command(flatten)]
    pub apply: ApplyArgs,
}

#[derive(Args)]
pub struct SequenceArgs {
    /// First number.
    #[arg(long, default_value_t = 1)]
    pub start: u64,
    /// Minimum zero-padded width (default 3).
    #[arg(long)]
    pub width: Option<usize>,
    #[arg(long, value_enum, default_value_t = Placement::Prefix)]
    pub placement: Placement,
    /// Text between the number and the stem.
    #[arg(long, default_value = "_")]
    pub separator: String,
    /// Text placed before the number.
    #[arg(long, default_value = "")]
    pub number_prefix: String,
    /// Text placed after the number.
    #[arg(long, default_value = "")]
    pub number_suffix: String,
    #[command(flatten)]
    pub apply: ApplyArgs,
}

#[derive(Args)]
pub struct AiArgs {
    /// JSON rename plan (see `renamer schema`).
    #[arg(long, required = true)]
    pub plan: PathBuf,
    #[command(flatten)]
    pub apply: ApplyArgs,
}
