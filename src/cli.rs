use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color, or output.color = false
    pub verbose: bool,  // global --verbose
    pub format: OutputFormat,
}

#[derive(Parser)]
#[command(name = "rmk")]
#[command(about = "Keep inline reference markers ([1], [2], ...) sequential after insertions")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Debug logging on stderr (REFMARK_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format; defaults to output.format from config
    #[arg(long, global = true, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the markers found in a file
    Scan(ScanArgs),

    /// Check marker sequence integrity
    Validate(ValidateArgs),

    /// Insert a marker and renumber the ones after it
    Insert(InsertArgs),

    /// Strip duplicate markers and close numbering gaps
    Repair(RepairArgs),

    /// Initialize a refmark.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// UTF-8 text file to scan
    pub file: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// UTF-8 text file to check
    pub file: PathBuf,

    /// Accept sequences that skip numbers or start above 1
    #[arg(long)]
    pub lenient: bool,

    /// JSON mapping file to cross-check against the text
    #[arg(long, value_name = "MAP")]
    pub mapping: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct InsertArgs {
    /// UTF-8 text file to edit
    pub file: PathBuf,

    /// Byte offset of the insertion point
    #[arg(long, value_name = "OFFSET")]
    pub at: usize,

    /// Marker token to insert, e.g. "[3]"
    #[arg(long)]
    pub marker: String,

    /// Text inserted right after the marker
    #[arg(long, default_value = "")]
    pub text: String,

    /// JSON mapping file kept in sync with the renumbering
    #[arg(long, value_name = "MAP")]
    pub mapping: Option<PathBuf>,

    /// Write the result back to FILE (and MAP)
    #[arg(long)]
    pub write: bool,

    /// Show a unified diff of the change
    #[arg(long)]
    pub diff: bool,
}

#[derive(Parser, Debug)]
pub struct RepairArgs {
    /// UTF-8 text file to repair
    pub file: PathBuf,

    /// Remove repeated markers, keeping the first occurrence
    #[arg(long)]
    pub duplicates: bool,

    /// Renumber markers 1..n in order of appearance
    #[arg(long)]
    pub gaps: bool,

    /// Write the result back to FILE
    #[arg(long)]
    pub write: bool,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn insert_parses_offset_and_marker() {
        let cli = Cli::parse_from([
            "rmk", "insert", "doc.txt", "--at", "12", "--marker", "[3]", "--write", "--format",
            "json",
        ]);
        assert_eq!(cli.format, Some(OutputFormat::Json));
        match cli.command {
            Commands::Insert(args) => {
                assert_eq!(args.at, 12);
                assert_eq!(args.marker, "[3]");
                assert!(args.write);
                assert!(!args.diff);
                assert_eq!(args.text, "");
            }
            _ => panic!("expected insert"),
        }
    }
}
