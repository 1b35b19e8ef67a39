use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::classifier::{Category, RiskLevel};

/// Reclaimer - find caches, logs and stale build output, then remove them safely
#[derive(Parser, Debug)]
#[command(name = "reclaimer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "PATH", env = "RECLAIMER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan for reclaimable space
    Scan(ScanArgs),

    /// Delete items from a saved inventory
    Delete(DeleteArgs),

    /// Show how a single path is classified
    Classify(ClassifyArgs),

    /// Filter the items of a saved inventory
    Query(QueryArgs),

    /// Read JSON commands on stdin and stream events on stdout
    Serve,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Directory to scan (default: configured root or home)
    pub path: Option<PathBuf>,

    /// Stream events as JSON lines instead of a summary
    #[arg(long)]
    pub json: bool,

    /// Skip the fast pass over well-known cache locations
    #[arg(long)]
    pub no_fast: bool,

    /// Write the found items to FILE for a later delete
    #[arg(long, value_name = "FILE")]
    pub save_inventory: Option<PathBuf>,

    /// Parallel walker threads
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Depth of the printed disk map
    #[arg(short = 'd', long, default_value = "2", value_name = "N")]
    pub max_depth: usize,

    /// Show top N entries per level
    #[arg(short = 'n', long, default_value = "10", value_name = "N")]
    pub top: usize,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Inventory written by `scan --save-inventory`
    #[arg(short, long, value_name = "FILE")]
    pub inventory: PathBuf,

    /// Unlink instead of moving to the trash
    #[arg(long)]
    pub permanent: bool,

    /// Show what would be deleted without doing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Print the delete log as JSON
    #[arg(long)]
    pub json: bool,

    /// Absolute paths of items to delete
    #[arg(required = true, value_name = "PATHS")]
    pub paths: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Path to classify
    pub path: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Inventory written by `scan --save-inventory`
    #[arg(short, long, value_name = "FILE")]
    pub inventory: PathBuf,

    /// Treat PATTERN as a regular expression over the full path
    #[arg(short, long)]
    pub regex: bool,

    /// Only items of this category (e.g. dev_cache)
    #[arg(long, value_name = "CATEGORY")]
    pub category: Option<Category>,

    /// Highest risk level to include (safe, caution, critical)
    #[arg(long, value_name = "LEVEL")]
    pub risk: Option<RiskLevel>,

    /// Minimum item size (e.g. 100MB, 2GB)
    #[arg(long, value_name = "SIZE")]
    pub min_size: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Substring (or regex with --regex); empty matches everything
    #[arg(default_value = "")]
    pub pattern: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_scan_command() {
        let cli = Cli::parse_from(["reclaimer", "scan", "/home", "--json", "--no-fast"]);
        match cli.command {
            Command::Scan(args) => {
                assert_eq!(args.path, Some(PathBuf::from("/home")));
                assert!(args.json);
                assert!(args.no_fast);
            }
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn parse_delete_with_options() {
        let cli = Cli::parse_from([
            "reclaimer",
            "delete",
            "--inventory",
            "inv.json",
            "--dry-run",
            "/home/u/.npm",
            "/home/u/.cache/pip",
        ]);
        match cli.command {
            Command::Delete(args) => {
                assert!(args.dry_run);
                assert!(!args.permanent);
                assert_eq!(args.paths.len(), 2);
            }
            _ => panic!("Expected Delete command"),
        }
    }

    #[test]
    fn parse_query_filters() {
        let cli = Cli::parse_from([
            "reclaimer",
            "query",
            "-i",
            "inv.json",
            "--category",
            "dev_cache",
            "--risk",
            "safe",
            "npm",
        ]);
        match cli.command {
            Command::Query(args) => {
                assert_eq!(args.category, Some(Category::DevCache));
                assert_eq!(args.risk, Some(RiskLevel::Safe));
                assert_eq!(args.pattern, "npm");
            }
            _ => panic!("Expected Query command"),
        }
    }

    #[test]
    fn delete_requires_paths() {
        assert!(Cli::try_parse_from(["reclaimer", "delete", "-i", "inv.json"]).is_err());
    }

    #[test]
    fn global_verbose_flag() {
        let cli = Cli::parse_from(["reclaimer", "-vvv", "serve"]);
        assert_eq!(cli.verbose, 3);
    }
}
