//! Delete command implementation.

use anyhow::{Context, Result};

use crate::cleaner::{DeleteLogEntry, DeleteStatus};
use crate::cli::DeleteArgs;
use crate::config::{Config, DeleteMode};
use crate::engine::{Inventory, ScanEngine};
use crate::scanner::{format_size, CancelToken};
use crate::signals;

use super::{EXIT_OK, EXIT_PARTIAL};

/// Run the delete command.
pub fn run(args: DeleteArgs, mut config: Config, quiet: bool) -> Result<i32> {
    if args.permanent {
        config.delete.mode = DeleteMode::Permanent;
    }

    let inventory = Inventory::load(&args.inventory)
        .with_context(|| format!("cannot load inventory {}", args.inventory.display()))?;
    tracing::info!(items = inventory.items.len(), scan_id = %inventory.scan_id, "loaded inventory");

    let engine = ScanEngine::new(config)?;
    engine.set_inventory(inventory);

    let cancel = CancelToken::new();
    if let Err(err) = signals::install_cancel_handler(cancel.flag()) {
        tracing::warn!(error = %err, "cannot install signal handler");
    }

    let show = !args.json && !quiet;
    if show && args.dry_run {
        println!("[DRY RUN] Would delete:");
    }

    let report = engine.delete_with(&args.paths, args.dry_run, cancel, |entry| {
        if show {
            print_entry(entry);
        }
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !quiet {
        println!(
            "\n{} {} across {} path{}, {} failed, {} skipped",
            if args.dry_run { "Would free" } else { "Freed" },
            format_size(report.freed_bytes),
            report.deleted.len(),
            if report.deleted.len() == 1 { "" } else { "s" },
            report.failed.len(),
            report.skipped.len()
        );
    }

    Ok(if report.has_failures() { EXIT_PARTIAL } else { EXIT_OK })
}

fn print_entry(entry: &DeleteLogEntry) {
    match entry.status {
        DeleteStatus::Success => println!(
            "  ✓ {} ({}) {}",
            entry.path.display(),
            format_size(entry.freed_bytes),
            entry.message
        ),
        DeleteStatus::Error => eprintln!("  ✗ {}: {}", entry.path.display(), entry.message),
        DeleteStatus::Skipped => println!("  - {}: {}", entry.path.display(), entry.message),
    }
}
