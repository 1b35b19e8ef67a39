//! Scan command implementation

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::ScanArgs;
use crate::config::Config;
use crate::engine::{ScanEngine, ScanEvent, ScanReport, ScanRequest};
use crate::scanner::{format_size, format_table, format_tree, FormatOptions};
use crate::signals;

use super::{EXIT_CANCELLED, EXIT_ERROR, EXIT_OK};

/// Run the scan command
pub fn run(args: ScanArgs, mut config: Config, quiet: bool) -> Result<i32> {
    if let Some(jobs) = args.jobs {
        config.scanner.threads = jobs;
    }

    let engine = ScanEngine::new(config)?;
    let handle = engine.start_scan(ScanRequest {
        root: args.path.clone(),
        skip_fast_pass: args.no_fast,
    })?;

    if let Err(err) = signals::install_cancel_handler(handle.cancel_token().flag()) {
        tracing::warn!(error = %err, "cannot install signal handler; Ctrl-C will not cancel cleanly");
    }

    let spinner = if args.json || quiet {
        None
    } else {
        Some(spinner()?)
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut code = EXIT_ERROR;
    let mut report: Option<Box<ScanReport>> = None;

    for envelope in handle.events().iter() {
        if args.json {
            writeln!(out, "{}", envelope.to_json_line()?)?;
            out.flush()?;
        }

        match envelope.event {
            ScanEvent::Progress(progress) => {
                if let Some(pb) = &spinner {
                    pb.set_message(format!(
                        "{} pass: {} files, {} ({:.1} MB/s)",
                        progress.phase.as_str(),
                        progress.files_processed,
                        format_size(progress.bytes_scanned),
                        progress.scan_rate_mbps
                    ));
                }
            }
            ScanEvent::Complete(r) => {
                code = EXIT_OK;
                report = Some(r);
            }
            ScanEvent::Cancelled { items_found, .. } => {
                code = EXIT_CANCELLED;
                if !args.json {
                    eprintln!("Scan cancelled after finding {} item(s).", items_found);
                }
            }
            ScanEvent::Error { message } => {
                code = EXIT_ERROR;
                if !args.json {
                    eprintln!("Error: {}", message);
                }
            }
            _ => {}
        }
    }
    handle.wait();

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    if let Some(report) = report {
        if !args.json && !quiet {
            print_report(&report, &args);
        }
        if let Some(path) = &args.save_inventory {
            let inventory = engine
                .inventory()
                .context("scan completed without an inventory")?;
            inventory
                .save(path)
                .with_context(|| format!("cannot write inventory to {}", path.display()))?;
            if !args.json && !quiet {
                println!("\nInventory saved to {}", path.display());
            }
        }
    }

    Ok(code)
}

fn spinner() -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "])
            .template("{spinner} {msg} [{elapsed}]")?,
    );
    pb.set_message("starting");
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn print_report(report: &ScanReport, args: &ScanArgs) {
    let m = &report.metrics;
    println!(
        "Scanned {} in {:.1}s: {} files, {}",
        report.root.display(),
        m.total_seconds,
        m.files_processed,
        format_size(m.bytes_scanned)
    );
    println!(
        "Reclaimable: {} in {} item{} ({} safe)",
        format_size(m.reclaimable_bytes),
        m.items_found,
        if m.items_found == 1 { "" } else { "s" },
        format_size(m.safe_reclaimable_bytes)
    );

    if !report.categories.is_empty() {
        let mut by_category = report.full_tree.clone();
        by_category.sort_by_size();
        println!();
        print!("{}", format_table(&by_category, &FormatOptions::unlimited().with_max_depth(1)));
    }

    let mut items: Vec<_> = report.items.iter().collect();
    items.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
    if !items.is_empty() {
        println!("\n  {:>10} {:<8} {}", "SIZE", "RISK", "PATH");
        println!("  {}", "─".repeat(72));
        for item in items.iter().take(args.top) {
            println!(
                "  {:>10} {:<8} {}",
                item.size_formatted,
                item.risk.as_str(),
                item.path.display()
            );
        }
    }

    let mut disk_map = report.disk_map.clone();
    disk_map.sort_by_size();
    let options = FormatOptions::new()
        .with_max_depth(args.max_depth)
        .with_top_n(args.top)
        .with_percent(true);
    println!("\n{}", format_tree(&disk_map, &options));

    if !report.recommendations.is_empty() {
        println!("\nRecommendations:");
        for rec in &report.recommendations {
            println!("  - {}: {}", rec.title, rec.detail);
        }
    }

    let r = &report.reconciliation;
    let disk = report.disk();
    println!(
        "\nDisk: {} of {} used ({:.0}%), {} free",
        disk.used_human(),
        disk.total_human(),
        disk.percent_used(),
        disk.free_human()
    );
    println!(
        "Mapped {} of the used space ({:.1}%)",
        format_size(r.mapped_bytes),
        r.mapped_pct
    );
    for bucket in &r.skipped_by_reason {
        println!(
            "  skipped {} path(s): {}. {}",
            bucket.count,
            bucket.reason.as_str(),
            bucket.remediation
        );
    }
}
