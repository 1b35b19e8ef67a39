//! Query command: filter a saved inventory.

use anyhow::{bail, Context, Result};

use crate::cli::QueryArgs;
use crate::engine::{Inventory, ItemQuery, TextMatch};
use crate::scanner::{format_size, parse_size};

use super::EXIT_OK;

pub fn run(args: QueryArgs, quiet: bool) -> Result<i32> {
    let inventory = Inventory::load(&args.inventory)
        .with_context(|| format!("cannot load inventory {}", args.inventory.display()))?;

    let min_size = match &args.min_size {
        Some(s) => match parse_size(s) {
            Some(bytes) => bytes,
            None => bail!("invalid size '{}'", s),
        },
        None => 0,
    };

    let text = match (args.pattern.is_empty(), args.regex) {
        (true, _) => None,
        (false, true) => Some(TextMatch::regex(&args.pattern)?),
        (false, false) => Some(TextMatch::substring(&args.pattern)),
    };

    let query = ItemQuery {
        text,
        category: args.category,
        max_risk: args.risk,
        min_size,
    };

    let mut hits: Vec<_> = inventory.query(&query).collect();
    hits.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(EXIT_OK);
    }

    for item in &hits {
        println!(
            "{:>10}  {:<8} {:<14} {}",
            item.size_formatted,
            item.risk.as_str(),
            item.category.as_str(),
            item.path.display()
        );
    }
    if !quiet {
        let total: u64 = hits.iter().map(|i| i.size_bytes).sum();
        println!(
            "\n{} of {} item(s) match, {}",
            hits.len(),
            inventory.items.len(),
            format_size(total)
        );
    }

    Ok(EXIT_OK)
}
