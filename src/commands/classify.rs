//! Classify command: explain how one path would be treated by a scan.

use std::fs;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::classifier::Classification;
use crate::cli::ClassifyArgs;
use crate::config::Config;
use crate::scanner::EntryMetadata;

use super::EXIT_OK;

#[derive(Serialize)]
struct ClassifyOutput<'a> {
    path: &'a std::path::Path,
    classification: Option<&'a Classification>,
}

pub fn run(args: ClassifyArgs, config: &Config) -> Result<i32> {
    let classifier = config.classifier()?;

    let path = args
        .path
        .canonicalize()
        .with_context(|| format!("cannot resolve {}", args.path.display()))?;
    let meta = fs::symlink_metadata(&path)
        .with_context(|| format!("cannot stat {}", path.display()))?;
    let classification = classifier.classify(&path, &EntryMetadata::from_fs(&meta));

    if args.json {
        let output = ClassifyOutput {
            path: &path,
            classification: classification.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        match &classification {
            Some(c) => {
                println!("{}", path.display());
                println!("  category:    {} ({})", c.category, c.category.label());
                println!("  risk:        {}", c.risk);
                println!("  confidence:  {:.2}", c.confidence);
                println!("  rule:        {}", c.rule);
                println!("  description: {}", c.description);
                println!("  if deleted:  {}", c.recovery_note);
            }
            None => println!("{}: not reclaimable", path.display()),
        }
    }

    Ok(EXIT_OK)
}
