//! Which paths a delete request may touch.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::classifier::RiskLevel;
use crate::config::DeleteConfig;
use crate::engine::{Inventory, ItemRecord};

/// Why a path was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    NotAbsolute,
    ParentComponent,
    OutsideAllowedRoots,
    /// The path is one of the allowed roots itself
    AllowedRoot,
    NotInInventory,
    Critical,
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Refusal::NotAbsolute => "path is not absolute",
            Refusal::ParentComponent => "path contains '..'",
            Refusal::OutsideAllowedRoots => "path is outside the allowed roots",
            Refusal::AllowedRoot => "refusing to delete an allowed root",
            Refusal::NotInInventory => "path is not a scanned item",
            Refusal::Critical => "item is critical; set delete.allow_critical to remove it",
        };
        f.write_str(msg)
    }
}

/// Paths under `allowed_roots` that are, or lie inside, an inventory item.
pub struct AllowList<'a> {
    roots: Vec<PathBuf>,
    inventory: &'a Inventory,
    allow_critical: bool,
}

impl<'a> AllowList<'a> {
    pub fn new(config: &DeleteConfig, inventory: &'a Inventory) -> Self {
        Self {
            roots: config.effective_allowed_roots(),
            inventory,
            allow_critical: config.allow_critical,
        }
    }

    pub fn allow_critical(&self) -> bool {
        self.allow_critical
    }

    /// The inventory item covering `path`, if deleting it is permitted.
    pub fn check(&self, path: &Path) -> Result<&'a ItemRecord, Refusal> {
        if !path.is_absolute() {
            return Err(Refusal::NotAbsolute);
        }
        if path.components().any(|c| c == Component::ParentDir) {
            return Err(Refusal::ParentComponent);
        }
        if self.roots.iter().any(|root| root == path) {
            return Err(Refusal::AllowedRoot);
        }
        if !self.roots.iter().any(|root| path.starts_with(root)) {
            return Err(Refusal::OutsideAllowedRoots);
        }

        let item = self
            .inventory
            .covering_item(path)
            .ok_or(Refusal::NotInInventory)?;
        if item.risk == RiskLevel::Critical && !self.allow_critical {
            return Err(Refusal::Critical);
        }
        Ok(item)
    }
}
