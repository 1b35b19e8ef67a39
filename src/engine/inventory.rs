//! Persisted scan results and simple filtering over them.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::classifier::{Category, RiskLevel};
use crate::error::{EngineError, Result};
use crate::scanner::TreeNode;

use super::events::{ItemRecord, ScanReport, SCHEMA_VERSION};

/// The item list of a finished scan. Doubles as the delete allow-list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub schema_version: u32,
    pub scan_id: String,
    pub root: PathBuf,
    /// RFC 3339
    pub created_at: String,
    pub items: Vec<ItemRecord>,
}

impl Inventory {
    pub fn from_report(scan_id: impl Into<String>, report: &ScanReport) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            scan_id: scan_id.into(),
            root: report.root.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            items: report.items.clone(),
        }
    }

    /// An inventory that allows nothing.
    pub fn empty() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            scan_id: String::new(),
            root: PathBuf::new(),
            created_at: chrono::Utc::now().to_rfc3339(),
            items: Vec::new(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| EngineError::io(path, e))?;
        tracing::info!(path = %path.display(), items = self.items.len(), "saved inventory");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        let inventory: Inventory = serde_json::from_str(&content)?;
        if inventory.schema_version != SCHEMA_VERSION {
            return Err(EngineError::InvalidInventory(format!(
                "inventory {} has schema version {}, expected {}",
                path.display(),
                inventory.schema_version,
                SCHEMA_VERSION
            )));
        }
        Ok(inventory)
    }

    /// The item at `path`, or the item containing it.
    pub fn covering_item(&self, path: &Path) -> Option<&ItemRecord> {
        self.items.iter().find(|item| path.starts_with(&item.path))
    }

    pub fn total_bytes(&self) -> u64 {
        self.items.iter().map(|i| i.size_bytes).sum()
    }

    pub fn query<'a>(&'a self, query: &'a ItemQuery) -> impl Iterator<Item = &'a ItemRecord> + 'a {
        self.items.iter().filter(move |item| query.matches(item))
    }
}

/// Text matcher for [`ItemQuery`].
#[derive(Debug, Clone)]
pub enum TextMatch {
    /// Case-insensitive substring of path, name or description
    Substring(String),
    /// Regex over the full path
    Regex(Regex),
}

impl TextMatch {
    pub fn substring(text: &str) -> Self {
        TextMatch::Substring(text.to_lowercase())
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(TextMatch::Regex)
            .map_err(|e| EngineError::InvalidQuery(format!("bad regex '{pattern}': {e}")))
    }

    fn matches(&self, item: &ItemRecord) -> bool {
        match self {
            TextMatch::Substring(needle) => {
                item.path.to_string_lossy().to_lowercase().contains(needle)
                    || item.name.to_lowercase().contains(needle)
                    || item.description.to_lowercase().contains(needle)
            }
            TextMatch::Regex(re) => re.is_match(&item.path.to_string_lossy()),
        }
    }
}

/// Filter over collected items. Empty query matches everything.
#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    pub text: Option<TextMatch>,
    pub category: Option<Category>,
    /// Highest risk to include
    pub max_risk: Option<RiskLevel>,
    pub min_size: u64,
}

impl ItemQuery {
    pub fn matches(&self, item: &ItemRecord) -> bool {
        self.text.as_ref().map_or(true, |t| t.matches(item))
            && self.category.map_or(true, |c| item.category == c)
            && self.max_risk.map_or(true, |r| item.risk <= r)
            && item.size_bytes >= self.min_size
    }
}

/// Category → item tree. Categories without items are omitted.
pub fn category_tree(items: &[ItemRecord]) -> TreeNode {
    let children = Category::ALL
        .iter()
        .filter_map(|category| {
            let leaves: Vec<TreeNode> = items
                .iter()
                .filter(|i| i.category == *category)
                .map(|i| TreeNode::leaf(i.name.clone(), Some(i.path.clone()), i.size_bytes))
                .collect();
            (!leaves.is_empty()).then(|| TreeNode::branch(category.as_str(), None, leaves))
        })
        .collect();
    TreeNode::branch("reclaimable", None, children)
}
