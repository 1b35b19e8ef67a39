//! Hierarchical size trees: the category tree and the disk map.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Label of the leaf that holds bytes of files sitting directly in a
/// directory that also has subdirectory nodes, or of everything below the
/// depth cutoff.
pub const LOOSE_FILES_LABEL: &str = "(files)";

/// A node of a size tree. For any node with children, `size_bytes` equals
/// the sum of the children's sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn leaf(name: impl Into<String>, path: Option<PathBuf>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            path,
            size_bytes,
            children: Vec::new(),
        }
    }

    /// A node whose size is derived from `children`.
    pub fn branch(name: impl Into<String>, path: Option<PathBuf>, children: Vec<TreeNode>) -> Self {
        let mut node = Self {
            name: name.into(),
            path,
            size_bytes: 0,
            children,
        };
        node.recalculate_totals();
        node
    }

    /// Recompute sizes bottom-up so every parent equals the sum of its children.
    pub fn recalculate_totals(&mut self) {
        if self.children.is_empty() {
            return;
        }
        for child in &mut self.children {
            child.recalculate_totals();
        }
        self.size_bytes = self
            .children
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(c.size_bytes));
    }

    /// Sort children by size, largest first, recursively.
    pub fn sort_by_size(&mut self) {
        self.children
            .sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes).then_with(|| a.name.cmp(&b.name)));
        for child in &mut self.children {
            child.sort_by_size();
        }
    }

    /// Sort children by name, recursively.
    pub fn sort_by_name(&mut self) {
        self.children.sort_by(|a, b| a.name.cmp(&b.name));
        for child in &mut self.children {
            child.sort_by_name();
        }
    }

    /// Whether every parent in the tree equals the sum of its children.
    pub fn is_consistent(&self) -> bool {
        if self.children.is_empty() {
            return true;
        }
        let sum: u64 = self.children.iter().map(|c| c.size_bytes).sum();
        sum == self.size_bytes && self.children.iter().all(TreeNode::is_consistent)
    }

    pub fn child(&self, name: &str) -> Option<&TreeNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::node_count).sum::<usize>()
    }
}

#[derive(Debug, Default)]
struct MapNode {
    loose: u64,
    children: BTreeMap<String, MapNode>,
}

impl MapNode {
    fn into_tree(self, name: String, path: PathBuf) -> TreeNode {
        if self.children.is_empty() {
            return TreeNode::leaf(name, Some(path), self.loose);
        }

        let mut children: Vec<TreeNode> = self
            .children
            .into_iter()
            .map(|(child_name, node)| {
                let child_path = path.join(&child_name);
                node.into_tree(child_name, child_path)
            })
            .collect();
        if self.loose > 0 {
            children.push(TreeNode::leaf(LOOSE_FILES_LABEL, None, self.loose));
        }
        TreeNode::branch(name, Some(path), children)
    }
}

/// Builds a disk map of a root directory, truncated at a fixed depth.
///
/// Observations are files or unit subtrees. Bytes below the cutoff roll up
/// into their ancestor at the cutoff depth.
#[derive(Debug)]
pub struct DiskMapBuilder {
    root: PathBuf,
    max_depth: usize,
    top: MapNode,
}

impl DiskMapBuilder {
    pub fn new(root: impl Into<PathBuf>, max_depth: usize) -> Self {
        Self {
            root: root.into(),
            max_depth,
            top: MapNode::default(),
        }
    }

    /// Record `bytes` observed at `path`. `is_dir` marks a directory sized
    /// as a whole. Returns false for paths outside the root.
    pub fn add(&mut self, path: &Path, bytes: u64, is_dir: bool) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };

        let mut names: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if !is_dir {
            names.pop();
        }

        let mut node = &mut self.top;
        for name in names.into_iter().take(self.max_depth) {
            node = node.children.entry(name).or_default();
        }
        node.loose = node.loose.saturating_add(bytes);
        true
    }

    pub fn build(self) -> TreeNode {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string());
        self.top.into_tree(name, self.root)
    }
}
