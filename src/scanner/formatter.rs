use super::size::format_size;
use super::tree::TreeNode;

/// Format options for tree output
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// Maximum depth to display
    pub max_depth: Option<usize>,
    /// Show only top N entries per node
    pub top_n: Option<usize>,
    /// Show each node's share of its parent
    pub show_percent: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            max_depth: Some(3),
            top_n: Some(20),
            show_percent: false,
        }
    }
}

impl FormatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_top_n(mut self, n: usize) -> Self {
        self.top_n = Some(n);
        self
    }

    pub fn with_percent(mut self, show: bool) -> Self {
        self.show_percent = show;
        self
    }

    pub fn unlimited() -> Self {
        Self {
            max_depth: None,
            top_n: None,
            show_percent: false,
        }
    }
}

/// Format a size tree with box-drawing connectors. Children are printed in
/// their stored order; sort the tree first for a largest-first listing.
pub fn format_tree(node: &TreeNode, options: &FormatOptions) -> String {
    let mut output = String::new();
    format_tree_recursive(node, None, &mut output, "", true, 0, options);
    output
}

fn format_tree_recursive(
    node: &TreeNode,
    parent_size: Option<u64>,
    output: &mut String,
    prefix: &str,
    is_last: bool,
    depth: usize,
    options: &FormatOptions,
) {
    if let Some(max_depth) = options.max_depth {
        if depth > max_depth {
            return;
        }
    }

    let connector = if depth == 0 {
        ""
    } else if is_last {
        "└── "
    } else {
        "├── "
    };

    let name = if node.children.is_empty() {
        node.name.clone()
    } else {
        format!("{}/", node.name)
    };

    let percent = match parent_size {
        Some(total) if options.show_percent && total > 0 => {
            format!(" ({:.1}%)", node.size_bytes as f64 / total as f64 * 100.0)
        }
        _ => String::new(),
    };

    output.push_str(&format!(
        "{}{}{:>10}  {}{}\n",
        prefix,
        connector,
        format_size(node.size_bytes),
        name,
        percent
    ));

    if node.children.is_empty() {
        return;
    }

    let new_prefix = if depth == 0 {
        String::new()
    } else if is_last {
        format!("{}    ", prefix)
    } else {
        format!("{}│   ", prefix)
    };

    let shown = options
        .top_n
        .map_or(node.children.len(), |n| n.min(node.children.len()));
    let hidden = node.children.len() - shown;

    for (i, child) in node.children.iter().take(shown).enumerate() {
        let is_last_child = i + 1 == shown && hidden == 0;
        format_tree_recursive(
            child,
            Some(node.size_bytes),
            output,
            &new_prefix,
            is_last_child,
            depth + 1,
            options,
        );
    }

    if hidden > 0 {
        output.push_str(&format!("{}└── ... and {} more entries\n", new_prefix, hidden));
    }
}

/// Format a size tree as an indented two-column table
pub fn format_table(node: &TreeNode, options: &FormatOptions) -> String {
    let mut output = String::new();

    output.push_str(&format!("{:>12}  {}\n", "SIZE", "NAME"));
    output.push_str(&format!("{:->12}  {:-<50}\n", "", ""));

    format_table_recursive(node, &mut output, 0, options);

    output
}

fn format_table_recursive(node: &TreeNode, output: &mut String, depth: usize, options: &FormatOptions) {
    if let Some(max_depth) = options.max_depth {
        if depth > max_depth {
            return;
        }
    }

    let indent = "  ".repeat(depth);
    output.push_str(&format!(
        "{:>12}  {}{}\n",
        format_size(node.size_bytes),
        indent,
        node.name
    ));

    let shown = options
        .top_n
        .map_or(node.children.len(), |n| n.min(node.children.len()));

    for child in node.children.iter().take(shown) {
        format_table_recursive(child, output, depth + 1, options);
    }

    if shown < node.children.len() {
        let indent = "  ".repeat(depth + 1);
        output.push_str(&format!(
            "{:>12}  {}... {} more\n",
            "",
            indent,
            node.children.len() - shown
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_tree() -> TreeNode {
        let subdir = TreeNode::branch(
            "subdir",
            None,
            vec![TreeNode::leaf("file.txt", None, 1024)],
        );
        let mut root = TreeNode::branch(
            "test",
            None,
            vec![TreeNode::leaf("large.bin", None, 1_048_576), subdir],
        );
        root.sort_by_size();
        root
    }

    #[test]
    fn test_format_tree_basic() {
        let output = format_tree(&create_test_tree(), &FormatOptions::default());

        assert!(output.contains("test/"));
        assert!(output.contains("large.bin"));
        assert!(output.contains("subdir/"));
        assert!(output.contains("1.00 MB"));
    }

    #[test]
    fn test_format_tree_contains_structure() {
        let output = format_tree(&create_test_tree(), &FormatOptions::unlimited());
        assert!(output.contains("├──"));
        assert!(output.contains("└──"));
    }

    #[test]
    fn test_format_tree_depth_limit() {
        let options = FormatOptions::new().with_max_depth(1);
        let output = format_tree(&create_test_tree(), &options);

        assert!(output.contains("subdir/"));
        assert!(!output.contains("file.txt"));
    }

    #[test]
    fn test_format_tree_with_percent() {
        let tree = TreeNode::branch(
            "root",
            None,
            vec![TreeNode::leaf("a", None, 75), TreeNode::leaf("b", None, 25)],
        );
        let output = format_tree(&tree, &FormatOptions::new().with_percent(true));
        assert!(output.contains("(75.0%)"));
        assert!(output.contains("(25.0%)"));
    }

    #[test]
    fn test_format_tree_top_n() {
        let children = (0..10)
            .map(|i| TreeNode::leaf(format!("file{}.txt", i), None, 1000 * (10 - i as u64)))
            .collect();
        let mut root = TreeNode::branch("test", None, children);
        root.sort_by_size();

        let output = format_tree(&root, &FormatOptions::new().with_top_n(3));

        assert!(output.contains("file0.txt"));
        assert!(output.contains("file2.txt"));
        assert!(!output.contains("file9.txt"));
        assert!(output.contains("7 more entries"));
    }

    #[test]
    fn test_format_table_indentation() {
        let output = format_table(&create_test_tree(), &FormatOptions::unlimited());

        assert!(output.contains("SIZE"));
        let lines: Vec<&str> = output.lines().collect();
        let subdir_line = lines.iter().find(|l| l.contains("subdir")).unwrap();
        let root_line = lines
            .iter()
            .find(|l| l.contains("test") && !l.contains("subdir"))
            .unwrap();
        assert!(subdir_line.find("subdir").unwrap() > root_line.find("test").unwrap());
    }
}
