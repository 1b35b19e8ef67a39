mod accumulator;
mod cancel;
mod entry;
mod formatter;
mod options;
pub mod projects;
mod size;
mod tree;
mod walker;

pub use accumulator::{DirSize, SizeAccumulator};
pub use cancel::CancelToken;
pub use entry::{EntryKind, EntryMetadata, SkipReason, SkippedItem, WalkEntry, WalkEvent};
pub use formatter::{format_table, format_tree, FormatOptions};
pub use options::ScanOptions;
pub use projects::StaleProject;
pub use size::{format_size, parse_size};
pub use tree::{DiskMapBuilder, TreeNode, LOOSE_FILES_LABEL};
pub use walker::{DirectoryWalker, PruneFn, WalkRoot};
