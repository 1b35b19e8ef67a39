use std::fs::Metadata;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::accumulator::DirSize;
use super::projects::StaleProject;

/// Kind of filesystem entry, as seen without following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Other,
}

/// The subset of `fs::Metadata` the classifier and aggregator need.
/// Plain data, so classification can stay free of I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    pub kind: EntryKind,
    /// Apparent size in bytes
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub device_id: u64,
    pub inode: u64,
}

impl EntryMetadata {
    pub fn from_fs(meta: &Metadata) -> Self {
        let ft = meta.file_type();
        let kind = if ft.is_symlink() {
            EntryKind::Symlink
        } else if ft.is_dir() {
            EntryKind::Dir
        } else if ft.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };

        Self {
            kind,
            size: if kind == EntryKind::File { meta.len() } else { 0 },
            modified: meta.modified().ok(),
            accessed: meta.accessed().ok(),
            device_id: meta.dev(),
            inode: meta.ino(),
        }
    }

    /// Bare directory metadata, for fixtures and direct classification.
    pub fn dir() -> Self {
        Self {
            kind: EntryKind::Dir,
            size: 0,
            modified: None,
            accessed: None,
            device_id: 0,
            inode: 0,
        }
    }

    /// Bare file metadata with the given size.
    pub fn file(size: u64) -> Self {
        Self {
            kind: EntryKind::File,
            size,
            ..Self::dir()
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Latest of access and modification time.
    pub fn last_used(&self) -> Option<SystemTime> {
        self.modified.max(self.accessed)
    }
}

/// Why the walker could not fully account for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    PermissionDenied,
    SymlinkCycle,
    Vanished,
    SlowFilesystem,
    DepthLimit,
    Unreadable,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::PermissionDenied => "permission denied",
            SkipReason::SymlinkCycle => "symlink cycle",
            SkipReason::Vanished => "vanished during scan",
            SkipReason::SlowFilesystem => "filesystem too slow",
            SkipReason::DepthLimit => "depth limit reached",
            SkipReason::Unreadable => "unreadable",
        }
    }

    /// Suggested fix shown next to the skipped path.
    pub fn remediation(&self) -> &'static str {
        match self {
            #[cfg(target_os = "macos")]
            SkipReason::PermissionDenied => {
                "Grant Full Disk Access in System Settings > Privacy & Security, then rescan."
            }
            #[cfg(not(target_os = "macos"))]
            SkipReason::PermissionDenied => {
                "Re-run with sufficient privileges or adjust the directory permissions, then rescan."
            }
            SkipReason::SymlinkCycle => "The symlink points back into an ancestor; nothing to do.",
            SkipReason::Vanished => {
                "Removed by another process during the scan; rescan for an exact total."
            }
            SkipReason::SlowFilesystem => {
                "Check network or removable mounts, or raise scanner.stat_timeout_ms."
            }
            SkipReason::DepthLimit => "Raise scanner.max_depth to include deeper directories.",
            SkipReason::Unreadable => "Check the filesystem for errors, then rescan.",
        }
    }

    /// Whether this skip counts towards the scan's error count.
    pub fn is_error(&self) -> bool {
        !matches!(self, SkipReason::SymlinkCycle | SkipReason::Vanished)
    }
}

/// A path the scan could not fully account for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub path: PathBuf,
    pub reason: SkipReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub remediation: String,
}

impl SkippedItem {
    pub fn new(path: impl Into<PathBuf>, reason: SkipReason) -> Self {
        Self {
            path: path.into(),
            reason,
            detail: None,
            remediation: reason.remediation().to_string(),
        }
    }

    pub fn from_io(path: &Path, err: &io::Error) -> Self {
        let reason = match err.kind() {
            io::ErrorKind::PermissionDenied => SkipReason::PermissionDenied,
            io::ErrorKind::NotFound => SkipReason::Vanished,
            _ => SkipReason::Unreadable,
        };
        let mut item = Self::new(path, reason);
        if reason == SkipReason::Unreadable {
            item.detail = Some(err.to_string());
        }
        item
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// One node reported by the directory walker.
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub metadata: EntryMetadata,
    /// Depth relative to the walk root (root = 0)
    pub depth: usize,
    /// Recursive size, present when the entry was treated as an atomic unit
    /// and the walker did not descend into it.
    pub subtree: Option<DirSize>,
}

/// Message streamed from the walker to its consumer.
#[derive(Debug, Clone)]
pub enum WalkEvent {
    Entry(WalkEntry),
    Skipped(SkippedItem),
    Project(StaleProject),
}
