use std::path::Path;
use std::time::Duration;

use crate::config::ScannerConfig;

/// Configuration options for directory walking and size accounting.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Maximum depth to recurse. Also the fallback bound against symlink loops.
    pub max_depth: usize,

    /// Include hidden files/directories (starting with .)
    pub include_hidden: bool,

    /// Stay on the same filesystem (don't cross mount points)
    pub one_file_system: bool,

    /// Number of walker threads (0 = one per logical core)
    pub threads: usize,

    /// Follow symbolic links (cycles are detected by inode)
    pub follow_symlinks: bool,

    /// A stat call slower than this skips the path
    pub stat_timeout: Duration,

    /// Detect software projects with stale build artifacts during the walk
    pub detect_projects: bool,

    /// Age after which a project counts as stale
    pub stale_after: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_depth: 64,
            // caches live almost exclusively in dot-directories
            include_hidden: true,
            one_file_system: true,
            threads: 0,
            follow_symlinks: false,
            stat_timeout: Duration::from_secs(3),
            detect_projects: true,
            stale_after: Duration::from_secs(90 * 86_400),
        }
    }
}

/// Linux virtual filesystem paths that should be excluded by default.
/// These can report incorrect/huge sizes and cause scanning issues.
pub const LINUX_VIRTUAL_FS_PATHS: &[&str] = &["/proc", "/dev", "/sys", "/run"];

impl ScanOptions {
    /// Check if a path should be excluded based on Linux virtual filesystem paths
    pub fn is_linux_virtual_fs(path: &Path) -> bool {
        LINUX_VIRTUAL_FS_PATHS
            .iter()
            .any(|vfs| path.starts_with(vfs))
    }

    /// Create a new ScanOptions with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Build options from the `[scanner]` config section.
    pub fn from_config(config: &ScannerConfig, stale_project_days: u32) -> Self {
        Self {
            max_depth: config.max_depth,
            include_hidden: true,
            one_file_system: config.one_file_system,
            threads: config.threads,
            follow_symlinks: config.follow_symlinks,
            stat_timeout: Duration::from_millis(config.stat_timeout_ms),
            detect_projects: stale_project_days > 0,
            stale_after: Duration::from_secs(u64::from(stale_project_days) * 86_400),
        }
    }

    /// Set maximum recursion depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set whether to include hidden files
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Set whether to stay on the same filesystem
    pub fn with_one_file_system(mut self, enabled: bool) -> Self {
        self.one_file_system = enabled;
        self
    }

    /// Set number of walker threads
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set whether to follow symbolic links
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Enable or disable stale project detection
    pub fn with_project_detection(mut self, enabled: bool) -> Self {
        self.detect_projects = enabled;
        self
    }

    /// Effective worker count
    pub fn worker_count(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }
}
