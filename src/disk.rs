//! Filesystem capacity as reported by the OS.

use std::path::{Path, PathBuf};

use nix::sys::statvfs::statvfs;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Capacity of the filesystem holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiskStats {
    /// Total capacity in bytes
    pub total: u64,
    /// Used space in bytes (total minus free, reserved blocks count as used)
    pub used: u64,
    /// Free space in bytes, including blocks reserved for root
    pub free: u64,
    /// Space available to unprivileged users
    pub available: u64,
}

impl DiskStats {
    /// Usage percentage of the space users can actually use
    pub fn percent_used(&self) -> f64 {
        let usable_total = self.used + self.available;
        if usable_total == 0 {
            return 0.0;
        }
        self.used as f64 / usable_total as f64 * 100.0
    }

    pub fn used_human(&self) -> String {
        humansize::format_size(self.used, humansize::BINARY)
    }

    pub fn total_human(&self) -> String {
        humansize::format_size(self.total, humansize::BINARY)
    }

    pub fn free_human(&self) -> String {
        humansize::format_size(self.free, humansize::BINARY)
    }
}

/// Query the filesystem that holds `path`.
pub fn disk_stats(path: &Path) -> Result<DiskStats> {
    let stat = statvfs(path).map_err(|source| EngineError::Disk {
        path: PathBuf::from(path),
        source,
    })?;

    let block_size = stat.fragment_size() as u64;
    let total = stat.blocks() as u64 * block_size;
    let free = stat.blocks_free() as u64 * block_size;
    let available = stat.blocks_available() as u64 * block_size;

    Ok(DiskStats {
        total,
        used: total.saturating_sub(free),
        free,
        available,
    })
}
