//! Recursive directory sizes, memoized per scan run.

use std::collections::HashMap;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;
use rayon::prelude::*;
use walkdir::WalkDir;

use super::cancel::CancelToken;
use super::entry::{EntryMetadata, SkipReason, SkippedItem};

/// Recursive byte total of a subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirSize {
    pub bytes: u64,
    pub file_count: u64,
    /// Latest access/modification time seen among the files
    pub last_used: Option<SystemTime>,
    /// Some descendants could not be read; `bytes` is a lower bound
    pub incomplete: bool,
    pub skipped: Vec<SkippedItem>,
}

impl DirSize {
    /// Size of a single file treated as a unit.
    pub fn of_file(meta: &EntryMetadata) -> Self {
        Self {
            bytes: meta.size,
            file_count: 1,
            last_used: meta.last_used(),
            incomplete: false,
            skipped: Vec::new(),
        }
    }

    fn add_file(&mut self, meta: &Metadata) {
        self.bytes = self.bytes.saturating_add(meta.len());
        self.file_count += 1;
        let used = meta.modified().ok().max(meta.accessed().ok());
        self.last_used = self.last_used.max(used);
    }

    fn merge(mut self, other: DirSize) -> DirSize {
        self.bytes = self.bytes.saturating_add(other.bytes);
        self.file_count += other.file_count;
        self.last_used = self.last_used.max(other.last_used);
        self.incomplete |= other.incomplete;
        self.skipped.extend(other.skipped);
        self
    }

    fn record_error(&mut self, path: &Path, err: &io::Error) {
        if err.kind() == io::ErrorKind::NotFound {
            // raced with another process; the bytes are gone anyway
            tracing::debug!(path = %path.display(), "vanished while sizing");
            return;
        }
        tracing::warn!(path = %path.display(), error = %err, "cannot size subtree");
        self.incomplete = true;
        self.skipped.push(SkippedItem::from_io(path, err));
    }
}

/// Computes `(bytes, file_count)` for subtrees, caching results so a
/// subtree touched by both scan passes is only traversed once.
#[derive(Debug)]
pub struct SizeAccumulator {
    cache: Mutex<HashMap<PathBuf, DirSize>>,
    cancel: CancelToken,
}

impl SizeAccumulator {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            cancel,
        }
    }

    /// Recursive size of `path`. Symlinks are not followed. Files that
    /// disappear mid-walk are skipped; unreadable subtrees mark the result
    /// incomplete and are listed in `skipped`.
    pub fn size_of(&self, path: &Path) -> DirSize {
        if let Some(hit) = self.cache.lock().get(path) {
            return hit.clone();
        }

        let size = self.compute(path);

        // a cancelled walk is partial and must not be served later
        if !self.cancel.is_cancelled() {
            self.cache.lock().insert(path.to_path_buf(), size.clone());
        }
        size
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }

    fn compute(&self, path: &Path) -> DirSize {
        let cancel = self.cancel.clone();

        let mut size = WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .take_while(move |_| !cancel.is_cancelled())
            .par_bridge()
            .fold(DirSize::default, |mut acc, result| {
                match result {
                    Ok(entry) if entry.file_type().is_file() => match entry.metadata() {
                        Ok(meta) => acc.add_file(&meta),
                        Err(err) => {
                            if let Some(io_err) = err.io_error() {
                                acc.record_error(entry.path(), io_err);
                            }
                        }
                    },
                    Ok(_) => {}
                    Err(err) => {
                        let at = err.path().unwrap_or(path).to_path_buf();
                        match err.io_error() {
                            Some(io_err) => acc.record_error(&at, io_err),
                            None => {
                                acc.incomplete = true;
                                acc.skipped.push(
                                    SkippedItem::new(at, SkipReason::SymlinkCycle)
                                        .with_detail(err.to_string()),
                                );
                            }
                        }
                    }
                }
                acc
            })
            .reduce(DirSize::default, DirSize::merge);

        if self.cancel.is_cancelled() {
            size.incomplete = true;
        }
        size.skipped.sort_by(|a, b| a.path.cmp(&b.path));
        size
    }
}
