//! Removes approved paths, one at a time, logging every outcome.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classifier::{PathClassifier, RiskLevel};
use crate::config::{DeleteConfig, DeleteMode, MAX_DELETE_BATCH};
use crate::engine::Inventory;
use crate::error::{EngineError, Result};
use crate::scanner::{format_size, CancelToken, EntryMetadata, SizeAccumulator};

use super::allow_list::AllowList;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStatus {
    Success,
    Error,
    Skipped,
}

/// Outcome for one requested path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteLogEntry {
    pub path: PathBuf,
    pub status: DeleteStatus,
    pub freed_bytes: u64,
    pub message: String,
}

impl DeleteLogEntry {
    fn success(path: &Path, freed_bytes: u64, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            status: DeleteStatus::Success,
            freed_bytes,
            message: message.into(),
        }
    }

    fn error(path: &Path, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            status: DeleteStatus::Error,
            freed_bytes: 0,
            message: message.into(),
        }
    }

    fn skipped(path: &Path, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            status: DeleteStatus::Skipped,
            freed_bytes: 0,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Summary of a delete request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<DeleteFailure>,
    pub skipped: Vec<PathBuf>,
    pub freed_bytes: u64,
    pub dry_run: bool,
    pub entries: Vec<DeleteLogEntry>,
}

impl DeleteReport {
    fn record(&mut self, entry: DeleteLogEntry) {
        match entry.status {
            DeleteStatus::Success => {
                self.deleted.push(entry.path.clone());
                self.freed_bytes += entry.freed_bytes;
            }
            DeleteStatus::Error => self.failed.push(DeleteFailure {
                path: entry.path.clone(),
                error: entry.message.clone(),
            }),
            DeleteStatus::Skipped => self.skipped.push(entry.path.clone()),
        }
        self.entries.push(entry);
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Sequential, cancellable deleter gated by an [`AllowList`].
pub struct DeleteExecutor<'a> {
    allow: AllowList<'a>,
    classifier: Option<&'a PathClassifier>,
    max_batch: usize,
    mode: DeleteMode,
    dry_run: bool,
    cancel: CancelToken,
}

impl<'a> DeleteExecutor<'a> {
    pub fn new(config: &DeleteConfig, inventory: &'a Inventory) -> Self {
        Self {
            allow: AllowList::new(config, inventory),
            classifier: None,
            max_batch: config.max_batch.min(MAX_DELETE_BATCH),
            mode: config.mode,
            dry_run: false,
            cancel: CancelToken::new(),
        }
    }

    /// Re-classify each target before removal so a path that has become
    /// critical since the scan is refused.
    pub fn with_classifier(mut self, classifier: &'a PathClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_mode(mut self, mode: DeleteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Delete `paths` in order. `on_entry` sees each outcome as it happens.
    /// Only an oversized batch fails the request as a whole.
    pub fn execute<F>(&self, paths: &[PathBuf], mut on_entry: F) -> Result<DeleteReport>
    where
        F: FnMut(&DeleteLogEntry),
    {
        if paths.len() > self.max_batch {
            return Err(EngineError::BatchTooLarge {
                requested: paths.len(),
                limit: self.max_batch,
            });
        }

        let mut report = DeleteReport {
            dry_run: self.dry_run,
            ..Default::default()
        };
        let mut seen = HashSet::new();

        for path in paths {
            let entry = if self.cancel.is_cancelled() {
                DeleteLogEntry::skipped(path, "cancelled")
            } else if !seen.insert(path.as_path()) {
                DeleteLogEntry::skipped(path, "duplicate request")
            } else {
                self.delete_one(path)
            };

            match entry.status {
                DeleteStatus::Success => {
                    tracing::info!(path = %path.display(), freed = entry.freed_bytes, dry_run = self.dry_run, "deleted")
                }
                DeleteStatus::Error => {
                    tracing::warn!(path = %path.display(), reason = %entry.message, "delete failed")
                }
                DeleteStatus::Skipped => {
                    tracing::debug!(path = %path.display(), reason = %entry.message, "delete skipped")
                }
            }
            on_entry(&entry);
            report.record(entry);
        }

        tracing::info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            freed = %format_size(report.freed_bytes),
            "delete finished"
        );
        Ok(report)
    }

    fn delete_one(&self, path: &Path) -> DeleteLogEntry {
        if let Err(refusal) = self.allow.check(path) {
            return DeleteLogEntry::error(path, refusal.to_string());
        }

        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return DeleteLogEntry::error(path, "path no longer exists");
            }
            Err(e) => return DeleteLogEntry::error(path, e.to_string()),
        };

        if let Some(classifier) = self.classifier {
            let current = classifier.classify(path, &EntryMetadata::from_fs(&meta));
            if current.is_some_and(|c| c.risk == RiskLevel::Critical) && !self.allow.allow_critical() {
                return DeleteLogEntry::error(path, "path is now classified critical");
            }
        }

        let freed = if meta.is_dir() {
            SizeAccumulator::new(self.cancel.clone()).size_of(path).bytes
        } else {
            meta.len()
        };

        if self.dry_run {
            return DeleteLogEntry::success(path, freed, "dry run");
        }

        let result = match self.mode {
            DeleteMode::Trash => trash::delete(path).map_err(|e| e.to_string()),
            DeleteMode::Permanent => remove(path, meta.is_dir()).map_err(|e| e.to_string()),
        };

        match result {
            Ok(()) => {
                let message = match self.mode {
                    DeleteMode::Trash => "moved to trash",
                    DeleteMode::Permanent => "removed",
                };
                DeleteLogEntry::success(path, freed, message)
            }
            Err(message) => DeleteLogEntry::error(path, message),
        }
    }
}

fn remove(path: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
