//! Parallel directory walker.
//!
//! Workers pull directories from a shared queue, stat their children and
//! stream [`WalkEvent`]s to the consumer as they are discovered. Subtrees the
//! consumer wants treated as a unit are sized through the shared
//! [`SizeAccumulator`] instead of being descended into.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use crossbeam_channel::{self as channel, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::error::{EngineError, Result};

use super::accumulator::{DirSize, SizeAccumulator};
use super::cancel::CancelToken;
use super::entry::{EntryMetadata, SkipReason, SkippedItem, WalkEntry, WalkEvent};
use super::options::ScanOptions;
use super::projects::{self, StaleProject};

/// Decides whether an entry is an atomic unit that should be sized as a
/// whole rather than descended into.
pub type PruneFn = Arc<dyn Fn(&Path, &EntryMetadata) -> bool + Send + Sync>;

/// A starting point for a walk.
#[derive(Debug, Clone)]
pub struct WalkRoot {
    pub path: PathBuf,
    /// Emit the root itself as an entry (depth 0)
    pub include_root: bool,
    /// Deepest depth at which entries are emitted
    pub max_depth: usize,
    /// Treat every emitted entry as a unit regardless of the prune callback
    pub prune_all: bool,
}

impl WalkRoot {
    /// Full recursive walk below `path`, not reporting `path` itself.
    pub fn deep(path: impl Into<PathBuf>, max_depth: usize) -> Self {
        Self {
            path: path.into(),
            include_root: false,
            max_depth,
            prune_all: false,
        }
    }

    /// `path` as a single unit.
    pub fn whole(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            include_root: true,
            max_depth: 0,
            prune_all: true,
        }
    }

    /// Each direct child of `path` as a unit.
    pub fn children(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            include_root: false,
            max_depth: 1,
            prune_all: true,
        }
    }
}

struct WorkItem {
    path: PathBuf,
    depth: usize,
    root: usize,
    dev: u64,
    /// Set when the path is a unit to size and report instead of a directory to list
    unit: Option<EntryMetadata>,
}

/// Shared state handed to every worker.
struct WalkContext {
    options: ScanOptions,
    roots: Vec<WalkRoot>,
    accumulator: Arc<SizeAccumulator>,
    prune: PruneFn,
    cancel: CancelToken,
    /// (device, inode) of visited directories, only tracked when following symlinks
    visited: Mutex<HashSet<(u64, u64)>>,
    in_flight: AtomicUsize,
    now: SystemTime,
}

/// Parallel walker over one or more roots.
pub struct DirectoryWalker {
    options: ScanOptions,
    accumulator: Arc<SizeAccumulator>,
    prune: PruneFn,
    cancel: CancelToken,
}

impl DirectoryWalker {
    pub fn new(options: ScanOptions, accumulator: Arc<SizeAccumulator>, cancel: CancelToken) -> Self {
        Self {
            options,
            accumulator,
            prune: Arc::new(|_, _| false),
            cancel,
        }
    }

    /// Set the unit predicate.
    pub fn with_prune<F>(mut self, prune: F) -> Self
    where
        F: Fn(&Path, &EntryMetadata) -> bool + Send + Sync + 'static,
    {
        self.prune = Arc::new(prune);
        self
    }

    /// Start walking `roots` in background threads.
    ///
    /// The returned receiver yields events until every root is exhausted or
    /// the walk is cancelled, then disconnects. Roots that do not exist are
    /// ignored; callers validate user-supplied roots up front.
    pub fn walk(&self, roots: &[WalkRoot]) -> Result<Receiver<WalkEvent>> {
        let (work_tx, work_rx) = channel::unbounded::<WorkItem>();
        let (result_tx, result_rx) = channel::unbounded::<WalkEvent>();

        let ctx = Arc::new(WalkContext {
            options: self.options.clone(),
            roots: roots.to_vec(),
            accumulator: Arc::clone(&self.accumulator),
            prune: Arc::clone(&self.prune),
            cancel: self.cancel.clone(),
            visited: Mutex::new(HashSet::new()),
            in_flight: AtomicUsize::new(0),
            now: SystemTime::now(),
        });

        for (index, root) in roots.iter().enumerate() {
            seed_root(&ctx, index, root, &work_tx, &result_tx);
        }

        for i in 0..self.options.worker_count() {
            let work_rx = work_rx.clone();
            let work_tx = work_tx.clone();
            let result_tx = result_tx.clone();
            let ctx = Arc::clone(&ctx);

            thread::Builder::new()
                .name(format!("walker-{i}"))
                .spawn(move || worker_loop(&ctx, &work_rx, &work_tx, &result_tx))
                .map_err(EngineError::Spawn)?;
        }

        Ok(result_rx)
    }
}

fn seed_root(
    ctx: &WalkContext,
    index: usize,
    root: &WalkRoot,
    work_tx: &Sender<WorkItem>,
    result_tx: &Sender<WalkEvent>,
) {
    let meta = match stat(&root.path, ctx.options.follow_symlinks) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %root.path.display(), "walk root does not exist");
            return;
        }
        Err(err) => {
            let _ = result_tx.send(WalkEvent::Skipped(SkippedItem::from_io(&root.path, &err)));
            return;
        }
    };
    let entry_meta = EntryMetadata::from_fs(&meta);

    if ctx.options.follow_symlinks && entry_meta.is_dir() {
        ctx.visited.lock().insert((entry_meta.device_id, entry_meta.inode));
    }

    if root.include_root {
        if !entry_meta.is_dir() {
            let _ = result_tx.send(WalkEvent::Entry(WalkEntry {
                path: root.path.clone(),
                subtree: Some(DirSize::of_file(&entry_meta)),
                metadata: entry_meta,
                depth: 0,
            }));
            return;
        }
        if root.prune_all || (ctx.prune)(&root.path, &entry_meta) {
            // sized by a worker so large units do not serialize the seeding
            queue(ctx, work_tx, WorkItem {
                path: root.path.clone(),
                depth: 0,
                root: index,
                dev: entry_meta.device_id,
                unit: Some(entry_meta),
            });
            return;
        }
        let _ = result_tx.send(WalkEvent::Entry(WalkEntry {
            path: root.path.clone(),
            metadata: entry_meta.clone(),
            depth: 0,
            subtree: None,
        }));
    }

    if !entry_meta.is_dir() || root.max_depth == 0 {
        return;
    }

    queue(ctx, work_tx, WorkItem {
        path: root.path.clone(),
        depth: 0,
        root: index,
        dev: entry_meta.device_id,
        unit: None,
    });
}

fn queue(ctx: &WalkContext, work_tx: &Sender<WorkItem>, item: WorkItem) {
    ctx.in_flight.fetch_add(1, Ordering::AcqRel);
    if work_tx.send(item).is_err() {
        ctx.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

fn worker_loop(
    ctx: &WalkContext,
    work_rx: &Receiver<WorkItem>,
    work_tx: &Sender<WorkItem>,
    result_tx: &Sender<WalkEvent>,
) {
    loop {
        match work_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(mut item) => {
                if !ctx.cancel.is_cancelled() {
                    match item.unit.take() {
                        Some(meta) => size_unit(ctx, item, meta, result_tx),
                        None => process_directory(ctx, &item, work_tx, result_tx),
                    }
                }
                ctx.in_flight.fetch_sub(1, Ordering::AcqRel);
            }
            Err(RecvTimeoutError::Timeout) => {
                if ctx.in_flight.load(Ordering::Acquire) == 0 {
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Read one directory, emit its children and queue subdirectories.
fn process_directory(
    ctx: &WalkContext,
    item: &WorkItem,
    work_tx: &Sender<WorkItem>,
    result_tx: &Sender<WalkEvent>,
) {
    let root = &ctx.roots[item.root];
    let child_depth = item.depth + 1;

    let entries = match fs::read_dir(&item.path) {
        Ok(entries) => entries,
        Err(err) => {
            let skipped = SkippedItem::from_io(&item.path, &err);
            tracing::debug!(path = %item.path.display(), reason = ?skipped.reason, "cannot read directory");
            let _ = result_tx.send(WalkEvent::Skipped(skipped));
            return;
        }
    };
    let mut listing: Vec<fs::DirEntry> = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => listing.push(entry),
            Err(err) => {
                tracing::debug!(path = %item.path.display(), error = %err, "directory entry unreadable");
                let _ = result_tx.send(WalkEvent::Skipped(
                    SkippedItem::from_io(&item.path, &err).with_detail(err.to_string()),
                ));
            }
        }
    }

    if ctx.options.detect_projects && !root.prune_all {
        let names: Vec<String> = listing
            .iter()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        if let Some(project) = stale_project(ctx, &item.path, &names) {
            if result_tx.send(WalkEvent::Project(project)).is_err() {
                return;
            }
        }
    }

    let mut pending = Vec::new();

    for entry in listing {
        if ctx.cancel.is_cancelled() {
            return;
        }

        let path = entry.path();

        if !ctx.options.include_hidden && entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if ScanOptions::is_linux_virtual_fs(&path) {
            continue;
        }

        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(err) => {
                let _ = result_tx.send(WalkEvent::Skipped(SkippedItem::from_io(&path, &err)));
                continue;
            }
        };
        if file_type.is_symlink() && !ctx.options.follow_symlinks {
            continue;
        }

        let started = Instant::now();
        let stat_result = if file_type.is_symlink() {
            fs::metadata(&path)
        } else {
            entry.metadata()
        };
        let elapsed = started.elapsed();

        let meta = match stat_result {
            Ok(meta) => EntryMetadata::from_fs(&meta),
            Err(err) => {
                let _ = result_tx.send(WalkEvent::Skipped(SkippedItem::from_io(&path, &err)));
                continue;
            }
        };

        if elapsed > ctx.options.stat_timeout {
            tracing::warn!(path = %path.display(), elapsed_ms = elapsed.as_millis() as u64, "slow stat, skipping");
            let skipped = SkippedItem::new(&path, SkipReason::SlowFilesystem)
                .with_detail(format!("stat took {} ms", elapsed.as_millis()));
            let _ = result_tx.send(WalkEvent::Skipped(skipped));
            continue;
        }

        if meta.is_dir() {
            if ctx.options.one_file_system && meta.device_id != item.dev {
                tracing::debug!(path = %path.display(), "not crossing filesystem boundary");
                continue;
            }
            if ctx.options.follow_symlinks
                && !ctx.visited.lock().insert((meta.device_id, meta.inode))
            {
                let _ = result_tx.send(WalkEvent::Skipped(SkippedItem::new(
                    &path,
                    SkipReason::SymlinkCycle,
                )));
                continue;
            }
        }

        let pruned = root.prune_all || (ctx.prune)(&path, &meta);
        let event = if pruned && meta.is_dir() {
            pending.push(WorkItem {
                path,
                depth: child_depth,
                root: item.root,
                dev: meta.device_id,
                unit: Some(meta),
            });
            continue;
        } else if pruned {
            WalkEvent::Entry(WalkEntry {
                path,
                subtree: Some(DirSize::of_file(&meta)),
                metadata: meta,
                depth: child_depth,
            })
        } else {
            if meta.is_dir() {
                if child_depth < root.max_depth {
                    pending.push(WorkItem {
                        path: path.clone(),
                        depth: child_depth,
                        root: item.root,
                        dev: meta.device_id,
                        unit: None,
                    });
                } else {
                    let _ = result_tx.send(WalkEvent::Skipped(SkippedItem::new(
                        &path,
                        SkipReason::DepthLimit,
                    )));
                }
            }
            WalkEvent::Entry(WalkEntry {
                path,
                metadata: meta,
                depth: child_depth,
                subtree: None,
            })
        };

        if result_tx.send(event).is_err() {
            // consumer went away
            return;
        }
    }

    for child in pending {
        queue(ctx, work_tx, child);
    }
}

/// Size a unit directory and report it.
fn size_unit(ctx: &WalkContext, item: WorkItem, meta: EntryMetadata, result_tx: &Sender<WalkEvent>) {
    let subtree = ctx.accumulator.size_of(&item.path);
    if ctx.cancel.is_cancelled() {
        return;
    }
    let _ = result_tx.send(WalkEvent::Entry(WalkEntry {
        path: item.path,
        metadata: meta,
        depth: item.depth,
        subtree: Some(subtree),
    }));
}

fn stale_project(ctx: &WalkContext, dir: &Path, names: &[String]) -> Option<StaleProject> {
    let detected = projects::detect(dir, names)?;

    let marker_mtime = fs::metadata(&detected.marker).and_then(|m| m.modified()).ok();
    let dir_mtime = fs::metadata(dir).and_then(|m| m.modified()).ok();
    let last_modified = marker_mtime.max(dir_mtime);

    let days = projects::stale_age(last_modified, ctx.now, ctx.options.stale_after)?;

    let artifact_bytes = detected
        .artifact_paths
        .iter()
        .map(|p| ctx.accumulator.size_of(p).bytes)
        .sum();

    tracing::debug!(path = %dir.display(), kind = detected.kind.id, days, "stale project");

    Some(StaleProject {
        path: detected.path,
        project_type: detected.kind.id.to_string(),
        display_name: detected.kind.display_name.to_string(),
        artifact_paths: detected.artifact_paths,
        artifact_bytes,
        days_since_modified: days,
    })
}

fn stat(path: &Path, follow: bool) -> io::Result<fs::Metadata> {
    if follow {
        fs::metadata(path)
    } else {
        fs::symlink_metadata(path)
    }
}
