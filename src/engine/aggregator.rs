//! Two-pass scan orchestration.
//!
//! The aggregator is the only owner of the in-progress item list and the
//! progress counters. Walker workers feed it through a channel; it
//! classifies, deduplicates, throttles progress and emits events in order.

use std::collections::{HashMap, HashSet};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;

use crate::classifier::{Category, Classification, PathClassifier};
use crate::config::Config;
use crate::disk::{self, DiskStats};
use crate::error::{EngineError, Result};
use crate::scanner::projects::days_between;
use crate::scanner::{
    format_size, CancelToken, DirSize, DirectoryWalker, DiskMapBuilder, EntryMetadata,
    ScanOptions, SizeAccumulator, SkipReason, SkippedItem, StaleProject, WalkEntry, WalkEvent,
    WalkRoot,
};

use super::events::{
    CategorySummary, EventEmitter, ItemRecord, Metrics, Phase, ScanEvent, ScanProgress,
    ScanReport, Warning, UNKNOWN_DAYS_SINCE_USED,
};
use super::inventory::category_tree;
use super::locations::{self, Fallback, FastLocation};
use super::recommend::recommend;
use super::reconcile::reconcile;
use super::state::ScanState;

/// How often the aggregator wakes up to check cancellation and progress
/// while the walker is quiet.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Reads disk capacity for the scan root.
pub type DiskProbe = fn(&Path) -> Result<DiskStats>;

/// Parameters of one scan.
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    /// Scan root; the configured default when absent
    pub root: Option<PathBuf>,
    /// Skip the fast pass over well-known locations
    pub skip_fast_pass: bool,
}

impl ScanRequest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            skip_fast_pass: false,
        }
    }
}

#[derive(Debug, Clone)]
struct Settings {
    progress_every_files: u64,
    progress_interval: Duration,
    batch_size: usize,
    disk_map_depth: usize,
}

/// How a scan ended.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Complete(Box<ScanReport>),
    Cancelled {
        phase: Phase,
        items_found: usize,
        elapsed: f64,
    },
    Failed(String),
}

impl ScanOutcome {
    pub fn state(&self) -> ScanState {
        match self {
            ScanOutcome::Complete(_) => ScanState::Complete,
            ScanOutcome::Cancelled { .. } => ScanState::Cancelled,
            ScanOutcome::Failed(_) => ScanState::Failed,
        }
    }

    /// The terminal event announcing this outcome.
    pub fn into_event(self) -> ScanEvent {
        match self {
            ScanOutcome::Complete(report) => ScanEvent::Complete(report),
            ScanOutcome::Cancelled {
                phase,
                items_found,
                elapsed,
            } => ScanEvent::Cancelled {
                phase,
                items_found,
                elapsed,
            },
            ScanOutcome::Failed(message) => ScanEvent::Error { message },
        }
    }
}

/// Drives the fast pass, then the deep pass, for one scan.
pub struct ScanOrchestrator {
    root: PathBuf,
    fast_pass: bool,
    options: ScanOptions,
    settings: Settings,
    locations: Vec<FastLocation>,
    classifier: Arc<PathClassifier>,
    cancel: CancelToken,
    state: Arc<Mutex<ScanState>>,
    disk_probe: DiskProbe,
}

impl ScanOrchestrator {
    pub fn new(
        config: &Config,
        classifier: Arc<PathClassifier>,
        request: ScanRequest,
        cancel: CancelToken,
        state: Arc<Mutex<ScanState>>,
    ) -> Self {
        let root = request
            .root
            .unwrap_or_else(|| config.scanner.resolve_root());

        Self {
            root,
            fast_pass: !request.skip_fast_pass,
            options: ScanOptions::from_config(&config.scanner, config.classifier.stale_project_days),
            settings: Settings {
                progress_every_files: config.scanner.progress_every_files.max(1),
                progress_interval: Duration::from_millis(config.scanner.progress_interval_ms),
                batch_size: config.scanner.batch_size.max(1),
                disk_map_depth: config.scanner.disk_map_depth,
            },
            locations: locations::resolve(&config.locations),
            classifier,
            cancel,
            state,
            disk_probe: disk::disk_stats,
        }
    }

    /// Replace the disk capacity source.
    pub fn with_disk_probe(mut self, probe: DiskProbe) -> Self {
        self.disk_probe = probe;
        self
    }

    pub fn first_phase(&self) -> Phase {
        if self.fast_pass {
            Phase::Fast
        } else {
            Phase::Deep
        }
    }

    /// Run the scan, emitting every non-terminal event. The caller emits
    /// the terminal event from the returned outcome once it has recorded it.
    pub fn run(&self, emitter: &mut EventEmitter) -> ScanOutcome {
        let started = Instant::now();

        emitter.emit(ScanEvent::Start {
            root: self.root.clone(),
            fast_pass: self.fast_pass,
            started_at: Utc::now().to_rfc3339(),
        });

        let root = match validate_root(&self.root) {
            Ok(root) => root,
            Err(err) => {
                tracing::error!(root = %self.root.display(), error = %err, "scan root rejected");
                return ScanOutcome::Failed(err.to_string());
            }
        };
        let disk = match (self.disk_probe)(&root) {
            Ok(disk) => disk,
            Err(err) => {
                tracing::error!(error = %err, "cannot read disk statistics");
                return ScanOutcome::Failed(err.to_string());
            }
        };

        let accumulator = Arc::new(SizeAccumulator::new(self.cancel.clone()));
        let mut agg = Aggregator::new(self, emitter, &root, disk, started);

        if self.fast_pass {
            self.enter(ScanState::Scanning(Phase::Fast));
            let in_scope = locations::within_root(&self.locations, &root);
            tracing::info!(locations = in_scope.len(), "fast pass started");
            let finished = self.fast_pass(&mut agg, &accumulator, &in_scope);
            agg.fast_seconds = started.elapsed().as_secs_f64();
            if !finished {
                return agg.cancelled();
            }
            agg.flush_items();
            agg.emit_progress();
        }

        self.enter(ScanState::Scanning(Phase::Deep));
        agg.phase = Phase::Deep;
        agg.emitter.emit(ScanEvent::Phase { phase: Phase::Deep });
        tracing::info!(root = %root.display(), "deep pass started");

        let deep_started = Instant::now();
        let finished = self.deep_pass(&mut agg, &accumulator, &root);
        agg.deep_seconds = deep_started.elapsed().as_secs_f64();
        if !finished {
            return agg.cancelled();
        }
        agg.flush_items();
        agg.emit_progress();

        tracing::debug!(cached_subtrees = accumulator.cached_len(), "deep pass finished");
        ScanOutcome::Complete(Box::new(agg.into_report(self.options.worker_count())))
    }

    fn enter(&self, next: ScanState) {
        let mut state = self.state.lock();
        let current = *state;
        if !current.can_transition_to(next) && current != next {
            tracing::debug!(from = %current, to = %next, "unexpected state transition");
        }
        *state = next;
    }

    fn fast_pass(
        &self,
        agg: &mut Aggregator<'_>,
        accumulator: &Arc<SizeAccumulator>,
        in_scope: &[FastLocation],
    ) -> bool {
        let roots: Vec<WalkRoot> = locations::outermost(in_scope)
            .iter()
            .map(FastLocation::walk_root)
            .collect();
        // nested locations are walked as part of the outer one but keep their fallback
        let fallbacks: HashMap<PathBuf, Fallback> = in_scope
            .iter()
            .filter_map(|l| Some((l.path.clone(), l.fallback?)))
            .collect();

        let walker = DirectoryWalker::new(self.options.clone(), Arc::clone(accumulator), self.cancel.clone());
        let rx = match walker.walk(&roots) {
            Ok(rx) => rx,
            Err(err) => {
                let root = agg.root.clone();
                agg.record_skip(SkippedItem::new(root, SkipReason::Unreadable).with_detail(err.to_string()));
                return !self.cancel.is_cancelled();
            }
        };

        self.drain(agg, &rx, |agg, event| match event {
            WalkEvent::Entry(entry) => {
                let parent = if entry.depth == 1 { entry.path.parent() } else { None };
                let fallback = fallbacks
                    .get(&entry.path)
                    .or_else(|| parent.and_then(|p| fallbacks.get(p)))
                    .copied();
                agg.fast_entry(entry, fallback);
            }
            WalkEvent::Skipped(skipped) => agg.record_skip(skipped),
            WalkEvent::Project(_) => {}
        })
    }

    fn deep_pass(&self, agg: &mut Aggregator<'_>, accumulator: &Arc<SizeAccumulator>, root: &Path) -> bool {
        let known: Arc<HashSet<PathBuf>> = Arc::new(agg.seen.clone());
        let ancestors: Arc<HashSet<PathBuf>> = Arc::new(
            known
                .iter()
                .flat_map(|p| p.ancestors().skip(1).map(Path::to_path_buf))
                .collect(),
        );

        let classifier = Arc::clone(&self.classifier);
        let walker = DirectoryWalker::new(self.options.clone(), Arc::clone(accumulator), self.cancel.clone())
            .with_prune(move |path, meta| {
                if path.ancestors().any(|a| known.contains(a)) {
                    return true;
                }
                // descending keeps already-found items from being nested in a new one
                if ancestors.contains(path) {
                    return false;
                }
                classifier.classify(path, meta).is_some()
            });

        let rx = match walker.walk(&[WalkRoot::deep(root, self.options.max_depth)]) {
            Ok(rx) => rx,
            Err(err) => {
                agg.record_skip(SkippedItem::new(root, SkipReason::Unreadable).with_detail(err.to_string()));
                return !self.cancel.is_cancelled();
            }
        };

        self.drain(agg, &rx, |agg, event| match event {
            WalkEvent::Entry(entry) => agg.deep_entry(entry),
            WalkEvent::Skipped(skipped) => agg.record_skip(skipped),
            WalkEvent::Project(project) => agg.record_project(project),
        })
    }

    /// Feed walker events to `handle` until the walk ends. Returns false if
    /// the scan was cancelled.
    fn drain<F>(&self, agg: &mut Aggregator<'_>, rx: &Receiver<WalkEvent>, mut handle: F) -> bool
    where
        F: FnMut(&mut Aggregator<'_>, WalkEvent),
    {
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(event) => {
                    handle(agg, event);
                    agg.maybe_progress();
                }
                Err(RecvTimeoutError::Timeout) => agg.maybe_progress(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        !self.cancel.is_cancelled()
    }
}

fn validate_root(root: &Path) -> Result<PathBuf> {
    let canonical = root.canonicalize().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => EngineError::PathNotFound(root.to_path_buf()),
        _ => EngineError::io(root, e),
    })?;
    if !canonical.is_dir() {
        return Err(EngineError::NotADirectory(canonical));
    }
    Ok(canonical)
}

/// Whether `root` is the top of its filesystem.
fn is_mount_root(root: &Path) -> bool {
    let Some(parent) = root.parent() else {
        return true;
    };
    match (std::fs::metadata(root), std::fs::metadata(parent)) {
        (Ok(a), Ok(b)) => a.dev() != b.dev(),
        _ => false,
    }
}

/// Per-scan mutable state, owned by the aggregating thread.
struct Aggregator<'a> {
    emitter: &'a mut EventEmitter,
    classifier: Arc<PathClassifier>,
    settings: Settings,
    root: PathBuf,
    disk: DiskStats,
    root_is_mount: bool,
    started: Instant,
    now: SystemTime,
    phase: Phase,

    items: Vec<ItemRecord>,
    seen: HashSet<PathBuf>,
    pending: Vec<ItemRecord>,
    skipped: Vec<SkippedItem>,
    skipped_seen: HashSet<(PathBuf, SkipReason)>,
    stale_projects: Vec<StaleProject>,
    disk_map: DiskMapBuilder,

    files_processed: u64,
    dirs_processed: u64,
    bytes_scanned: u64,
    error_count: u64,
    last_error: Option<String>,
    current_path: Option<PathBuf>,
    files_at_last_progress: u64,
    last_progress: Instant,
    fast_seconds: f64,
    deep_seconds: f64,
}

impl<'a> Aggregator<'a> {
    fn new(
        orchestrator: &ScanOrchestrator,
        emitter: &'a mut EventEmitter,
        root: &Path,
        disk: DiskStats,
        started: Instant,
    ) -> Self {
        Self {
            emitter,
            classifier: Arc::clone(&orchestrator.classifier),
            settings: orchestrator.settings.clone(),
            root: root.to_path_buf(),
            disk,
            root_is_mount: is_mount_root(root),
            started,
            now: SystemTime::now(),
            phase: orchestrator.first_phase(),
            items: Vec::new(),
            seen: HashSet::new(),
            pending: Vec::new(),
            skipped: Vec::new(),
            skipped_seen: HashSet::new(),
            stale_projects: Vec::new(),
            disk_map: DiskMapBuilder::new(root, orchestrator.settings.disk_map_depth),
            files_processed: 0,
            dirs_processed: 0,
            bytes_scanned: 0,
            error_count: 0,
            last_error: None,
            current_path: None,
            files_at_last_progress: 0,
            last_progress: started,
            fast_seconds: 0.0,
            deep_seconds: 0.0,
        }
    }

    fn fast_entry(&mut self, entry: WalkEntry, fallback: Option<Fallback>) {
        let Some(subtree) = entry.subtree else {
            return;
        };
        self.count_unit(&entry.path, &subtree);
        let classification = self
            .classifier
            .classify(&entry.path, &entry.metadata)
            .or_else(|| fallback.map(|f| f.classify(&entry.path)));
        if let Some(classification) = classification {
            self.add_item(entry.path, &entry.metadata, &subtree, classification);
        }
    }

    fn deep_entry(&mut self, entry: WalkEntry) {
        match entry.subtree {
            Some(subtree) => {
                self.disk_map.add(&entry.path, subtree.bytes, entry.metadata.is_dir());
                if self.is_covered(&entry.path) {
                    // inside a fast-pass item, already counted
                    return;
                }
                self.count_unit(&entry.path, &subtree);
                if let Some(classification) = self.classifier.classify(&entry.path, &entry.metadata) {
                    self.add_item(entry.path, &entry.metadata, &subtree, classification);
                }
            }
            None if entry.metadata.is_dir() => {
                self.dirs_processed += 1;
                self.current_path = Some(entry.path);
            }
            None => {
                self.files_processed += 1;
                self.bytes_scanned = self.bytes_scanned.saturating_add(entry.metadata.size);
                self.disk_map.add(&entry.path, entry.metadata.size, false);
            }
        }
    }

    /// Whether `path` is an item or lies inside one.
    fn is_covered(&self, path: &Path) -> bool {
        path.ancestors().any(|a| self.seen.contains(a))
    }

    fn count_unit(&mut self, path: &Path, subtree: &DirSize) {
        self.files_processed += subtree.file_count;
        self.bytes_scanned = self.bytes_scanned.saturating_add(subtree.bytes);
        self.current_path = Some(path.to_path_buf());
        for skipped in &subtree.skipped {
            self.record_skip(skipped.clone());
        }
    }

    fn add_item(&mut self, path: PathBuf, meta: &EntryMetadata, subtree: &DirSize, c: Classification) {
        if subtree.bytes == 0 {
            tracing::debug!(path = %path.display(), "empty, not an item");
            return;
        }
        if self.is_covered(&path) {
            return;
        }
        self.seen.insert(path.clone());

        let last_used = subtree.last_used.or_else(|| meta.last_used());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let item = ItemRecord {
            id: format!("item-{}", self.items.len() + 1),
            name,
            path,
            category: c.category,
            description: c.description,
            size_bytes: subtree.bytes,
            size_formatted: format_size(subtree.bytes),
            file_count: subtree.file_count,
            last_used: last_used.map(|t| DateTime::<Utc>::from(t).to_rfc3339()),
            days_since_used: last_used
                .and_then(|t| days_between(t, self.now))
                .unwrap_or(UNKNOWN_DAYS_SINCE_USED),
            risk: c.risk,
            confidence: c.confidence,
            recovery_note: c.recovery_note,
            incomplete: subtree.incomplete,
            phase: self.phase,
        };
        tracing::debug!(path = %item.path.display(), category = %item.category, bytes = item.size_bytes, "item");

        self.items.push(item.clone());
        self.pending.push(item);
        if self.pending.len() >= self.settings.batch_size {
            self.flush_items();
        }
    }

    fn record_skip(&mut self, skipped: SkippedItem) {
        if !self.skipped_seen.insert((skipped.path.clone(), skipped.reason)) {
            return;
        }
        if skipped.reason.is_error() {
            self.error_count += 1;
            self.last_error = Some(format!("{}: {}", skipped.path.display(), skipped.reason.as_str()));
            tracing::warn!(path = %skipped.path.display(), reason = skipped.reason.as_str(), "skipped");
        } else {
            tracing::debug!(path = %skipped.path.display(), reason = skipped.reason.as_str(), "skipped");
        }
        self.emitter.emit(ScanEvent::Warning(Warning::from(&skipped)));
        self.skipped.push(skipped);
    }

    fn record_project(&mut self, project: StaleProject) {
        if self.stale_projects.iter().any(|p| p.path == project.path) {
            return;
        }
        self.stale_projects.push(project);
    }

    fn flush_items(&mut self) {
        match self.pending.len() {
            0 => {}
            1 => {
                let item = self.pending.remove(0);
                self.emitter.emit(ScanEvent::Item(item));
            }
            _ => {
                let items = std::mem::take(&mut self.pending);
                self.emitter.emit(ScanEvent::Batch { items });
            }
        }
    }

    fn maybe_progress(&mut self) {
        let files_due =
            self.files_processed - self.files_at_last_progress >= self.settings.progress_every_files;
        let time_due = self.last_progress.elapsed() >= self.settings.progress_interval;
        if files_due || time_due {
            self.flush_items();
            self.emit_progress();
        }
    }

    fn emit_progress(&mut self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let bytes_per_sec = if elapsed > 0.0 {
            self.bytes_scanned as f64 / elapsed
        } else {
            0.0
        };

        let eta_seconds = (self.phase == Phase::Deep && self.root_is_mount && bytes_per_sec > 0.0)
            .then(|| self.disk.used.saturating_sub(self.bytes_scanned) as f64 / bytes_per_sec);

        self.emitter.emit(ScanEvent::Progress(ScanProgress {
            phase: self.phase,
            current_path: self.current_path.clone(),
            files_processed: self.files_processed,
            bytes_scanned: self.bytes_scanned,
            scan_rate_mbps: bytes_per_sec / (1024.0 * 1024.0),
            elapsed,
            eta_seconds,
            error_count: self.error_count,
            last_error: self.last_error.clone(),
        }));

        self.files_at_last_progress = self.files_processed;
        self.last_progress = Instant::now();
    }

    fn cancelled(self) -> ScanOutcome {
        tracing::info!(phase = self.phase.as_str(), items = self.items.len(), "scan cancelled");
        ScanOutcome::Cancelled {
            phase: self.phase,
            items_found: self.items.len(),
            elapsed: self.started.elapsed().as_secs_f64(),
        }
    }

    fn into_report(self, walker_threads: usize) -> ScanReport {
        let categories: Vec<CategorySummary> = Category::ALL
            .iter()
            .filter_map(|category| {
                let (size_bytes, item_count) = self
                    .items
                    .iter()
                    .filter(|i| i.category == *category)
                    .fold((0u64, 0usize), |(b, n), i| (b + i.size_bytes, n + 1));
                (item_count > 0).then_some(CategorySummary {
                    category: *category,
                    size_bytes,
                    item_count,
                })
            })
            .collect();

        let reconciliation = reconcile(&self.items, &self.skipped, &self.disk);
        let recommendations = recommend(&self.items, &self.stale_projects, &reconciliation);

        let reclaimable_bytes = self.items.iter().map(|i| i.size_bytes).sum();
        let safe_reclaimable_bytes = self
            .items
            .iter()
            .filter(|i| i.risk == crate::classifier::RiskLevel::Safe)
            .map(|i| i.size_bytes)
            .sum();

        let metrics = Metrics {
            files_processed: self.files_processed,
            dirs_processed: self.dirs_processed,
            bytes_scanned: self.bytes_scanned,
            items_found: self.items.len(),
            reclaimable_bytes,
            safe_reclaimable_bytes,
            fast_pass_seconds: self.fast_seconds,
            deep_pass_seconds: self.deep_seconds,
            total_seconds: self.started.elapsed().as_secs_f64(),
            error_count: self.error_count,
            skipped_count: self.skipped.len(),
            walker_threads,
        };

        tracing::info!(
            items = metrics.items_found,
            reclaimable = %format_size(reclaimable_bytes),
            errors = metrics.error_count,
            seconds = metrics.total_seconds,
            "scan complete"
        );

        let mut stale_projects = self.stale_projects;
        stale_projects.sort_by(|a, b| b.artifact_bytes.cmp(&a.artifact_bytes));

        ScanReport {
            full_tree: category_tree(&self.items),
            disk_map: self.disk_map.build(),
            root: self.root,
            disk_total: self.disk.total,
            disk_used: self.disk.used,
            disk_free: self.disk.free,
            categories,
            metrics,
            recommendations,
            stale_projects,
            skipped_items: self.skipped,
            reconciliation,
            items: self.items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixed_disk(_: &Path) -> Result<DiskStats> {
        Ok(DiskStats {
            total: 100 << 20,
            used: 50 << 20,
            free: 50 << 20,
            available: 50 << 20,
        })
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.locations.use_platform_defaults = false;
        config.scanner.threads = 2;
        config
    }

    fn run(config: &Config, request: ScanRequest) -> Vec<ScanEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut emitter = EventEmitter::new("scan-test", move |e| {
            let _ = tx.send(e.event);
        });
        let orchestrator = ScanOrchestrator::new(
            config,
            Arc::new(config.classifier().unwrap()),
            request,
            CancelToken::new(),
            Arc::new(Mutex::new(ScanState::Idle)),
        )
        .with_disk_probe(fixed_disk);
        let outcome = orchestrator.run(&mut emitter);
        emitter.emit(outcome.into_event());
        drop(emitter);
        rx.iter().collect()
    }

    fn report(events: &[ScanEvent]) -> &ScanReport {
        match events.last() {
            Some(ScanEvent::Complete(report)) => report,
            other => panic!("expected complete, got {other:?}"),
        }
    }

    #[test]
    fn missing_root_fails_after_start() {
        let events = run(&config(), ScanRequest::new("/definitely/not/here"));
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ScanEvent::Start { .. }));
        assert!(matches!(&events[1], ScanEvent::Error { message } if message.contains("not found")));
    }

    #[test]
    fn file_root_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("f");
        fs::write(&file, "x").unwrap();
        let events = run(&config(), ScanRequest::new(&file));
        assert!(matches!(events.last(), Some(ScanEvent::Error { .. })));
    }

    #[test]
    fn empty_root_completes_with_no_items() {
        let tmp = TempDir::new().unwrap();
        let events = run(&config(), ScanRequest::new(tmp.path()));
        let report = report(&events);
        assert!(report.items.is_empty());
        assert_eq!(report.full_tree.size_bytes, 0);
        assert_eq!(report.reconciliation.unmapped_bytes, 50 << 20);
    }

    #[test]
    fn deep_pass_finds_and_prunes_items() {
        let tmp = TempDir::new().unwrap();
        let npm = tmp.path().join(".npm/_cacache");
        fs::create_dir_all(&npm).unwrap();
        fs::write(npm.join("blob"), vec![0u8; 4096]).unwrap();
        fs::write(tmp.path().join("notes.txt"), vec![0u8; 10]).unwrap();

        let events = run(&config(), ScanRequest::new(tmp.path()));
        let report = report(&events);

        assert_eq!(report.items.len(), 1);
        let item = &report.items[0];
        assert_eq!(item.category, Category::DevCache);
        assert_eq!(item.size_bytes, 4096);
        assert_eq!(item.phase, Phase::Deep);
        assert!(item.days_since_used < UNKNOWN_DAYS_SINCE_USED);

        // the pruned subtree still counts towards the disk map
        assert_eq!(report.disk_map.size_bytes, 4106);
        assert!(report.disk_map.is_consistent());
        assert_eq!(report.metrics.files_processed, 2);
    }

    #[test]
    fn fast_pass_items_are_not_duplicated() {
        let tmp = TempDir::new().unwrap();
        let chrome = tmp.path().join(".cache/google-chrome/Default");
        fs::create_dir_all(&chrome).unwrap();
        fs::write(chrome.join("data"), vec![0u8; 2048]).unwrap();

        let mut config = config();
        config.locations.fast_pass.push(crate::config::LocationEntry {
            path: tmp.path().join(".cache").to_string_lossy().into_owned(),
            unit: crate::config::LocationUnit::Children,
        });

        let root = tmp.path().canonicalize().unwrap();
        let events = run(&config, ScanRequest::new(&root));
        let report = report(&events);

        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].phase, Phase::Fast);
        assert_eq!(report.items[0].category, Category::BrowserCache);
        assert_eq!(report.disk_map.size_bytes, 2048);

        let phase_idx = events
            .iter()
            .position(|e| matches!(e, ScanEvent::Phase { phase: Phase::Deep }))
            .unwrap();
        let item_idx = events.iter().position(|e| !e.items().is_empty()).unwrap();
        assert!(item_idx < phase_idx);
    }

    #[test]
    fn fallback_classifies_unknown_children_of_listed_location() {
        let tmp = TempDir::new().unwrap();
        let blobs = tmp.path().join("scratch/blobs");
        fs::create_dir_all(&blobs).unwrap();
        fs::write(blobs.join("b"), vec![0u8; 100]).unwrap();

        let mut config = config();
        config.locations.fast_pass.push(crate::config::LocationEntry {
            path: tmp.path().join("scratch").to_string_lossy().into_owned(),
            unit: crate::config::LocationUnit::Children,
        });

        let events = run(&config, ScanRequest::new(tmp.path()));
        let report = report(&events);
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].category, Category::GeneralCache);
        assert_eq!(report.items[0].confidence, 0.4);
    }

    fn listed(path: &Path, unit: crate::config::LocationUnit) -> crate::config::LocationEntry {
        crate::config::LocationEntry {
            path: path.to_string_lossy().into_owned(),
            unit,
        }
    }

    #[test]
    fn location_containing_the_root_does_not_swallow_it() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("scan-me");
        fs::create_dir_all(root.join(".npm")).unwrap();
        fs::write(root.join(".npm/blob"), vec![0u8; 1000]).unwrap();
        fs::create_dir_all(tmp.path().join("outside/.npm")).unwrap();
        fs::write(tmp.path().join("outside/.npm/blob"), vec![0u8; 500]).unwrap();

        let mut config = config();
        config.locations.fast_pass = vec![
            listed(tmp.path(), crate::config::LocationUnit::Children),
            listed(&root, crate::config::LocationUnit::Whole),
            listed(&tmp.path().join("outside/.npm"), crate::config::LocationUnit::Whole),
        ];

        let events = run(&config, ScanRequest::new(&root));
        let report = report(&events);

        assert_eq!(report.items.len(), 1);
        let item = &report.items[0];
        assert_eq!(item.path, root.canonicalize().unwrap().join(".npm"));
        assert_eq!(item.phase, Phase::Deep);
        assert_eq!(report.metrics.reclaimable_bytes, 1000);
    }

    #[test]
    fn nested_locations_report_each_path_once() {
        let tmp = TempDir::new().unwrap();
        let blobs = tmp.path().join(".cache/app/blobs");
        fs::create_dir_all(&blobs).unwrap();
        fs::write(blobs.join("b"), vec![0u8; 300]).unwrap();
        fs::create_dir_all(tmp.path().join(".cache/other")).unwrap();
        fs::write(tmp.path().join(".cache/other/x"), vec![0u8; 200]).unwrap();

        let mut config = config();
        config.locations.fast_pass = vec![
            listed(&tmp.path().join(".cache"), crate::config::LocationUnit::Children),
            listed(&blobs, crate::config::LocationUnit::Whole),
        ];

        let events = run(&config, ScanRequest::new(tmp.path()));
        let report = report(&events);

        let mut paths: Vec<_> = report.items.iter().map(|i| i.path.clone()).collect();
        paths.sort();
        let cache = tmp.path().canonicalize().unwrap().join(".cache");
        assert_eq!(paths, vec![cache.join("app"), cache.join("other")]);
        assert_eq!(report.metrics.reclaimable_bytes, 500);
        assert!(report.full_tree.is_consistent());
    }

    #[test]
    fn batches_respect_batch_size() {
        let tmp = TempDir::new().unwrap();
        for name in ["a", "b", "c"] {
            let dir = tmp.path().join(format!("{name}/.npm"));
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("x"), vec![0u8; 10]).unwrap();
        }
        let mut config = config();
        config.scanner.batch_size = 2;

        let events = run(&config, ScanRequest::new(tmp.path()));
        let streamed: usize = events.iter().map(|e| e.items().len()).sum();
        assert_eq!(streamed, 3);
        assert!(events.iter().all(|e| e.items().len() <= 2));
        assert_eq!(report(&events).items.len(), 3);
    }

    #[test]
    fn cancelled_before_start_emits_no_items() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(".npm")).unwrap();
        fs::write(tmp.path().join(".npm/x"), vec![0u8; 10]).unwrap();

        let config = config();
        let cancel = CancelToken::new();
        cancel.cancel();
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut emitter = EventEmitter::new("scan-c", move |e| {
            let _ = tx.send(e.event);
        });
        let outcome = ScanOrchestrator::new(
            &config,
            Arc::new(PathClassifier::builtin().unwrap()),
            ScanRequest::new(tmp.path()),
            cancel,
            Arc::new(Mutex::new(ScanState::Idle)),
        )
        .with_disk_probe(fixed_disk)
        .run(&mut emitter);

        assert_eq!(outcome.state(), ScanState::Cancelled);
        emitter.emit(outcome.into_event());
        drop(emitter);
        let events: Vec<_> = rx.iter().collect();
        assert!(events.iter().all(|e| e.items().is_empty()));
        assert!(matches!(events.last(), Some(ScanEvent::Cancelled { .. })));
    }
}
