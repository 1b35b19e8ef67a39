//! The scan engine: one scan at a time, streamed as events, with the
//! resulting inventory gating later deletes.

mod aggregator;
pub mod events;
pub mod inventory;
pub mod locations;
pub mod recommend;
pub mod reconcile;
mod state;

pub use aggregator::{DiskProbe, ScanOrchestrator, ScanOutcome, ScanRequest};
pub use events::{
    CategorySummary, EventEmitter, EventEnvelope, ItemRecord, Metrics, Phase, ScanEvent,
    ScanProgress, ScanReport, Warning, SCHEMA_VERSION, UNKNOWN_DAYS_SINCE_USED,
};
pub use inventory::{category_tree, Inventory, ItemQuery, TextMatch};
pub use locations::{FastLocation, Fallback};
pub use recommend::{Recommendation, RecommendationKind};
pub use reconcile::{Reconciliation, SkipBucket};
pub use state::ScanState;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::classifier::PathClassifier;
use crate::cleaner::{DeleteExecutor, DeleteLogEntry, DeleteReport};
use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::scanner::CancelToken;

static SCAN_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_scan_id() -> String {
    let n = SCAN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("scan-{}-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S"), n)
}

/// A running scan.
pub struct ScanHandle {
    scan_id: String,
    events: Receiver<EventEnvelope>,
    cancel: CancelToken,
    thread: Option<JoinHandle<()>>,
}

impl ScanHandle {
    pub fn scan_id(&self) -> &str {
        &self.scan_id
    }

    /// The event stream. It ends after the terminal event.
    pub fn events(&self) -> &Receiver<EventEnvelope> {
        &self.events
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Drain the remaining events and wait for the scan thread.
    pub fn wait(mut self) -> Vec<EventEnvelope> {
        let events: Vec<EventEnvelope> = self.events.iter().collect();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!(scan_id = %self.scan_id, "scan thread panicked");
            }
        }
        events
    }
}

/// Owns configuration, the scan lifecycle and the last inventory.
pub struct ScanEngine {
    config: Arc<Config>,
    classifier: Arc<PathClassifier>,
    state: Arc<Mutex<ScanState>>,
    inventory: Arc<Mutex<Option<Inventory>>>,
    active_cancel: Arc<Mutex<Option<CancelToken>>>,
    /// Set for the duration of a delete; only changed under the state lock
    deleting: AtomicBool,
    disk_probe: Option<DiskProbe>,
}

/// Clears the delete flag when the delete ends, even by panic.
struct DeleteGuard<'a>(&'a AtomicBool);

impl Drop for DeleteGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ScanEngine {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let classifier = config.classifier()?;
        tracing::debug!(rules = classifier.rule_count(), "classifier ready");
        Ok(Self {
            config: Arc::new(config),
            classifier: Arc::new(classifier),
            state: Arc::new(Mutex::new(ScanState::Idle)),
            inventory: Arc::new(Mutex::new(None)),
            active_cancel: Arc::new(Mutex::new(None)),
            deleting: AtomicBool::new(false),
            disk_probe: None,
        })
    }

    /// Replace the disk capacity source used by scans.
    pub fn with_disk_probe(mut self, probe: DiskProbe) -> Self {
        self.disk_probe = Some(probe);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> ScanState {
        *self.state.lock()
    }

    /// Items of the last completed scan, or of a loaded inventory.
    pub fn inventory(&self) -> Option<Inventory> {
        self.inventory.lock().clone()
    }

    pub fn set_inventory(&self, inventory: Inventory) {
        *self.inventory.lock() = Some(inventory);
    }

    /// Start a scan on a background thread. Fails if one is running.
    pub fn start_scan(&self, request: ScanRequest) -> Result<ScanHandle> {
        let cancel = CancelToken::new();
        let mut orchestrator = ScanOrchestrator::new(
            &self.config,
            Arc::clone(&self.classifier),
            request,
            cancel.clone(),
            Arc::clone(&self.state),
        );
        if let Some(probe) = self.disk_probe {
            orchestrator = orchestrator.with_disk_probe(probe);
        }

        {
            let mut state = self.state.lock();
            if state.is_active() {
                return Err(EngineError::ScanInProgress);
            }
            if self.deleting.load(Ordering::Acquire) {
                return Err(EngineError::DeleteInProgress);
            }
            *state = ScanState::Scanning(orchestrator.first_phase());
        }
        *self.active_cancel.lock() = Some(cancel.clone());

        let scan_id = next_scan_id();
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut emitter = EventEmitter::new(scan_id.clone(), move |envelope| {
            // a dropped receiver only means nobody is listening any more
            let _ = tx.send(envelope);
        });

        let state = Arc::clone(&self.state);
        let inventory = Arc::clone(&self.inventory);
        let active_cancel = Arc::clone(&self.active_cancel);
        let id = scan_id.clone();

        let thread = thread::Builder::new()
            .name("scan-aggregator".to_string())
            .spawn(move || {
                let outcome = orchestrator.run(&mut emitter);
                if let ScanOutcome::Complete(report) = &outcome {
                    *inventory.lock() = Some(Inventory::from_report(&id, report));
                }
                *state.lock() = outcome.state();
                active_cancel.lock().take();
                // state is settled before the terminal event goes out
                emitter.emit(outcome.into_event());
            });

        let thread = match thread {
            Ok(thread) => thread,
            Err(err) => {
                *self.state.lock() = ScanState::Failed;
                self.active_cancel.lock().take();
                return Err(EngineError::Spawn(err));
            }
        };

        tracing::info!(scan_id = %scan_id, "scan started");
        Ok(ScanHandle {
            scan_id,
            events: rx,
            cancel,
            thread: Some(thread),
        })
    }

    /// Request cancellation of the running scan. Returns false when idle.
    pub fn cancel_scan(&self) -> bool {
        match self.active_cancel.lock().as_ref() {
            Some(cancel) => {
                cancel.cancel();
                tracing::info!("scan cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Delete inventory items. Refused while a scan is running.
    pub fn delete(&self, paths: &[PathBuf], dry_run: bool) -> Result<DeleteReport> {
        self.delete_with(paths, dry_run, CancelToken::new(), |_| {})
    }

    /// [`delete`](Self::delete) with a cancel token and a per-path callback.
    pub fn delete_with<F>(
        &self,
        paths: &[PathBuf],
        dry_run: bool,
        cancel: CancelToken,
        on_entry: F,
    ) -> Result<DeleteReport>
    where
        F: FnMut(&DeleteLogEntry),
    {
        let _guard = {
            let state = self.state.lock();
            if state.is_active() {
                return Err(EngineError::DeleteDuringScan);
            }
            if self.deleting.swap(true, Ordering::AcqRel) {
                return Err(EngineError::DeleteInProgress);
            }
            DeleteGuard(&self.deleting)
        };
        let inventory = self.inventory().unwrap_or_else(Inventory::empty);
        DeleteExecutor::new(&self.config.delete, &inventory)
            .with_classifier(&self.classifier)
            .dry_run(dry_run)
            .with_cancel(cancel)
            .execute(paths, on_entry)
    }
}
