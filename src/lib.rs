//! Reclaimer - a disk space reclamation engine
//!
//! This crate provides functionality for:
//! - Finding reclaimable space (caches, logs, stale build output) in two passes
//! - Classifying paths by category and deletion risk
//! - Streaming scan progress as versioned JSON events
//! - Reconciling found items against OS disk usage
//! - Deleting approved items behind an inventory allow-list

pub mod classifier;
pub mod cleaner;
pub mod cli;
pub mod commands;
pub mod config;
pub mod disk;
pub mod engine;
pub mod error;
pub mod scanner;
pub mod signals;

// Re-export commonly used types
pub use config::Config;
pub use engine::{ScanEngine, ScanEvent, ScanRequest};
pub use error::{EngineError, Result};
