//! Deletion of previously scanned items.
//!
//! Nothing is removed unless it lies under an allowed root and is covered
//! by an item of the scan inventory.

mod allow_list;
mod executor;

pub use allow_list::{AllowList, Refusal};
pub use executor::{DeleteExecutor, DeleteFailure, DeleteLogEntry, DeleteReport, DeleteStatus};
