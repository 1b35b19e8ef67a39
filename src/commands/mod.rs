//! Bodies of the CLI subcommands. Each returns the process exit code.

pub mod classify;
pub mod delete;
pub mod query;
pub mod scan;
pub mod serve;

pub const EXIT_OK: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
/// Some paths of a delete request failed
pub const EXIT_PARTIAL: i32 = 5;
pub const EXIT_CANCELLED: i32 = 130;
