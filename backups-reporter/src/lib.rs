//! Backups Reporter Library
//!
//! Inventory of recent backups across Borg repositories and S3 buckets,
//! rendered as an HTML report with webhook notifications around each run.

pub mod config;
pub mod fs;
pub mod inventory;
pub mod mount;
pub mod notify;
pub mod report;
pub mod reporter;
pub mod sources;
pub mod utils;

#[cfg(all(test, unix))]
mod test_support;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::ReporterError;
pub type Result<T> = std::result::Result<T, ReporterError>;
