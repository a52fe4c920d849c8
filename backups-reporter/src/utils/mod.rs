//! Utility modules for the backups reporter.

pub mod errors;
pub mod logger;

pub use errors::{ReporterError, Result};
