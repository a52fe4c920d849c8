//! Uniform backup inventory records and the ordering rules shared by every backend.

pub mod aggregator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use aggregator::{InventoryAggregator, Limits};

/// What kind of artifact an entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    /// One archive of a mounted Borg repository
    ArchiveSnapshot,
    /// One object in an S3 bucket
    Object,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::ArchiveSnapshot => "archive-snapshot",
            EntryKind::Object => "object",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One backup artifact from any source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    /// Backend instance identifier (`borg:<name>` or `s3:<name>`)
    pub source_id: String,

    /// Archive name or object key
    pub name: String,

    /// Last-modified time
    pub timestamp: DateTime<Utc>,

    /// Size in bytes, when known
    pub size: Option<u64>,

    pub kind: EntryKind,
}

/// Sort newest first and keep at most `limit` entries.
///
/// The sort is stable: entries with equal timestamps keep their input order.
pub fn newest_first(mut entries: Vec<BackupEntry>, limit: usize) -> Vec<BackupEntry> {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries.truncate(limit);
    entries
}

/// Merge per-source listings into one bounded, newest-first sequence.
///
/// Listings are concatenated in the order given, so timestamp ties resolve
/// to source enumeration order.
pub fn merge_entries(per_source: Vec<Vec<BackupEntry>>, total_limit: usize) -> Vec<BackupEntry> {
    let merged: Vec<BackupEntry> = per_source.into_iter().flatten().collect();
    newest_first(merged, total_limit)
}
