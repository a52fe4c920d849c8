//! Best-effort recursive size computation for mounted archives.
//!
//! Borg archives can hold millions of files, so the scan reports progress at
//! a fixed cadence and never fails: entries that cannot be read are counted
//! as skipped and the walk moves on.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// Default number of files between progress reports
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

/// Running totals of a scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Regular files counted
    pub files: u64,

    /// Bytes summed over counted files
    pub bytes: u64,

    /// Entries that could not be read
    pub skipped: u64,
}

#[derive(Debug, Clone)]
pub struct SizeScanner {
    progress_interval: u64,
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for SizeScanner {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_INTERVAL)
    }
}

impl SizeScanner {
    /// Create a scanner reporting progress every `progress_interval` files (0 disables it)
    pub fn new(progress_interval: u64) -> Self {
        Self {
            progress_interval,
            cancel: None,
        }
    }

    /// Stop walking as soon as `cancel` is set
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|cancel| cancel.load(Ordering::Relaxed))
    }

    /// Total size in bytes of all files below `root`
    pub fn scan(&self, root: &Path) -> u64 {
        let summary = self.scan_with_progress(root, |progress| {
            info!(
                "Processed {} files, current size: {} bytes",
                progress.files, progress.bytes
            );
        });

        info!(
            "Archive scan complete: {} files, total size: {} bytes ({} skipped)",
            summary.files, summary.bytes, summary.skipped
        );

        summary.bytes
    }

    /// Walk `root`, calling `on_progress` every `progress_interval` files.
    /// A cancelled walk returns the totals gathered so far.
    pub fn scan_with_progress<F>(&self, root: &Path, mut on_progress: F) -> ScanSummary
    where
        F: FnMut(&ScanSummary),
    {
        let mut summary = ScanSummary::default();

        for entry in WalkDir::new(root).follow_links(false) {
            if self.is_cancelled() {
                debug!("Scan of {} cancelled", root.display());
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    summary.skipped += 1;
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            match file_size(&entry) {
                Ok(Some(size)) => {
                    summary.files += 1;
                    summary.bytes += size;

                    if self.progress_interval > 0 && summary.files % self.progress_interval == 0 {
                        on_progress(&summary);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    debug!("Skipping {}: {}", entry.path().display(), e);
                    summary.skipped += 1;
                }
            }
        }

        summary
    }
}

/// Size of a file entry, resolving symlinks to their target.
/// Symlinks to directories yield `None`; dangling links are an error.
fn file_size(entry: &DirEntry) -> std::io::Result<Option<u64>> {
    if entry.path_is_symlink() {
        let resolved = fs::metadata(entry.path())?;
        if resolved.is_dir() {
            return Ok(None);
        }
        return Ok(Some(resolved.len()));
    }

    Ok(Some(entry.metadata()?.len()))
}
