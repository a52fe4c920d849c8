//! Borg repository backend.
//!
//! Archives are inspected through `borg mount`: once mounted, every
//! immediate child directory of the mount point is one archive.

use crate::config::{BorgConfig, BorgRepositoryConfig, TimeoutConfig};
use crate::fs::scanner::SizeScanner;
use crate::inventory::{BackupEntry, EntryKind};
use crate::mount::{self, AttachError, MountGuard, MountRequest};
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// How long a cancelled listing may take to wind down before the mount is released
const CANCEL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct BorgRepository {
    config: BorgRepositoryConfig,
}

impl BorgRepository {
    pub fn new(config: BorgRepositoryConfig) -> Self {
        Self { config }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn source_id(&self) -> String {
        format!("borg:{}", self.config.name)
    }

    /// Mount the repository on a private, ephemeral directory
    pub async fn attach(
        &self,
        borg: &BorgConfig,
        timeouts: &TimeoutConfig,
    ) -> Result<MountGuard, AttachError> {
        let request = MountRequest {
            name: &self.config.name,
            repository: &self.config.repository,
            env: self.environment(),
        };
        mount::attach(request, borg, timeouts).await
    }

    /// List up to `limit` archives of a mounted repository, newest first.
    ///
    /// Never fails: listing errors and timeouts yield an empty list. On
    /// timeout the walk is cancelled and awaited, so nothing is left reading
    /// the mount when it is released.
    pub async fn list(
        &self,
        mount_point: &Path,
        borg: &BorgConfig,
        limit: usize,
        timeouts: &TimeoutConfig,
    ) -> Vec<BackupEntry> {
        let source_id = self.source_id();
        let mount_point = mount_point.to_path_buf();
        let cancel = Arc::new(AtomicBool::new(false));
        let scanner = self.config.calculate_sizes.then(|| {
            SizeScanner::new(borg.size_progress_interval).with_cancel(cancel.clone())
        });

        let task_cancel = cancel.clone();
        let mut task = tokio::task::spawn_blocking(move || {
            list_archives(&source_id, &mount_point, scanner.as_ref(), limit, &task_cancel)
        });

        let outcome = tokio::time::timeout(timeouts.list(), &mut task).await;
        match outcome {
            Ok(Ok(Ok(entries))) => {
                info!(
                    "Listed {} archives from Borg repository {}",
                    entries.len(),
                    self.config.name
                );
                entries
            }
            Ok(Ok(Err(e))) => {
                error!(
                    "Error listing archives from Borg repository {}: {}",
                    self.config.name, e
                );
                Vec::new()
            }
            Ok(Err(e)) => {
                error!(
                    "Archive listing task for Borg repository {} failed: {}",
                    self.config.name, e
                );
                Vec::new()
            }
            Err(_) => {
                error!(
                    "Timeout after {}s listing Borg repository {}",
                    timeouts.list_secs, self.config.name
                );
                cancel.store(true, Ordering::Relaxed);
                if tokio::time::timeout(CANCEL_GRACE, task).await.is_err() {
                    warn!(
                        "Listing of Borg repository {} still running after cancellation",
                        self.config.name
                    );
                }
                Vec::new()
            }
        }
    }

    /// Environment for the borg process
    fn environment(&self) -> Vec<(&'static str, String)> {
        let mut env = Vec::new();
        if let Some(passphrase) = &self.config.passphrase {
            env.push(("BORG_PASSPHRASE", passphrase.clone()));
        }
        if let Some(rsh) = self.ssh_command() {
            env.push(("BORG_RSH", rsh));
        }
        env
    }

    /// `BORG_RSH` value for remote repositories, if any options are needed.
    ///
    /// A configured known-hosts file takes precedence; without one, strict
    /// checking off means host keys are not verified at all.
    fn ssh_command(&self) -> Option<String> {
        if !is_remote(&self.config.repository) {
            return None;
        }

        let strict = self.config.ssh_strict_host_key_checking;
        let options = match (&self.config.ssh_known_hosts_file, strict) {
            (Some(file), true) => format!(
                "-o StrictHostKeyChecking=yes -o UserKnownHostsFile={}",
                file.display()
            ),
            (Some(file), false) => format!("-o UserKnownHostsFile={}", file.display()),
            (None, false) => "-o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null".into(),
            (None, true) => return None,
        };

        Some(format!("ssh {}", options))
    }
}

/// `ssh://host/path` or scp-style `[user@]host:path`
fn is_remote(repository: &str) -> bool {
    if repository.starts_with("ssh://") {
        return true;
    }
    if repository.starts_with("file://") {
        return false;
    }
    match (repository.find(':'), repository.find('/')) {
        (Some(colon), Some(slash)) => colon > 0 && colon < slash,
        (Some(colon), None) => colon > 0,
        (None, _) => false,
    }
}

/// List archive directories below `mount_point`, newest first.
///
/// Sizes are computed only for the archives that survive truncation. Setting
/// `cancel` aborts the listing with `ErrorKind::Interrupted`.
pub fn list_archives(
    source_id: &str,
    mount_point: &Path,
    scanner: Option<&SizeScanner>,
    limit: usize,
    cancel: &AtomicBool,
) -> io::Result<Vec<BackupEntry>> {
    let mut archives: Vec<(PathBuf, BackupEntry)> = Vec::new();

    for item in fs::read_dir(mount_point)? {
        check_cancelled(cancel)?;
        let item = item?;
        let path = item.path();
        // Follows symlinks; dangling ones are not archives
        let metadata = match fs::metadata(&path) {
            Ok(metadata) if metadata.is_dir() => metadata,
            _ => continue,
        };

        let entry = BackupEntry {
            source_id: source_id.to_string(),
            name: item.file_name().to_string_lossy().to_string(),
            timestamp: DateTime::<Utc>::from(metadata.modified()?),
            size: None,
            kind: EntryKind::ArchiveSnapshot,
        };
        archives.push((path, entry));
    }

    archives.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp));
    archives.truncate(limit);

    let mut entries = Vec::with_capacity(archives.len());
    for (path, mut entry) in archives {
        if let Some(scanner) = scanner {
            check_cancelled(cancel)?;
            info!("Calculating size for Borg archive: {}", entry.name);
            let size = scanner.scan(&path);
            info!("Archive {} size: {} bytes", entry.name, size);
            entry.size = Some(size);
        }
        entries.push(entry);
    }
    check_cancelled(cancel)?;

    Ok(entries)
}

fn check_cancelled(cancel: &AtomicBool) -> io::Result<()> {
    if cancel.load(Ordering::Relaxed) {
        return Err(io::Error::new(io::ErrorKind::Interrupted, "archive listing cancelled"));
    }
    Ok(())
}
