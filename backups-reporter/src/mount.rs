//! Mount lifecycle for Borg repositories.
//!
//! A repository has to be FUSE-mounted before its archives can be listed.
//! [`attach`] mounts it on a fresh, private directory and hands back a
//! [`MountGuard`]. The guard must be given back through
//! [`MountGuard::release`]; if it is dropped first (a panic or an early
//! return in the owning scope) its `Drop` impl performs the same unmount
//! synchronously. Either way the unmount is attempted exactly once.

use crate::config::{BorgConfig, TimeoutConfig};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AttachError {
    #[error("timed out after {}s mounting {repository}", after.as_secs())]
    Timeout { repository: String, after: Duration },

    #[error("mounting {repository} failed ({status}): {stderr}")]
    ProcessFailure {
        repository: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("cannot mount {repository}: {source}")]
    SystemError {
        repository: String,
        #[source]
        source: std::io::Error,
    },
}

/// What to mount and with which environment
#[derive(Debug, Clone)]
pub struct MountRequest<'a> {
    /// Instance name, used for the mount point and in logs
    pub name: &'a str,

    /// Repository location passed to `borg mount`
    pub repository: &'a str,

    /// Extra environment for the borg process (passphrase, ssh command)
    pub env: Vec<(&'static str, String)>,
}

/// Mount a repository on a fresh directory below `borg.mount_root`.
///
/// The mount point is removed again on every failure path.
pub async fn attach(
    request: MountRequest<'_>,
    borg: &BorgConfig,
    timeouts: &TimeoutConfig,
) -> Result<MountGuard, AttachError> {
    let repository = request.repository.to_string();

    let mount_point = allocate_mount_point(borg.mount_root.as_deref(), request.name).map_err(
        |source| AttachError::SystemError {
            repository: repository.clone(),
            source,
        },
    )?;

    let mut command = Command::new(&borg.binary);
    command
        .arg("mount")
        .arg(request.repository)
        .arg(&mount_point)
        .envs(request.env.iter().map(|(key, value)| (*key, value.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let failure = match tokio::time::timeout(timeouts.mount(), command.output()).await {
        Ok(Ok(output)) if output.status.success() => {
            info!(
                "Successfully mounted Borg repository {} at {}",
                request.name,
                mount_point.display()
            );
            return Ok(MountGuard {
                name: request.name.to_string(),
                binary: borg.binary.clone(),
                mount_point,
                umount_timeout: timeouts.umount(),
                released: false,
            });
        }
        Ok(Ok(output)) => AttachError::ProcessFailure {
            repository,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        },
        Ok(Err(source)) => AttachError::SystemError { repository, source },
        Err(_) => AttachError::Timeout {
            repository,
            after: timeouts.mount(),
        },
    };

    if let Err(e) = std::fs::remove_dir(&mount_point) {
        warn!("Failed to remove mount point {}: {}", mount_point.display(), e);
    }
    Err(failure)
}

fn allocate_mount_point(root: Option<&Path>, name: &str) -> std::io::Result<PathBuf> {
    let root = root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
    let safe_name: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();

    let path = root.join(format!("borg_{}_{}", safe_name, Uuid::new_v4().simple()));
    std::fs::create_dir(&path)?;
    Ok(path)
}

/// A mounted repository. Unmounted on [`release`](MountGuard::release) or drop.
#[derive(Debug)]
pub struct MountGuard {
    name: String,
    binary: String,
    mount_point: PathBuf,
    umount_timeout: Duration,
    released: bool,
}

impl MountGuard {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Unmount and remove the mount point. Errors are logged, never returned.
    pub async fn release(mut self) {
        self.released = true;

        let mut command = Command::new(&self.binary);
        command
            .arg("umount")
            .arg(&self.mount_point)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(self.umount_timeout, command.output()).await {
            Ok(Ok(output)) if output.status.success() => {}
            Ok(Ok(output)) => error!(
                "borg umount for {} exited with {}: {}",
                self.name,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Ok(Err(e)) => error!("Error unmounting Borg repository {}: {}", self.name, e),
            Err(_) => error!(
                "Timeout after {}s unmounting Borg repository {}",
                self.umount_timeout.as_secs(),
                self.name
            ),
        }

        match tokio::fs::remove_dir(&self.mount_point).await {
            Ok(()) => info!("Unmounted Borg repository {}", self.name),
            Err(e) => error!(
                "Error removing mount point {}: {}",
                self.mount_point.display(),
                e
            ),
        }
    }

    /// Blocking variant of `release`, used from `Drop`.
    fn release_blocking(&mut self) {
        self.released = true;

        let spawned = std::process::Command::new(&self.binary)
            .arg("umount")
            .arg(&self.mount_point)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                let deadline = Instant::now() + self.umount_timeout;
                loop {
                    match child.try_wait() {
                        Ok(Some(status)) => {
                            if !status.success() {
                                error!("borg umount for {} exited with {}", self.name, status);
                            }
                            break;
                        }
                        Ok(None) if Instant::now() >= deadline => {
                            error!(
                                "Timeout after {}s unmounting Borg repository {}",
                                self.umount_timeout.as_secs(),
                                self.name
                            );
                            let _ = child.kill();
                            let _ = child.wait();
                            break;
                        }
                        Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                        Err(e) => {
                            error!("Error waiting for borg umount for {}: {}", self.name, e);
                            break;
                        }
                    }
                }
            }
            Err(e) => error!("Error unmounting Borg repository {}: {}", self.name, e),
        }

        match std::fs::remove_dir(&self.mount_point) {
            Ok(()) => info!("Unmounted Borg repository {}", self.name),
            Err(e) => error!(
                "Error removing mount point {}: {}",
                self.mount_point.display(),
                e
            ),
        }
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                "Mount of {} dropped without release, unmounting synchronously",
                self.name
            );
            self.release_blocking();
        }
    }
}
