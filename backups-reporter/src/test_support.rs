//! Fake `borg` executable for exercising the mount lifecycle in tests.
//!
//! The script appends `<subcommand>|<BORG_PASSPHRASE>|<BORG_RSH>|<first arg>`
//! to a log file on every invocation. `mount` populates the mount point with
//! archive directories whose mtimes are spaced one hour apart; `umount`
//! empties it.

use crate::config::BorgConfig;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub(crate) struct FakeBorg {
    dir: TempDir,
    binary: PathBuf,
    log: PathBuf,
}

impl FakeBorg {
    /// `mount` creates `count` archives `archive-1..=count`, each holding a
    /// 10-byte file; archive `i` is stamped `base_epoch + i * 3600`.
    /// Repositories whose location contains `broken` fail to mount.
    pub(crate) fn with_archives(count: usize, base_epoch: i64) -> Self {
        Self::write(
            &format!(
                r#"    case "$2" in
      *broken*) echo "Repository does not exist" >&2; exit 2 ;;
    esac
    i=0
    while [ "$i" -lt {count} ]; do
      i=$((i + 1))
      mkdir "$3/archive-$i"
      printf '0123456789' > "$3/archive-$i/data"
      touch -d "@$(({base_epoch} + i * 3600))" "$3/archive-$i"
    done"#
            ),
            r#"    rm -rf "$2"/*"#,
        )
    }

    /// `mount` fails with exit code 2.
    pub(crate) fn failing() -> Self {
        Self::write(
            r#"    echo "Failed to create/acquire the lock" >&2
    exit 2"#,
            r#"    rm -rf "$2"/*"#,
        )
    }

    /// `mount` never returns on its own.
    pub(crate) fn hanging() -> Self {
        Self::write("    exec sleep 30", r#"    rm -rf "$2"/*"#)
    }

    /// `mount` succeeds but removes the mount point, so listing it fails.
    pub(crate) fn vanishing() -> Self {
        Self::write(r#"    rmdir "$3""#, "    :")
    }

    /// `mount` succeeds with no archives, `umount` fails.
    pub(crate) fn failing_umount() -> Self {
        Self::write("    :", "    exit 1")
    }

    fn write(mount_body: &str, umount_body: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let binary = dir.path().join("borg");
        let log = dir.path().join("calls.log");
        fs::create_dir(dir.path().join("mounts")).unwrap();

        let script = format!(
            r#"#!/bin/sh
echo "$1|${{BORG_PASSPHRASE:-}}|${{BORG_RSH:-}}|$2" >> "{log}"
case "$1" in
  mount)
{mount_body}
    ;;
  umount)
{umount_body}
    ;;
esac
exit 0
"#,
            log = log.display(),
        );

        fs::write(&binary, script).unwrap();
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();

        Self { dir, binary, log }
    }

    pub(crate) fn mount_root(&self) -> PathBuf {
        self.dir.path().join("mounts")
    }

    pub(crate) fn config(&self) -> BorgConfig {
        BorgConfig {
            binary: self.binary.to_string_lossy().to_string(),
            mount_root: Some(self.mount_root()),
            size_progress_interval: 10_000,
        }
    }

    /// Raw log lines, one per invocation
    pub(crate) fn lines(&self) -> Vec<String> {
        read_lines(&self.log)
    }

    /// Argument following `subcommand`, for every call of it
    pub(crate) fn targets(&self, subcommand: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|line| {
                let fields: Vec<&str> = line.split('|').collect();
                (fields.first() == Some(&subcommand)).then(|| fields.last().unwrap_or(&"").to_string())
            })
            .collect()
    }

    /// Subcommands in invocation order
    pub(crate) fn commands(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|line| line.split('|').next().map(str::to_string))
            .collect()
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|content| content.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
