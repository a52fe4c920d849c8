//! Run-scoped aggregation over every configured source.

use super::{merge_entries, BackupEntry};
use crate::config::{BorgConfig, Config, TimeoutConfig};
use crate::mount::MountGuard;
use crate::sources::{BorgRepository, S3Bucket, Source};
use tracing::{error, info};

/// Caps applied per source and after the merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub per_source: usize,
    pub total: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            per_source: 10,
            total: 100,
        }
    }
}

pub struct InventoryAggregator {
    borg: BorgConfig,
    timeouts: TimeoutConfig,
    limits: Limits,
}

impl InventoryAggregator {
    pub fn new(borg: BorgConfig, timeouts: TimeoutConfig, limits: Limits) -> Self {
        Self {
            borg,
            timeouts,
            limits,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.borg.clone(),
            config.timeouts.clone(),
            Limits {
                per_source: config.entries_per_source,
                total: config.max_total_entries,
            },
        )
    }

    /// Collect, merge and truncate entries from every source.
    ///
    /// Borg repositories are handled first, then S3 buckets, each in the
    /// order given. A source that fails contributes nothing. Every mount made
    /// here is released before this returns.
    pub async fn run(&self, sources: &[Source]) -> Vec<BackupEntry> {
        let mut mounts: Vec<MountGuard> = Vec::new();
        let mut listings = Vec::with_capacity(sources.len());

        for source in sources {
            if let Source::Archive(repo) = source {
                listings.push(self.list_archive(repo, &mut mounts).await);
            }
        }

        for source in sources {
            if let Source::ObjectStore(bucket) = source {
                listings.push(self.list_bucket(bucket).await);
            }
        }

        let entries = merge_entries(listings, self.limits.total);

        for guard in mounts {
            guard.release().await;
        }

        info!(
            "Aggregated {} entries from {} sources",
            entries.len(),
            sources.len()
        );
        entries
    }

    async fn list_archive(
        &self,
        repo: &BorgRepository,
        mounts: &mut Vec<MountGuard>,
    ) -> Vec<BackupEntry> {
        let guard = match repo.attach(&self.borg, &self.timeouts).await {
            Ok(guard) => guard,
            Err(e) => {
                error!("Skipping Borg repository {}: {}", repo.name(), e);
                return Vec::new();
            }
        };

        let mount_point = guard.mount_point().to_path_buf();
        mounts.push(guard);

        repo.list(&mount_point, &self.borg, self.limits.per_source, &self.timeouts)
            .await
    }

    async fn list_bucket(&self, bucket: &S3Bucket) -> Vec<BackupEntry> {
        bucket.list(self.limits.per_source, &self.timeouts).await
    }
}
