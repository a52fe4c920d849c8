//! Backup sources.
//!
//! The set of backends is closed: a source is either a Borg repository,
//! which must be mounted before it can be listed, or an S3 bucket, which is
//! listed directly.

pub mod borg;
pub mod s3;

use crate::config::Config;

pub use borg::BorgRepository;
pub use s3::S3Bucket;

#[derive(Debug, Clone)]
pub enum Source {
    Archive(BorgRepository),
    ObjectStore(S3Bucket),
}

impl Source {
    /// Build every configured source: Borg repositories first, then S3
    /// buckets, each in configuration order
    pub fn from_config(config: &Config) -> Vec<Source> {
        let archives = config
            .borg_repositories
            .iter()
            .cloned()
            .map(|repo| Source::Archive(BorgRepository::new(repo)));

        let buckets = config
            .s3_buckets
            .iter()
            .cloned()
            .map(|bucket| Source::ObjectStore(S3Bucket::new(bucket)));

        archives.chain(buckets).collect()
    }

    /// Identifier stamped on every entry this source produces
    pub fn source_id(&self) -> String {
        match self {
            Source::Archive(repo) => repo.source_id(),
            Source::ObjectStore(bucket) => bucket.source_id(),
        }
    }
}
