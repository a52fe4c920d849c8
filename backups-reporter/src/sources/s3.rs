//! S3 bucket backend.
//!
//! Every instance builds its own client from its own credentials, region and
//! endpoint, so nothing leaks between configured buckets.

use crate::config::{S3BucketConfig, TimeoutConfig};
use crate::inventory::{newest_first, BackupEntry, EntryKind};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

/// Raw object metadata as returned by the listing API
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub key: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct S3Bucket {
    config: S3BucketConfig,
}

impl S3Bucket {
    pub fn new(config: S3BucketConfig) -> Self {
        Self { config }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn source_id(&self) -> String {
        format!("s3:{}", self.config.name)
    }

    /// List up to `limit` objects under the configured prefix, newest first.
    ///
    /// Never fails: SDK errors and timeouts yield an empty list.
    pub async fn list(&self, limit: usize, timeouts: &TimeoutConfig) -> Vec<BackupEntry> {
        match tokio::time::timeout(timeouts.list(), self.fetch_objects()).await {
            Ok(Ok(objects)) => {
                let entries = entries_from_objects(&self.source_id(), objects, limit);
                info!(
                    "Listed {} objects from S3 bucket {}",
                    entries.len(),
                    self.config.name
                );
                entries
            }
            Ok(Err(e)) => {
                error!(
                    "Error listing objects from S3 bucket {}: {}",
                    self.config.name, e
                );
                Vec::new()
            }
            Err(_) => {
                error!(
                    "Timeout after {}s listing S3 bucket {}",
                    timeouts.list_secs, self.config.name
                );
                Vec::new()
            }
        }
    }

    async fn client(&self) -> aws_sdk_s3::Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.config.region.clone()));

        if let (Some(access_key), Some(secret_key)) =
            (&self.config.access_key, &self.config.secret_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "backups-reporter",
            ));
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &self.config.endpoint_url {
            // Path-style addressing for self-hosted endpoints
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        aws_sdk_s3::Client::from_conf(builder.build())
    }

    /// Page through every object under the prefix
    async fn fetch_objects(&self) -> Result<Vec<ObjectRecord>, String> {
        let client = self.client().await;
        let prefix = (!self.config.prefix.is_empty()).then(|| self.config.prefix.clone());

        let mut pages = client
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .set_prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| DisplayErrorContext(e).to_string())?;
            for object in page.contents() {
                objects.push(ObjectRecord {
                    key: object.key().map(str::to_string),
                    last_modified: object
                        .last_modified()
                        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
                    size: object.size(),
                });
            }
        }

        debug!(
            "Fetched {} objects from s3://{}/{}",
            objects.len(),
            self.config.bucket,
            self.config.prefix
        );
        Ok(objects)
    }
}

/// Convert listed objects into entries, newest first, at most `limit`.
///
/// Objects without a key or a modification time are dropped.
pub fn entries_from_objects(
    source_id: &str,
    objects: Vec<ObjectRecord>,
    limit: usize,
) -> Vec<BackupEntry> {
    let entries = objects
        .into_iter()
        .filter_map(|object| {
            let (Some(key), Some(timestamp)) = (object.key, object.last_modified) else {
                debug!("Skipping object without key or modification time");
                return None;
            };
            Some(BackupEntry {
                source_id: source_id.to_string(),
                name: key,
                timestamp,
                size: object.size.and_then(|size| u64::try_from(size).ok()),
                kind: EntryKind::Object,
            })
        })
        .collect();

    newest_first(entries, limit)
}
