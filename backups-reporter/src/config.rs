//! Configuration management for the backups reporter.
//!
//! Loads configuration from a TOML file. Every optional field has a serde
//! default so a minimal file only lists the backends to inspect.

use crate::utils::errors::{ReporterError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum entries contributed by a single backend
    #[serde(default = "default_entries_per_source")]
    pub entries_per_source: usize,

    /// Maximum entries kept after the global merge
    #[serde(default = "default_max_total_entries")]
    pub max_total_entries: usize,

    /// Notification endpoints pinged on start, success and failure
    #[serde(default)]
    pub webhooks: Vec<String>,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub borg: BorgConfig,

    #[serde(default)]
    pub borg_repositories: Vec<BorgRepositoryConfig>,

    #[serde(default)]
    pub s3_buckets: Vec<S3BucketConfig>,

    /// Report mail settings; without them the report goes to stdout
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Upper bound for `borg mount`
    #[serde(default = "default_mount_secs")]
    pub mount_secs: u64,

    /// Upper bound for `borg umount`
    #[serde(default = "default_umount_secs")]
    pub umount_secs: u64,

    /// Upper bound for listing one backend (includes size scanning)
    #[serde(default = "default_list_secs")]
    pub list_secs: u64,

    /// Per-request timeout for webhook pings
    #[serde(default = "default_notify_secs")]
    pub notify_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorgConfig {
    /// Borg executable (name on PATH or absolute path)
    #[serde(default = "default_borg_binary")]
    pub binary: String,

    /// Directory under which ephemeral mount points are created
    #[serde(default)]
    pub mount_root: Option<PathBuf>,

    /// Log size-scan progress every N files
    #[serde(default = "default_size_progress_interval")]
    pub size_progress_interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorgRepositoryConfig {
    /// Instance name, unique among Borg repositories
    pub name: String,

    /// Repository location (local path, ssh://… or user@host:path)
    pub repository: String,

    #[serde(default)]
    pub passphrase: Option<String>,

    /// Compute archive sizes by walking the mounted tree
    #[serde(default = "default_true")]
    pub calculate_sizes: bool,

    #[serde(default)]
    pub ssh_strict_host_key_checking: bool,

    #[serde(default)]
    pub ssh_known_hosts_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3BucketConfig {
    /// Instance name, unique among S3 buckets
    pub name: String,

    pub bucket: String,

    #[serde(default)]
    pub prefix: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub access_key: Option<String>,

    #[serde(default)]
    pub secret_key: Option<String>,

    /// Custom endpoint for self-hosted S3-compatible stores
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_server: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    pub from_email: String,

    pub to_emails: Vec<String>,

    /// Upgrade the connection with STARTTLS
    #[serde(default = "default_true")]
    pub use_tls: bool,
}

// Default values
fn default_log_level() -> String {
    "info".to_string()
}

fn default_entries_per_source() -> usize {
    10
}

fn default_max_total_entries() -> usize {
    100
}

fn default_mount_secs() -> u64 {
    300
}

fn default_umount_secs() -> u64 {
    60
}

fn default_list_secs() -> u64 {
    3600
}

fn default_notify_secs() -> u64 {
    10
}

fn default_borg_binary() -> String {
    "borg".to_string()
}

fn default_size_progress_interval() -> u64 {
    10_000
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_true() -> bool {
    true
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            mount_secs: default_mount_secs(),
            umount_secs: default_umount_secs(),
            list_secs: default_list_secs(),
            notify_secs: default_notify_secs(),
        }
    }
}

impl Default for BorgConfig {
    fn default() -> Self {
        Self {
            binary: default_borg_binary(),
            mount_root: None,
            size_progress_interval: default_size_progress_interval(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            entries_per_source: default_entries_per_source(),
            max_total_entries: default_max_total_entries(),
            webhooks: Vec::new(),
            timeouts: TimeoutConfig::default(),
            borg: BorgConfig::default(),
            borg_repositories: Vec::new(),
            s3_buckets: Vec::new(),
            email: None,
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReporterError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| ReporterError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the run cannot honour.
    ///
    /// Instance names must be unique per backend kind, since they become the
    /// entries' source identifiers.
    pub fn validate(&self) -> Result<()> {
        if self.entries_per_source == 0 {
            return Err(ReporterError::Config(
                "entries_per_source must be greater than zero".into(),
            ));
        }
        if self.max_total_entries == 0 {
            return Err(ReporterError::Config(
                "max_total_entries must be greater than zero".into(),
            ));
        }

        let mut seen = HashSet::new();
        for repo in &self.borg_repositories {
            if repo.name.trim().is_empty() || repo.repository.trim().is_empty() {
                return Err(ReporterError::Config(
                    "borg repositories need a name and a repository".into(),
                ));
            }
            if !seen.insert(repo.name.as_str()) {
                return Err(ReporterError::Config(format!(
                    "duplicate borg repository name: {}",
                    repo.name
                )));
            }
        }

        let mut seen = HashSet::new();
        for bucket in &self.s3_buckets {
            if bucket.name.trim().is_empty() || bucket.bucket.trim().is_empty() {
                return Err(ReporterError::Config(
                    "s3 buckets need a name and a bucket".into(),
                ));
            }
            if !seen.insert(bucket.name.as_str()) {
                return Err(ReporterError::Config(format!(
                    "duplicate s3 bucket name: {}",
                    bucket.name
                )));
            }
        }

        if let Some(email) = &self.email {
            if email.to_emails.is_empty() {
                return Err(ReporterError::Config(
                    "email.to_emails must list at least one recipient".into(),
                ));
            }
        }

        Ok(())
    }
}

impl TimeoutConfig {
    pub fn mount(&self) -> Duration {
        Duration::from_secs(self.mount_secs)
    }

    pub fn umount(&self) -> Duration {
        Duration::from_secs(self.umount_secs)
    }

    pub fn list(&self) -> Duration {
        Duration::from_secs(self.list_secs)
    }

    pub fn notify(&self) -> Duration {
        Duration::from_secs(self.notify_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.entries_per_source, 10);
        assert_eq!(config.max_total_entries, 100);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.timeouts.mount_secs, 300);
        assert_eq!(config.timeouts.umount_secs, 60);
        assert_eq!(config.borg.binary, "borg");
        assert!(config.email.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            entries_per_source = 5
            webhooks = ["https://hc-ping.com/abc"]

            [[borg_repositories]]
            name = "nas"
            repository = "ssh://backup@nas/./repo"
            passphrase = "secret"

            [[s3_buckets]]
            name = "offsite"
            bucket = "backups"
            endpoint_url = "http://minio:9000"

            [email]
            smtp_server = "smtp.example.com"
            from_email = "reporter@example.com"
            to_emails = ["ops@example.com"]
            "#,
        )
        .unwrap();

        assert_eq!(config.entries_per_source, 5);
        assert_eq!(config.webhooks.len(), 1);

        let repo = &config.borg_repositories[0];
        assert!(repo.calculate_sizes);
        assert!(!repo.ssh_strict_host_key_checking);
        assert_eq!(repo.passphrase.as_deref(), Some("secret"));

        let bucket = &config.s3_buckets[0];
        assert_eq!(bucket.region, "us-east-1");
        assert_eq!(bucket.prefix, "");

        let email = config.email.unwrap();
        assert_eq!(email.smtp_port, 587);
        assert!(email.use_tls);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = Config::from_toml(
            r#"
            [[borg_repositories]]
            name = "nas"
            repository = "/srv/a"

            [[borg_repositories]]
            name = "nas"
            repository = "/srv/b"
            "#,
        );
        assert!(matches!(result, Err(ReporterError::Config(_))));
    }

    #[test]
    fn test_same_name_across_kinds_allowed() {
        let config = Config::from_toml(
            r#"
            [[borg_repositories]]
            name = "main"
            repository = "/srv/repo"

            [[s3_buckets]]
            name = "main"
            bucket = "backups"
            "#,
        );
        assert!(config.is_ok());
    }

    #[test]
    fn test_zero_limits_rejected() {
        assert!(Config::from_toml("max_total_entries = 0").is_err());
        assert!(Config::from_toml("entries_per_source = 0").is_err());
    }

    #[test]
    fn test_email_without_recipients_rejected() {
        let result = Config::from_toml(
            r#"
            [email]
            smtp_server = "smtp.example.com"
            from_email = "reporter@example.com"
            to_emails = []
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file(Path::new("/nonexistent/backups-reporter.toml"));
        assert!(matches!(result, Err(ReporterError::Config(_))));
    }
}
