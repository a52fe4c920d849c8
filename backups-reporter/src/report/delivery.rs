//! Where a rendered report goes.

use super::email::Mailer;
use super::Report;
use crate::utils::errors::{ReporterError, Result};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub enum Delivery {
    /// Mail the report over SMTP
    Email(Mailer),
    /// Write the HTML document to a file
    File(PathBuf),
    /// Print the HTML document to stdout
    Stdout,
}

impl Delivery {
    pub async fn deliver(&self, report: &Report) -> Result<()> {
        match self {
            Delivery::Email(mailer) => mailer.send(report).await,
            Delivery::File(path) => {
                tokio::fs::write(path, &report.html).await.map_err(|e| {
                    ReporterError::Delivery(format!("cannot write {}: {}", path.display(), e))
                })?;
                info!("Report written to {}", path.display());
                Ok(())
            }
            Delivery::Stdout => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(report.html.as_bytes())?;
                stdout.flush()?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn report() -> Report {
        Report {
            subject: "Backups Report".to_string(),
            html: "<html></html>".to_string(),
            entry_count: 0,
        }
    }

    #[tokio::test]
    async fn test_file_delivery() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.html");

        Delivery::File(path.clone()).deliver(&report()).await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<html></html>");
    }

    #[tokio::test]
    async fn test_file_delivery_failure() {
        let result = Delivery::File(PathBuf::from("/nonexistent/dir/report.html"))
            .deliver(&report())
            .await;
        assert!(matches!(result, Err(ReporterError::Delivery(_))));
    }
}
