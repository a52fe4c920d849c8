//! One reporting run: signal start, gather, render, deliver, signal outcome.

use crate::config::Config;
use crate::inventory::InventoryAggregator;
use crate::notify::{Phase, WebhookNotifier};
use crate::report::{render, Delivery, ReportContext};
use crate::sources::Source;
use crate::utils::errors::Result;
use tracing::{error, info};

pub struct Reporter {
    config: Config,
    delivery: Delivery,
    notifier: WebhookNotifier,
}

impl Reporter {
    pub fn new(config: Config, delivery: Delivery) -> Result<Self> {
        let notifier = WebhookNotifier::new(config.webhooks.clone(), config.timeouts.notify())?;
        Ok(Self {
            config,
            delivery,
            notifier,
        })
    }

    /// Run once. Returns the number of entries in the delivered report.
    ///
    /// Every mount is released before the report is rendered, so a failing
    /// delivery never leaves a repository attached.
    pub async fn run(&self) -> Result<usize> {
        self.notifier
            .notify(Phase::Start, "Backups report generation started")
            .await;

        match self.generate().await {
            Ok(count) => {
                info!("Backups report generated successfully with {} entries", count);
                self.notifier
                    .notify(
                        Phase::Success,
                        &format!("Backups report generated successfully with {} entries", count),
                    )
                    .await;
                Ok(count)
            }
            Err(e) => {
                error!("Backups report generation failed: {}", e);
                self.notifier
                    .notify(
                        Phase::Failure,
                        &format!("Backups report generation failed: {}", e),
                    )
                    .await;
                Err(e)
            }
        }
    }

    async fn generate(&self) -> Result<usize> {
        let sources = Source::from_config(&self.config);
        info!("Collecting backups from {} sources", sources.len());

        let entries = InventoryAggregator::from_config(&self.config)
            .run(&sources)
            .await;

        let report = render(&entries, &ReportContext::now());
        self.delivery.deliver(&report).await?;
        Ok(report.entry_count)
    }
}
