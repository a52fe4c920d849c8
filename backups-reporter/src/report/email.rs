//! SMTP delivery of the rendered report.

use super::Report;
use crate::config::EmailConfig;
use crate::utils::errors::{ReporterError, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Mailer {
    config: EmailConfig,
}

impl Mailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Build the HTML message addressed to every configured recipient
    pub fn message(&self, report: &Report) -> Result<Message> {
        let from: Mailbox = parse_mailbox(&self.config.from_email)?;

        let mut builder = Message::builder().from(from).subject(report.subject.clone());
        for recipient in &self.config.to_emails {
            builder = builder.to(parse_mailbox(recipient)?);
        }

        builder
            .header(ContentType::TEXT_HTML)
            .body(report.html.clone())
            .map_err(|e| ReporterError::Mail(e.to_string()))
    }

    pub async fn send(&self, report: &Report) -> Result<()> {
        let message = self.message(report)?;

        let builder = if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_server)
                .map_err(|e| ReporterError::Mail(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.smtp_server)
        };
        let mut transport = builder.port(self.config.smtp_port);

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            transport = transport.credentials(Credentials::new(username.clone(), password.clone()));
        }

        transport
            .build()
            .send(message)
            .await
            .map_err(|e| ReporterError::Mail(e.to_string()))?;

        info!(
            "Report sent successfully to {} recipients",
            self.config.to_emails.len()
        );
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| ReporterError::Mail(format!("invalid address {}: {}", address, e)))
}
