//! Backups Reporter - Main entry point
//!
//! Collects recent backups from every configured source and delivers one report.

use anyhow::{Context, Result};
use backups_reporter::{
    config::Config,
    report::{email::Mailer, Delivery},
    reporter::Reporter,
    utils,
};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Print the report to stdout instead of sending it
    #[arg(long)]
    dry_run: bool,

    /// Write the report to this file instead of sending it
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if !args.config.exists() {
        anyhow::bail!(
            "configuration file {} not found (pass --config or create config.toml)",
            args.config.display()
        );
    }

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log_level);
    utils::logger::init(log_level)?;

    tracing::info!(
        "Starting backups-reporter v{} ({} borg repositories, {} s3 buckets)",
        env!("CARGO_PKG_VERSION"),
        config.borg_repositories.len(),
        config.s3_buckets.len()
    );

    let delivery = choose_delivery(&args, &config);
    let reporter = Reporter::new(config, delivery)?;
    let count = reporter.run().await?;

    tracing::info!("Report complete with {} entries", count);
    Ok(())
}

fn choose_delivery(args: &Args, config: &Config) -> Delivery {
    if args.dry_run {
        return Delivery::Stdout;
    }
    if let Some(path) = &args.output {
        return Delivery::File(path.clone());
    }
    match &config.email {
        Some(email) => Delivery::Email(Mailer::new(email.clone())),
        None => {
            tracing::warn!("No email configuration, printing report to stdout");
            Delivery::Stdout
        }
    }
}
