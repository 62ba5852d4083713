use anyhow::Context;
use clap::Parser;
use lunch_notifier::{Cli, LogFormat, NotificationPipeline};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat, verbose: bool) {
    let default_level = if verbose { "lunch_notifier=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format, cli.verbose);

    let config = cli.into_config().context("Invalid configuration")?;
    if config.skip {
        info!("Skipping notification");
        return Ok(());
    }

    info!(
        schools = config.entities.len(),
        policy = ?config.menu_policy,
        timezone = %config.timezone,
        dry_run = config.dry_run,
        "Starting lunch notifier"
    );

    let pipeline = NotificationPipeline::from_config(&config).context("Failed to build pipeline")?;
    let run = match config.target_date {
        Some(date) => pipeline.run_for(pipeline.resolver().fixed(date)).await.map(Some),
        None => pipeline.run().await,
    };

    let report = match run {
        Ok(Some(report)) => report,
        Ok(None) => {
            info!("No notification for this day");
            return Ok(());
        }
        Err(e) if e.is_fatal() => {
            error!(error = %e, "Run aborted, nothing was sent");
            return Err(e.into());
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            return Err(e.into());
        }
    };

    if config.dry_run {
        println!("{}", report.message.text);
    }

    for receipt in &report.receipts {
        match &receipt.error {
            None => info!(channel = %receipt.channel, "Delivered"),
            Some(e) => error!(channel = %receipt.channel, error = %e, "Delivery failed"),
        }
    }

    let failed = report.receipts.iter().filter(|r| !r.success).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} deliveries failed for {}", report.receipts.len(), report.date);
    }

    info!(date = %report.date, enriched = report.message.enriched, "Lunch notifier finished");
    Ok(())
}
