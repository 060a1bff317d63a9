use crate::infra::{build_pipeline, parse_date};
use chrono::{NaiveDate, Utc};
use clap::Args;
use kost_reminder::config::AppConfig;
use kost_reminder::error::AppError;
use kost_reminder::telemetry;
use kost_reminder::workflows::billing::{
    DeliveryMetrics, GatewayChannel, MessagingChannel, SqlTenantLedger,
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Args, Debug, Default)]
pub(crate) struct RemindArgs {
    /// Evaluate reminders for this day (YYYY-MM-DD) instead of the local today
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Seconds to wait for the chat session to become ready before sending
    #[arg(long, default_value_t = 30)]
    pub(crate) wait_secs: u64,
}

/// One reminder run outside the daily schedule.
///
/// The gateway session is left running afterwards.
pub(crate) async fn run_once(args: RemindArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    DeliveryMetrics::describe();

    let billing = build_pipeline(&config)?;
    let channel = billing.dispatcher.channel();
    if let Err(err) = channel.connect().await {
        warn!(%err, "chat channel did not start");
    }
    wait_until_ready(
        channel,
        Duration::from_secs(args.wait_secs),
        config.channel.status_poll,
    )
    .await;

    let today = args
        .today
        .unwrap_or_else(|| billing.schedule.local_date(Utc::now()));
    let summary = billing.job.run(today).await?;

    println!("Billing reminders for {}", summary.today);
    println!("  Tenants examined: {}", summary.examined);
    println!("  Due today: {}", summary.due);
    println!("  Sent: {}", summary.sent);
    println!("  Failed: {}", summary.failed);
    println!("  Skipped: {}", summary.skipped);
    Ok(())
}

pub(crate) async fn run_migrations() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let ledger = SqlTenantLedger::create(&config.database.url).await?;
    ledger.migrate().await?;
    info!(database = %config.database.url, "tenant ledger migrations applied");
    Ok(())
}

async fn wait_until_ready(channel: &GatewayChannel, budget: Duration, poll: Duration) {
    let deadline = Instant::now() + budget;
    while !channel.is_ready() {
        if Instant::now() >= deadline {
            warn!(
                state = channel.state().label(),
                "chat channel not ready; due reminders will be counted as failed"
            );
            return;
        }
        tokio::time::sleep(poll).await;
        if let Err(err) = channel.refresh_status().await {
            warn!(%err, "failed to refresh chat channel status");
        }
    }
}
