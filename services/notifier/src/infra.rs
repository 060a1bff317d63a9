use chrono::NaiveDate;
use kost_reminder::config::AppConfig;
use kost_reminder::error::AppError;
use kost_reminder::workflows::billing::{
    BillingReminderJob, BillingState, ChannelSession, DailySchedule, DeliveryMetrics,
    DispatchPolicy, GatewayChannel, MessageDispatcher, ReminderPolicy, SqlTenantLedger,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type GatewayState = BillingState<SqlTenantLedger, GatewayChannel>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) channel: Arc<ChannelSession>,
}

/// Ledger, gateway channel, dispatcher and job wired from configuration.
///
/// Neither the ledger nor the channel is contacted here.
pub(crate) fn build_pipeline(config: &AppConfig) -> Result<Arc<GatewayState>, AppError> {
    let ledger = SqlTenantLedger::open(&config.database.url)?;
    let channel = Arc::new(GatewayChannel::new(&config.channel)?);
    let dispatcher = Arc::new(MessageDispatcher::new(
        channel,
        Arc::new(DeliveryMetrics::new()),
        DispatchPolicy::from(&config.channel),
    ));
    let job = BillingReminderJob::new(
        Arc::new(ledger),
        Arc::clone(&dispatcher),
        ReminderPolicy::new(config.reminder.offset_days),
    );

    Ok(Arc::new(BillingState {
        job: Arc::new(job),
        dispatcher,
        schedule: DailySchedule::from_config(&config.reminder),
    }))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pipeline_builds_while_ledger_is_unreachable() {
        let path = std::env::temp_dir()
            .join(format!("kost-notifier-absent-{}", std::process::id()))
            .join("kost.db");
        let url = format!("sqlite://{}", path.display());
        let config = AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some(url.clone()),
            _ => None,
        })
        .expect("config loads");

        let billing = build_pipeline(&config).expect("pipeline builds");

        let err = billing
            .job
            .run(NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date"))
            .await
            .expect_err("ledger unreachable for this run");
        assert!(err.to_string().contains("tenant ledger unavailable"));
        assert!(!path.exists());
    }

    #[test]
    fn parse_date_trims_whitespace() {
        assert_eq!(
            parse_date(" 2024-06-01 "),
            Ok(NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date"))
        );
    }

    #[test]
    fn parse_date_names_expected_format() {
        let err = parse_date("June 1").expect_err("invalid");
        assert!(err.contains("YYYY-MM-DD"));
    }
}
