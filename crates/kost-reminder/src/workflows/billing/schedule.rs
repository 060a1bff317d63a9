use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use tracing::{error, info};

use crate::config::ReminderConfig;

/// Work fired by the daily trigger, invoked with the local calendar day.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    async fn fire(&self, today: NaiveDate) -> Result<(), Self::Error>;
}

/// Once a day at `fire_at`, in a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    fire_at: NaiveTime,
    offset: FixedOffset,
}

impl DailySchedule {
    pub fn new(fire_at: NaiveTime, offset: FixedOffset) -> Self {
        Self { fire_at, offset }
    }

    pub fn from_config(config: &ReminderConfig) -> Self {
        Self::new(config.fire_at, config.utc_offset)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar day at `now` in the schedule's timezone.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// First firing strictly after `now`.
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.offset).naive_local();
        let today_fire = local.date().and_time(self.fire_at);
        let next_local = if local < today_fire {
            today_fire
        } else {
            today_fire + TimeDelta::days(1)
        };
        let utc = next_local - TimeDelta::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc)
    }
}

/// Sleep until each firing and run the job; runs until the task is aborted.
///
/// Missed days (process down at firing time) are not caught up.
pub async fn run_daily<J>(schedule: DailySchedule, job: Arc<J>)
where
    J: ScheduledJob + ?Sized,
{
    let mut last_fired: Option<NaiveDate> = None;
    loop {
        let now = Utc::now();
        let next = schedule.next_fire_after(now);
        info!(
            job = job.name(),
            next_fire = %next.with_timezone(&schedule.offset()),
            "waiting for next scheduled run"
        );
        let wait = (next - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        let today = schedule.local_date(Utc::now());
        if last_fired == Some(today) {
            continue;
        }
        last_fired = Some(today);

        info!(job = job.name(), %today, "scheduled run starting");
        match job.fire(today).await {
            Ok(()) => info!(job = job.name(), %today, "scheduled run finished"),
            Err(err) => error!(job = job.name(), %today, %err, "scheduled run failed"),
        }
    }
}
