use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use super::channel::MessagingChannel;
use super::dispatcher::MessageDispatcher;
use super::eligibility::{Eligibility, ReminderPolicy};
use super::ledger::{LedgerError, TenantLedger};
use super::message::billing_reminder_text;
use super::schedule::ScheduledJob;

/// Tally of one reminder run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub today: NaiveDate,
    pub examined: usize,
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn new(today: NaiveDate) -> Self {
        Self {
            today,
            examined: 0,
            due: 0,
            sent: 0,
            failed: 0,
            skipped: 0,
        }
    }
}

/// Ledger snapshot → eligibility → dispatch, one tenant at a time.
pub struct BillingReminderJob<L, C> {
    ledger: Arc<L>,
    dispatcher: Arc<MessageDispatcher<C>>,
    policy: ReminderPolicy,
}

impl<L, C> BillingReminderJob<L, C>
where
    L: TenantLedger + 'static,
    C: MessagingChannel + 'static,
{
    pub fn new(
        ledger: Arc<L>,
        dispatcher: Arc<MessageDispatcher<C>>,
        policy: ReminderPolicy,
    ) -> Self {
        Self {
            ledger,
            dispatcher,
            policy,
        }
    }

    pub fn policy(&self) -> ReminderPolicy {
        self.policy
    }

    /// Only a ledger failure aborts the run; send failures are counted.
    #[instrument(skip(self), fields(offset_days = self.policy.offset_days))]
    pub async fn run(&self, today: NaiveDate) -> Result<RunSummary, LedgerError> {
        let tenants = match self.ledger.snapshot().await {
            Ok(tenants) => tenants,
            Err(err) => {
                error!(%err, %today, "tenant ledger unavailable; reminder run aborted");
                return Err(err);
            }
        };

        let mut summary = RunSummary::new(today);
        for tenant in &tenants {
            summary.examined += 1;
            let candidate = match self.policy.evaluate(tenant, today) {
                Eligibility::Due(candidate) => candidate,
                Eligibility::Skipped(reason) => {
                    debug!(tenant_id = %tenant.id, reason = reason.label(), "no reminder today");
                    summary.skipped += 1;
                    continue;
                }
            };

            summary.due += 1;
            let text = billing_reminder_text(&tenant.full_name, candidate.rent_date);
            match self.dispatcher.dispatch(candidate.phone, &text).await {
                Ok(sent) => {
                    info!(
                        tenant_id = %tenant.id,
                        number = %sent.number,
                        rent_date = %candidate.rent_date,
                        "billing reminder sent"
                    );
                    summary.sent += 1;
                }
                Err(err) => {
                    error!(
                        tenant_id = %tenant.id,
                        tenant = %tenant.full_name,
                        phone = candidate.phone,
                        %err,
                        "failed to send billing reminder"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            examined = summary.examined,
            due = summary.due,
            sent = summary.sent,
            failed = summary.failed,
            "billing reminder run complete"
        );
        Ok(summary)
    }
}

#[async_trait]
impl<L, C> ScheduledJob for BillingReminderJob<L, C>
where
    L: TenantLedger + 'static,
    C: MessagingChannel + 'static,
{
    type Error = LedgerError;

    fn name(&self) -> &'static str {
        "billing-reminders"
    }

    async fn fire(&self, today: NaiveDate) -> Result<(), Self::Error> {
        self.run(today).await.map(|_| ())
    }
}
