//! Daily billing reminders for tenants.
//!
//! The pipeline reads a snapshot of the tenant ledger, decides per tenant
//! whether today is its reminder day, and relays a message through the chat
//! channel. Every tenant is handled on its own: only a ledger failure stops a
//! run, send failures are counted and logged.

pub mod channel;
pub mod dispatcher;
pub mod domain;
pub mod eligibility;
pub mod inbound;
pub mod job;
pub mod ledger;
pub mod message;
pub mod metrics;
pub mod phone;
pub mod router;
pub mod schedule;

#[cfg(test)]
mod tests;

pub use channel::{
    ChannelError, ChannelSession, ChannelState, GatewayChannel, GatewayStatus, MessagingChannel,
};
pub use dispatcher::{DispatchError, DispatchPolicy, MessageDispatcher, SentMessage};
pub use domain::{DeliveryOutcome, RentRecord, SkipReason, TenantId, TenantRecord};
pub use eligibility::{
    is_reminder_due, reminder_date, Eligibility, ReminderCandidate, ReminderPolicy,
    DEFAULT_REMINDER_OFFSET_DAYS,
};
pub use job::{BillingReminderJob, RunSummary};
pub use ledger::{LedgerError, SqlTenantLedger, TenantLedger};
pub use message::{billing_reminder_text, format_indonesian_date};
pub use metrics::{DeliveryCounts, DeliveryMetrics};
pub use phone::{normalize_digits, PhoneError, PhoneNumber};
pub use router::{billing_router, BillingState};
pub use schedule::{run_daily, DailySchedule, ScheduledJob};
