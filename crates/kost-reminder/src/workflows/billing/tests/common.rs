use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;

use crate::workflows::billing::channel::{ChannelError, ChannelState, MessagingChannel};
use crate::workflows::billing::dispatcher::{DispatchPolicy, MessageDispatcher};
use crate::workflows::billing::domain::{RentRecord, TenantId, TenantRecord};
use crate::workflows::billing::eligibility::ReminderPolicy;
use crate::workflows::billing::job::BillingReminderJob;
use crate::workflows::billing::ledger::{LedgerError, TenantLedger};
use crate::workflows::billing::metrics::DeliveryMetrics;
use crate::workflows::billing::phone::PhoneNumber;
use crate::workflows::billing::router::BillingState;
use crate::workflows::billing::schedule::DailySchedule;

pub(super) fn day(year: i32, month: u32, date: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, date).expect("valid date")
}

pub(super) fn tenant(
    id: &str,
    name: &str,
    phone: Option<&str>,
    rent_date: Option<NaiveDate>,
) -> TenantRecord {
    TenantRecord {
        id: TenantId(id.to_string()),
        full_name: name.to_string(),
        phone: phone.map(str::to_string),
        rent: rent_date.map(|rent_date| RentRecord {
            rent_id: format!("rent-{id}"),
            room_id: format!("room-{id}"),
            rent_date,
            rent_out: None,
        }),
    }
}

#[derive(Debug, Default)]
pub(super) struct MemoryLedger {
    tenants: Vec<TenantRecord>,
}

impl MemoryLedger {
    pub(super) fn new(tenants: Vec<TenantRecord>) -> Self {
        Self { tenants }
    }
}

#[async_trait]
impl TenantLedger for MemoryLedger {
    async fn snapshot(&self) -> Result<Vec<TenantRecord>, LedgerError> {
        Ok(self.tenants.clone())
    }
}

pub(super) struct UnavailableLedger;

#[async_trait]
impl TenantLedger for UnavailableLedger {
    async fn snapshot(&self) -> Result<Vec<TenantRecord>, LedgerError> {
        Err(LedgerError::Unavailable(sqlx::Error::PoolClosed))
    }
}

/// Channel fake that records deliveries instead of talking to a gateway.
#[derive(Debug)]
pub(super) struct RecordingChannel {
    state: ChannelState,
    rejected_numbers: Vec<String>,
    transient_failures: AtomicU32,
    delay: Option<Duration>,
    attempts: AtomicU32,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingChannel {
    pub(super) fn ready() -> Self {
        Self::with_state(ChannelState::Ready)
    }

    pub(super) fn awaiting_pairing() -> Self {
        Self::with_state(ChannelState::AwaitingPairing {
            pairing_code: "2@pairing".to_string(),
        })
    }

    fn with_state(state: ChannelState) -> Self {
        Self {
            state,
            rejected_numbers: Vec::new(),
            transient_failures: AtomicU32::new(0),
            delay: None,
            attempts: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Normalized numbers the fake gateway refuses outright.
    pub(super) fn rejecting(mut self, numbers: &[&str]) -> Self {
        self.rejected_numbers = numbers.iter().map(|n| n.to_string()).collect();
        self
    }

    /// The first `count` sends fail with a 503.
    pub(super) fn flaky(self, count: u32) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    pub(super) fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(super) fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// `(chat_id, body)` pairs in delivery order.
    pub(super) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("sent lock").clone()
    }
}

#[async_trait]
impl MessagingChannel for RecordingChannel {
    async fn connect(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    fn state(&self) -> ChannelState {
        self.state.clone()
    }

    async fn send_text(&self, to: &PhoneNumber, body: &str) -> Result<(), ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !self.state.is_ready() {
            return Err(ChannelError::NotReady {
                state: self.state.label(),
            });
        }
        if self.rejected_numbers.iter().any(|n| n == to.as_str()) {
            return Err(ChannelError::Rejected {
                status: 404,
                body: "chat not found".to_string(),
            });
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ChannelError::Rejected {
                status: 503,
                body: "gateway busy".to_string(),
            });
        }
        self.sent
            .lock()
            .expect("sent lock")
            .push((to.chat_id(), body.to_string()));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

pub(super) fn quick_policy() -> DispatchPolicy {
    DispatchPolicy {
        send_timeout: Duration::from_millis(200),
        max_attempts: 1,
        retry_backoff: Duration::from_millis(1),
    }
}

pub(super) fn dispatcher_with(
    channel: Arc<RecordingChannel>,
    policy: DispatchPolicy,
) -> Arc<MessageDispatcher<RecordingChannel>> {
    Arc::new(MessageDispatcher::new(
        channel,
        Arc::new(DeliveryMetrics::new()),
        policy,
    ))
}

pub(super) fn build_job<L>(
    ledger: L,
    channel: Arc<RecordingChannel>,
) -> (
    BillingReminderJob<L, RecordingChannel>,
    Arc<MessageDispatcher<RecordingChannel>>,
)
where
    L: TenantLedger + 'static,
{
    let dispatcher = dispatcher_with(channel, quick_policy());
    let job = BillingReminderJob::new(
        Arc::new(ledger),
        Arc::clone(&dispatcher),
        ReminderPolicy::default(),
    );
    (job, dispatcher)
}

pub(super) fn billing_state<L>(
    ledger: L,
    channel: Arc<RecordingChannel>,
) -> Arc<BillingState<L, RecordingChannel>>
where
    L: TenantLedger + 'static,
{
    let (job, dispatcher) = build_job(ledger, channel);
    Arc::new(BillingState {
        job: Arc::new(job),
        dispatcher,
        schedule: DailySchedule::new(
            NaiveTime::from_hms_opt(18, 52, 0).expect("valid time"),
            chrono::FixedOffset::east_opt(7 * 3600).expect("valid offset"),
        ),
    })
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
