use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::domain::DeliveryOutcome;

pub const MESSAGES_SENT_TOTAL: &str = "whatsapp_messages_sent_total";
pub const MESSAGES_FAILED_TOTAL: &str = "whatsapp_messages_failed_total";

/// Process-lifetime delivery counters.
///
/// Each outcome goes to the global `metrics` recorder (scraped on
/// `/metrics`) and to local atomics readable in-process.
#[derive(Debug, Default)]
pub struct DeliveryMetrics {
    sent: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryCounts {
    pub sent: u64,
    pub failed: u64,
}

impl DeliveryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register help text and zero values with the installed recorder.
    pub fn describe() {
        ::metrics::describe_counter!(MESSAGES_SENT_TOTAL, "Total WhatsApp messages sent");
        ::metrics::describe_counter!(
            MESSAGES_FAILED_TOTAL,
            "Total WhatsApp messages failed to send"
        );
        ::metrics::counter!(MESSAGES_SENT_TOTAL).increment(0);
        ::metrics::counter!(MESSAGES_FAILED_TOTAL).increment(0);
    }

    pub fn record(&self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Sent => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                ::metrics::counter!(MESSAGES_SENT_TOTAL).increment(1);
            }
            DeliveryOutcome::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                ::metrics::counter!(MESSAGES_FAILED_TOTAL).increment(1);
            }
        }
    }

    pub fn snapshot(&self) -> DeliveryCounts {
        DeliveryCounts {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
