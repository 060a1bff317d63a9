use std::sync::Arc;
use std::time::Duration;

use super::common::*;
use crate::workflows::billing::channel::ChannelError;
use crate::workflows::billing::dispatcher::{DispatchError, DispatchPolicy, SentMessage};
use crate::workflows::billing::metrics::DeliveryCounts;
use crate::workflows::billing::phone::PhoneError;

#[tokio::test]
async fn dispatch_normalizes_before_sending() {
    let channel = Arc::new(RecordingChannel::ready());
    let dispatcher = dispatcher_with(Arc::clone(&channel), quick_policy());

    let sent = dispatcher
        .dispatch("0811-1111-1111", "hello")
        .await
        .expect("dispatch succeeds");

    assert_eq!(
        sent,
        SentMessage {
            number: "6281111111111".to_string(),
            message: "hello".to_string(),
        }
    );
    assert_eq!(
        channel.sent(),
        vec![("6281111111111@c.us".to_string(), "hello".to_string())]
    );
}

#[tokio::test]
async fn number_without_digits_counts_as_failure() {
    let channel = Arc::new(RecordingChannel::ready());
    let dispatcher = dispatcher_with(Arc::clone(&channel), quick_policy());

    let err = dispatcher
        .dispatch("n/a", "hello")
        .await
        .expect_err("no digits");

    assert!(matches!(
        err,
        DispatchError::InvalidNumber(PhoneError::NoDigits { .. })
    ));
    assert_eq!(channel.attempts(), 0);
    assert_eq!(
        dispatcher.metrics().snapshot(),
        DeliveryCounts { sent: 0, failed: 1 }
    );
}

#[tokio::test]
async fn transient_rejections_are_retried_within_budget() {
    let channel = Arc::new(RecordingChannel::ready().flaky(2));
    let policy = DispatchPolicy {
        max_attempts: 3,
        ..quick_policy()
    };
    let dispatcher = dispatcher_with(Arc::clone(&channel), policy);

    dispatcher
        .dispatch("081111111111", "hello")
        .await
        .expect("third attempt succeeds");

    assert_eq!(channel.attempts(), 3);
    assert_eq!(
        dispatcher.metrics().snapshot(),
        DeliveryCounts { sent: 1, failed: 0 }
    );
}

#[tokio::test]
async fn retry_budget_exhaustion_records_one_failure() {
    let channel = Arc::new(RecordingChannel::ready().flaky(5));
    let policy = DispatchPolicy {
        max_attempts: 2,
        ..quick_policy()
    };
    let dispatcher = dispatcher_with(Arc::clone(&channel), policy);

    let err = dispatcher
        .dispatch("081111111111", "hello")
        .await
        .expect_err("budget exhausted");

    assert!(matches!(
        err,
        DispatchError::Channel(ChannelError::Rejected { status: 503, .. })
    ));
    assert_eq!(channel.attempts(), 2);
    assert_eq!(
        dispatcher.metrics().snapshot(),
        DeliveryCounts { sent: 0, failed: 1 }
    );
}

#[tokio::test]
async fn not_ready_is_never_retried() {
    let channel = Arc::new(RecordingChannel::awaiting_pairing());
    let policy = DispatchPolicy {
        max_attempts: 3,
        ..quick_policy()
    };
    let dispatcher = dispatcher_with(Arc::clone(&channel), policy);

    let err = dispatcher
        .dispatch("081111111111", "hello")
        .await
        .expect_err("channel not ready");

    assert!(matches!(
        err,
        DispatchError::Channel(ChannelError::NotReady {
            state: "awaiting_pairing"
        })
    ));
    assert_eq!(channel.attempts(), 1);
}

#[tokio::test]
async fn slow_send_times_out() {
    let channel = Arc::new(RecordingChannel::ready().slow(Duration::from_millis(500)));
    let policy = DispatchPolicy {
        send_timeout: Duration::from_millis(20),
        ..quick_policy()
    };
    let dispatcher = dispatcher_with(Arc::clone(&channel), policy);

    let err = dispatcher
        .dispatch("081111111111", "hello")
        .await
        .expect_err("timed out");

    assert!(matches!(
        err,
        DispatchError::Channel(ChannelError::Timeout(_))
    ));
    assert!(channel.sent().is_empty());
    assert_eq!(dispatcher.metrics().snapshot().failed, 1);
}
