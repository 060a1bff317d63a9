use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use super::channel::{ChannelError, MessagingChannel};
use super::domain::DeliveryOutcome;
use super::metrics::DeliveryMetrics;
use super::phone::{PhoneError, PhoneNumber};
use crate::config::ChannelConfig;

/// Timeout and retry bounds for a single outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub send_timeout: Duration,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(15),
            max_attempts: 1,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl From<&ChannelConfig> for DispatchPolicy {
    fn from(config: &ChannelConfig) -> Self {
        Self {
            send_timeout: config.send_timeout,
            max_attempts: config.send_attempts.max(1),
            retry_backoff: config.retry_backoff,
        }
    }
}

/// What was handed to the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentMessage {
    pub number: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    InvalidNumber(#[from] PhoneError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Normalizes, sends and counts. Shared by the scheduled job and the ad hoc
/// HTTP path; every call records exactly one outcome.
pub struct MessageDispatcher<C> {
    channel: Arc<C>,
    metrics: Arc<DeliveryMetrics>,
    policy: DispatchPolicy,
}

impl<C> MessageDispatcher<C>
where
    C: MessagingChannel + 'static,
{
    pub fn new(channel: Arc<C>, metrics: Arc<DeliveryMetrics>, policy: DispatchPolicy) -> Self {
        Self {
            channel,
            metrics,
            policy,
        }
    }

    pub fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    pub fn metrics(&self) -> &Arc<DeliveryMetrics> {
        &self.metrics
    }

    pub async fn dispatch(
        &self,
        raw_number: &str,
        message: &str,
    ) -> Result<SentMessage, DispatchError> {
        let result = self.deliver(raw_number, message).await;
        let outcome = match &result {
            Ok(_) => DeliveryOutcome::Sent,
            Err(_) => DeliveryOutcome::Failed,
        };
        self.metrics.record(outcome);
        result
    }

    async fn deliver(&self, raw_number: &str, message: &str) -> Result<SentMessage, DispatchError> {
        let phone = PhoneNumber::normalize(raw_number)?;
        self.send_with_retry(&phone, message).await?;
        Ok(SentMessage {
            number: phone.into_string(),
            message: message.to_string(),
        })
    }

    async fn send_with_retry(&self, phone: &PhoneNumber, message: &str) -> Result<(), ChannelError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut backoff = self.policy.retry_backoff;
        let mut attempt = 1;

        loop {
            let result = match tokio::time::timeout(
                self.policy.send_timeout,
                self.channel.send_text(phone, message),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ChannelError::Timeout(self.policy.send_timeout)),
            };

            match result {
                Ok(()) => return Ok(()),
                Err(err) if attempt < max_attempts && err.is_retryable() => {
                    warn!(%err, %phone, attempt, ?backoff, "send failed; retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
