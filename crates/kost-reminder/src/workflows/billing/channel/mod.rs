//! Outbound chat channel: session state machine and the gateway client.

mod gateway;
mod session;

use std::time::Duration;

use async_trait::async_trait;

use super::phone::PhoneNumber;

pub use gateway::{GatewayChannel, GatewayStatus, GatewayStatusKind};
pub use session::{ChannelSession, ChannelState};

/// A paired chat session able to deliver text messages.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    /// Start (or resume) the session; pairing may still be pending afterwards.
    async fn connect(&self) -> Result<(), ChannelError>;

    fn state(&self) -> ChannelState;

    fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Fails fast with [`ChannelError::NotReady`] outside the ready state.
    async fn send_text(&self, to: &PhoneNumber, body: &str) -> Result<(), ChannelError>;

    async fn disconnect(&self) -> Result<(), ChannelError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel not ready (state: {state})")]
    NotReady { state: &'static str },
    #[error("invalid channel transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
    #[error("invalid gateway url '{url}'")]
    InvalidUrl { url: String },
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

impl ChannelError {
    /// Transient failures worth another attempt; a session that is not ready
    /// never is.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChannelError::Transport(_) | ChannelError::Timeout(_) => true,
            ChannelError::Rejected { status, .. } => *status >= 500,
            ChannelError::NotReady { .. }
            | ChannelError::InvalidTransition { .. }
            | ChannelError::InvalidUrl { .. } => false,
        }
    }
}
