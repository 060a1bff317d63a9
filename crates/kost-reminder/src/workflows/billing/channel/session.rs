use std::sync::{PoisonError, RwLock};

use serde::Serialize;

use super::ChannelError;

/// Lifecycle of the single chat session a process holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChannelState {
    Uninitialized,
    AwaitingPairing { pairing_code: String },
    Authenticated,
    Ready,
    Disconnected { reason: String },
}

impl ChannelState {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::AwaitingPairing { .. } => "awaiting_pairing",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::Disconnected { .. } => "disconnected",
        }
    }

    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    fn allows(&self, next: &ChannelState) -> bool {
        use ChannelState::*;
        match (self, next) {
            (_, Disconnected { .. }) => true,
            (Uninitialized, AwaitingPairing { .. } | Authenticated) => true,
            (AwaitingPairing { .. }, AwaitingPairing { .. } | Authenticated) => true,
            (Authenticated, Ready) => true,
            (Disconnected { .. }, Uninitialized | AwaitingPairing { .. } | Authenticated) => true,
            _ => false,
        }
    }
}

/// Shared holder of the channel state; transitions are checked.
#[derive(Debug)]
pub struct ChannelSession {
    state: RwLock<ChannelState>,
}

impl Default for ChannelSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelSession {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ChannelState::Uninitialized),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_ready()
    }

    /// Pending pairing code, if the session waits for a scan.
    pub fn pairing_code(&self) -> Option<String> {
        match self.state() {
            ChannelState::AwaitingPairing { pairing_code } => Some(pairing_code),
            _ => None,
        }
    }

    pub fn begin_pairing(&self, pairing_code: impl Into<String>) -> Result<(), ChannelError> {
        self.transition(ChannelState::AwaitingPairing {
            pairing_code: pairing_code.into(),
        })
    }

    pub fn mark_authenticated(&self) -> Result<(), ChannelError> {
        self.transition(ChannelState::Authenticated)
    }

    pub fn mark_ready(&self) -> Result<(), ChannelError> {
        self.transition(ChannelState::Ready)
    }

    pub fn mark_disconnected(&self, reason: impl Into<String>) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = ChannelState::Disconnected {
            reason: reason.into(),
        };
    }

    /// Back to `Uninitialized` before reconnecting a dropped session.
    pub fn reset(&self) -> Result<(), ChannelError> {
        self.transition(ChannelState::Uninitialized)
    }

    /// Re-entering the current state is a no-op.
    fn transition(&self, next: ChannelState) -> Result<(), ChannelError> {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *guard == next {
            return Ok(());
        }
        if !guard.allows(&next) {
            return Err(ChannelError::InvalidTransition {
                from: guard.label(),
                to: next.label(),
            });
        }
        *guard = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_the_pairing_lifecycle() {
        let session = ChannelSession::new();
        assert_eq!(session.state(), ChannelState::Uninitialized);

        session.begin_pairing("2@abc").expect("pairing");
        assert_eq!(session.pairing_code().as_deref(), Some("2@abc"));
        session.begin_pairing("2@def").expect("refreshed code");
        assert_eq!(session.pairing_code().as_deref(), Some("2@def"));

        session.mark_authenticated().expect("authenticated");
        session.mark_ready().expect("ready");
        assert!(session.is_ready());
        assert!(session.pairing_code().is_none());
    }

    #[test]
    fn restored_session_skips_pairing() {
        let session = ChannelSession::new();
        session.mark_authenticated().expect("restored auth");
        session.mark_ready().expect("ready");
        assert!(session.is_ready());
    }

    #[test]
    fn cannot_become_ready_without_authentication() {
        let session = ChannelSession::new();
        match session.mark_ready() {
            Err(ChannelError::InvalidTransition { from, to }) => {
                assert_eq!(from, "uninitialized");
                assert_eq!(to, "ready");
            }
            other => panic!("expected invalid transition, got {other:?}"),
        }
        assert!(!session.is_ready());
    }

    #[test]
    fn repeated_ready_reports_are_idempotent() {
        let session = ChannelSession::new();
        session.mark_authenticated().expect("auth");
        session.mark_ready().expect("ready");
        session.mark_ready().expect("still ready");
        assert!(session.is_ready());
    }

    #[test]
    fn disconnect_requires_re_pairing() {
        let session = ChannelSession::new();
        session.mark_authenticated().expect("auth");
        session.mark_ready().expect("ready");
        session.mark_disconnected("phone logged out");

        assert_eq!(
            session.state(),
            ChannelState::Disconnected {
                reason: "phone logged out".to_string()
            }
        );
        assert!(session.mark_ready().is_err());
        session.begin_pairing("2@new").expect("re-pair");
        assert_eq!(session.state().label(), "awaiting_pairing");
    }

    #[test]
    fn state_serializes_with_tag() {
        let state = ChannelState::AwaitingPairing {
            pairing_code: "2@abc".to_string(),
        };
        let value = serde_json::to_value(&state).expect("serializes");
        assert_eq!(value["state"], "awaiting_pairing");
        assert_eq!(value["pairing_code"], "2@abc");
    }
}
