use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use super::session::{ChannelSession, ChannelState};
use super::{ChannelError, MessagingChannel};
use crate::config::ChannelConfig;
use crate::workflows::billing::phone::PhoneNumber;

/// Client for an HTTP bridge that owns the WhatsApp web session.
///
/// The gateway exposes:
/// - `POST sessions/{name}/start` and `POST sessions/{name}/stop`
/// - `GET sessions/{name}/status` returning [`GatewayStatus`]
/// - `POST messages` taking `{session, chat_id, text}`
#[derive(Clone)]
pub struct GatewayChannel {
    http: Client,
    base_url: Url,
    token: Option<String>,
    session_name: String,
    session: Arc<ChannelSession>,
}

impl fmt::Debug for GatewayChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayChannel")
            .field("base_url", &self.base_url)
            .field("session_name", &self.session_name)
            .field("state", &self.session.state().label())
            .finish_non_exhaustive()
    }
}

/// Status document published by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayStatus {
    pub status: GatewayStatusKind,
    #[serde(default)]
    pub qr: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatusKind {
    Starting,
    Qr,
    Authenticated,
    Ready,
    Disconnected,
}

impl GatewayChannel {
    pub fn new(config: &ChannelConfig) -> Result<Self, ChannelError> {
        Self::with_session(config, Arc::new(ChannelSession::new()))
    }

    pub fn with_session(
        config: &ChannelConfig,
        session: Arc<ChannelSession>,
    ) -> Result<Self, ChannelError> {
        let mut raw = config.gateway_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw).map_err(|_| ChannelError::InvalidUrl {
            url: config.gateway_url.clone(),
        })?;
        let http = Client::builder()
            .user_agent(concat!("kost-reminder/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            token: config.token.clone(),
            session_name: config.session.clone(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<ChannelSession> {
        &self.session
    }

    fn endpoint(&self, path: &str) -> Result<Url, ChannelError> {
        self.base_url
            .join(path)
            .map_err(|_| ChannelError::InvalidUrl {
                url: format!("{}{}", self.base_url, path),
            })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub fn build_send_request(
        &self,
        to: &PhoneNumber,
        body: &str,
    ) -> Result<reqwest::Request, ChannelError> {
        let endpoint = self.endpoint("messages")?;
        let payload = json!({
            "session": self.session_name,
            "chat_id": to.chat_id(),
            "text": body,
        });
        Ok(self.authorize(self.http.post(endpoint)).json(&payload).build()?)
    }

    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, ChannelError> {
        let response = self.http.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ChannelError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    /// Fetch the gateway status and fold it into the session.
    pub async fn refresh_status(&self) -> Result<ChannelState, ChannelError> {
        let endpoint = self.endpoint(&format!("sessions/{}/status", self.session_name))?;
        let request = self.authorize(self.http.get(endpoint)).build()?;
        let status: GatewayStatus = self.execute(request).await?.json().await?;
        self.apply_status(&status);
        Ok(self.session.state())
    }

    /// Map a gateway report onto the session state machine.
    pub fn apply_status(&self, status: &GatewayStatus) {
        let result = match status.status {
            GatewayStatusKind::Starting => Ok(()),
            GatewayStatusKind::Qr => {
                let code = status.qr.clone().unwrap_or_default();
                let fresh = self.session.pairing_code().as_deref() != Some(code.as_str());
                let result = self.session.begin_pairing(code.clone());
                if fresh && result.is_ok() {
                    info!(pairing_code = %code, "scan the pairing code with the WhatsApp phone");
                }
                result
            }
            GatewayStatusKind::Authenticated => {
                let result = self.session.mark_authenticated();
                if result.is_ok() {
                    info!("chat channel authenticated");
                }
                result
            }
            GatewayStatusKind::Ready => {
                if self.session.is_ready() {
                    Ok(())
                } else {
                    let result = self
                        .session
                        .mark_authenticated()
                        .and_then(|()| self.session.mark_ready());
                    if result.is_ok() {
                        info!("chat channel ready");
                    }
                    result
                }
            }
            GatewayStatusKind::Disconnected => {
                if !matches!(self.session.state(), ChannelState::Disconnected { .. }) {
                    let reason = status
                        .reason
                        .clone()
                        .unwrap_or_else(|| "gateway reported disconnect".to_string());
                    warn!(%reason, "chat channel disconnected; re-pairing required");
                    self.session.mark_disconnected(reason);
                }
                Ok(())
            }
        };

        if let Err(err) = result {
            warn!(%err, reported = ?status.status, "ignored gateway status report");
        }
    }

    /// Poll the gateway status until the task is aborted.
    pub fn spawn_status_watcher(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = self.refresh_status().await {
                    warn!(%err, "failed to refresh chat channel status");
                }
            }
        })
    }
}

#[async_trait]
impl MessagingChannel for GatewayChannel {
    #[instrument(skip_all, fields(session = %self.session_name))]
    async fn connect(&self) -> Result<(), ChannelError> {
        if matches!(self.session.state(), ChannelState::Disconnected { .. }) {
            self.session.reset()?;
        }
        let endpoint = self.endpoint(&format!("sessions/{}/start", self.session_name))?;
        let request = self.authorize(self.http.post(endpoint)).build()?;
        self.execute(request).await?;
        info!("chat channel session started");
        self.refresh_status().await?;
        Ok(())
    }

    fn state(&self) -> ChannelState {
        self.session.state()
    }

    async fn send_text(&self, to: &PhoneNumber, body: &str) -> Result<(), ChannelError> {
        let state = self.session.state();
        if !state.is_ready() {
            return Err(ChannelError::NotReady {
                state: state.label(),
            });
        }
        let request = self.build_send_request(to, body)?;
        self.execute(request).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ChannelError> {
        let endpoint = self.endpoint(&format!("sessions/{}/stop", self.session_name))?;
        let request = self.authorize(self.http.post(endpoint)).build()?;
        let result = self.execute(request).await;
        self.session.mark_disconnected("session stopped by operator");
        result.map(|_| ())
    }
}
