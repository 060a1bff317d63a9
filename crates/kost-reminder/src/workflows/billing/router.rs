use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::error::AppError;

use super::channel::MessagingChannel;
use super::dispatcher::MessageDispatcher;
use super::inbound::auto_reply;
use super::job::{BillingReminderJob, RunSummary};
use super::ledger::TenantLedger;
use super::phone::PhoneNumber;
use super::schedule::DailySchedule;

/// Everything the billing endpoints share with the scheduled run.
pub struct BillingState<L, C> {
    pub job: Arc<BillingReminderJob<L, C>>,
    pub dispatcher: Arc<MessageDispatcher<C>>,
    pub schedule: DailySchedule,
}

#[derive(Debug, Default, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunRemindersRequest {
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    pub body: String,
}

/// Router builder exposing the ad hoc send, manual run and channel endpoints.
pub fn billing_router<L, C>(state: Arc<BillingState<L, C>>) -> Router
where
    L: TenantLedger + 'static,
    C: MessagingChannel + 'static,
{
    Router::new()
        .route("/api/send-message", post(send_message_handler::<L, C>))
        .route("/api/reminders/run", post(run_reminders_handler::<L, C>))
        .route("/api/channel/status", get(channel_status_handler::<L, C>))
        .route("/api/webhook/inbound", post(inbound_handler::<L, C>))
        .with_state(state)
}

fn required_fields_missing() -> Response {
    let payload = json!({
        "success": false,
        "message": "Number and message are required",
    });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}

/// Any body that does not yield a non-empty `number` and `message` string,
/// whatever its content type, is answered with the same JSON 400.
pub(crate) async fn send_message_handler<L, C>(
    State(state): State<Arc<BillingState<L, C>>>,
    body: Bytes,
) -> Response
where
    L: TenantLedger + 'static,
    C: MessagingChannel + 'static,
{
    let Ok(request) = serde_json::from_slice::<SendMessageRequest>(&body) else {
        return required_fields_missing();
    };
    let present = |value: Option<String>| value.filter(|value| !value.is_empty());
    let (Some(number), Some(message)) = (present(request.number), present(request.message))
    else {
        return required_fields_missing();
    };

    match state.dispatcher.dispatch(&number, &message).await {
        Ok(sent) => {
            info!(number = %sent.number, "ad hoc message sent");
            let payload = json!({
                "success": true,
                "message": "Message sent successfully",
                "data": sent,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => {
            error!(%number, %err, "ad hoc message failed");
            let payload = json!({
                "success": false,
                "message": "Failed to send message",
                "error": err.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

/// Body is optional; `{"today": "YYYY-MM-DD"}` pins the evaluation day.
pub(crate) async fn run_reminders_handler<L, C>(
    State(state): State<Arc<BillingState<L, C>>>,
    body: Bytes,
) -> Result<axum::Json<RunSummary>, AppError>
where
    L: TenantLedger + 'static,
    C: MessagingChannel + 'static,
{
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RunRemindersRequest::default()
    } else {
        serde_json::from_slice::<RunRemindersRequest>(&body)
            .map_err(|err| AppError::InvalidRequest(err.to_string()))?
    };

    let today = request
        .today
        .unwrap_or_else(|| state.schedule.local_date(Utc::now()));

    Ok(axum::Json(state.job.run(today).await?))
}

pub(crate) async fn channel_status_handler<L, C>(
    State(state): State<Arc<BillingState<L, C>>>,
) -> Response
where
    L: TenantLedger + 'static,
    C: MessagingChannel + 'static,
{
    let channel = state.dispatcher.channel().state();
    let payload = json!({
        "ready": channel.is_ready(),
        "channel": channel,
        "deliveries": state.dispatcher.metrics().snapshot(),
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

/// Gateway webhook for incoming chat messages.
pub(crate) async fn inbound_handler<L, C>(
    State(state): State<Arc<BillingState<L, C>>>,
    axum::Json(inbound): axum::Json<InboundMessage>,
) -> Response
where
    L: TenantLedger + 'static,
    C: MessagingChannel + 'static,
{
    let Some(reply) = auto_reply(&inbound.body) else {
        return (StatusCode::OK, axum::Json(json!({ "replied": false }))).into_response();
    };

    let sender = inbound.from.split('@').next().unwrap_or_default();
    let result = match PhoneNumber::normalize(sender) {
        Ok(phone) => state
            .dispatcher
            .channel()
            .send_text(&phone, reply)
            .await
            .map_err(|err| err.to_string()),
        Err(err) => Err(err.to_string()),
    };

    match result {
        Ok(()) => (StatusCode::OK, axum::Json(json!({ "replied": true }))).into_response(),
        Err(err) => {
            warn!(from = %inbound.from, %err, "failed to answer inbound message");
            let payload = json!({ "replied": false, "error": err });
            (StatusCode::BAD_GATEWAY, axum::Json(payload)).into_response()
        }
    }
}
