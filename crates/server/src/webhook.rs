//! Messenger webhook surface: the GET verification handshake and the POST
//! message envelope.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use mercabot_core::UserId;

use crate::dispatch::{SubmitOutcome, UserDispatcher};

#[derive(Clone)]
pub struct WebhookState {
    pub dispatcher: Arc<UserDispatcher>,
    pub verify_token: String,
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route("/webhook", get(verify).post(receive)).with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

async fn verify(
    State(state): State<WebhookState>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    if params.verify_token.as_deref() == Some(state.verify_token.as_str()) {
        info!("webhook verification handshake accepted");
        (StatusCode::OK, params.challenge.unwrap_or_default())
    } else {
        warn!(mode = ?params.mode, "webhook verification token mismatch");
        (StatusCode::FORBIDDEN, "verification failed".to_string())
    }
}

/// Messenger event envelope: entries carry messaging events, each with a
/// sender and an optional text payload. Attachment-only events are
/// acknowledged and skipped.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Deserialize)]
pub struct MessagingEvent {
    pub sender: Sender,
    pub message: Option<InboundMessage>,
}

#[derive(Debug, Deserialize)]
pub struct Sender {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct InboundMessage {
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<serde_json::Value>,
}

async fn receive(
    State(state): State<WebhookState>,
    Json(envelope): Json<WebhookEnvelope>,
) -> impl IntoResponse {
    let mut accepted = 0u32;
    let mut dropped = 0u32;

    for entry in envelope.entry {
        for event in entry.messaging {
            let Some(message) = event.message else { continue };
            let Some(text) = message.text else {
                debug!(
                    sender = %event.sender.id,
                    attachments = message.attachments.len(),
                    "skipping non-text message"
                );
                continue;
            };

            match state.dispatcher.submit(UserId(event.sender.id), text).await {
                SubmitOutcome::Accepted => accepted += 1,
                SubmitOutcome::RateLimited => dropped += 1,
            }
        }
    }

    Json(json!({ "status": "success", "accepted": accepted, "dropped": dropped }))
}
