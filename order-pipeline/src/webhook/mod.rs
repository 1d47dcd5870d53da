//! Payment webhook ingestion
//!
//! Verifies the signature, classifies the event and hands completed
//! checkouts to the CreationQueue. Payment intent events are audited only.
//! Redelivered events are not deduplicated here.

pub mod api;

use std::sync::Arc;

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde_json::{Value, json};
use shared::error::{AppError, ErrorCode};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::audit_log;
use crate::queue::{OutgoingMessage, QueueError, TaskQueue};
use crate::stripe::{EventKind, EventParseError, SignatureError, SignatureVerifier, WebhookEvent};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("signature verification failed: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error(transparent)]
    MalformedEvent(#[from] EventParseError),

    #[error(transparent)]
    Publish(#[from] QueueError),
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            // Callers only ever see the two fixed messages for signature failures
            WebhookError::MissingSignature => AppError::new(ErrorCode::SignatureMissing),
            WebhookError::InvalidSignature(_) => AppError::new(ErrorCode::SignatureInvalid),
            WebhookError::MalformedEvent(e) => e.into(),
            WebhookError::Publish(e) => e.into(),
        }
    }
}

/// What a verified event led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// CreationMessage published
    Queued { message_id: String },
    /// Audit record only
    Recorded,
    /// Unhandled event type
    Ignored,
}

/// HTTP-shaped result of handling one delivery
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl WebhookResponse {
    fn received() -> Self {
        Self {
            status: StatusCode::OK,
            body: json!({ "received": true }),
        }
    }

    fn error(err: AppError) -> Self {
        let status = match err.http_status() {
            s if s.is_server_error() => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            body: serde_json::to_value(err.body()).unwrap_or_default(),
        }
    }
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub struct WebhookIngestor {
    verifier: SignatureVerifier,
    creation_queue: Arc<dyn TaskQueue>,
}

impl WebhookIngestor {
    pub fn new(verifier: SignatureVerifier, creation_queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            verifier,
            creation_queue,
        }
    }

    /// Handle one delivery: `200 {received:true}`, `400 {error}` for bad
    /// signatures or payloads, `500 {error}` when publishing fails
    pub async fn handle(&self, body: &[u8], signature: Option<&str>) -> WebhookResponse {
        match self.ingest(body, signature).await {
            Ok(_) => WebhookResponse::received(),
            Err(e) => {
                match &e {
                    WebhookError::MissingSignature => warn!("No Stripe signature found"),
                    WebhookError::InvalidSignature(reason) => {
                        warn!(reason = %reason, "Webhook signature verification failed")
                    }
                    WebhookError::MalformedEvent(reason) => {
                        warn!(reason = %reason, "Rejected malformed webhook event")
                    }
                    WebhookError::Publish(reason) => {
                        error!(reason = %reason, "Failed to publish creation message")
                    }
                }
                WebhookResponse::error(e.into())
            }
        }
    }

    pub async fn ingest(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<IngestOutcome, WebhookError> {
        let signature = signature
            .filter(|s| !s.trim().is_empty())
            .ok_or(WebhookError::MissingSignature)?;
        self.verifier.verify(body, signature)?;

        let event = WebhookEvent::parse(body)?;
        let kind = event.kind()?;
        info!(event_id = %event.id, event_type = %event.event_type, "Received Stripe webhook");

        let outcome = match kind {
            EventKind::CheckoutCompleted(session) => {
                let message = session.to_creation_message(&event.id, shared::util::now());
                let outgoing = OutgoingMessage::json(&message, message.attributes())?;
                let message_id = self.creation_queue.send(outgoing).await?;
                info!(
                    event_id = %event.id,
                    session_id = %session.id,
                    message_id = %message_id,
                    "Checkout completed, creation message queued"
                );
                IngestOutcome::Queued { message_id }
            }
            EventKind::PaymentSucceeded(intent) => {
                audit_log!(
                    "payment_succeeded",
                    event_id = %event.id,
                    payment_intent_id = %intent.id,
                    amount = intent.amount,
                    currency = %intent.currency,
                    status = %intent.status,
                    "PAYMENT_LOG"
                );
                IngestOutcome::Recorded
            }
            EventKind::PaymentFailed(intent) => {
                let reason = intent
                    .last_payment_error
                    .as_ref()
                    .and_then(|e| e.message.as_deref())
                    .unwrap_or("unknown");
                audit_log!(
                    "payment_failed",
                    event_id = %event.id,
                    payment_intent_id = %intent.id,
                    amount = intent.amount,
                    currency = %intent.currency,
                    status = %intent.status,
                    reason = %reason,
                    "PAYMENT_FAILED_LOG"
                );
                IngestOutcome::Recorded
            }
            EventKind::Unhandled => {
                info!(event_type = %event.event_type, "Unhandled event type");
                IngestOutcome::Ignored
            }
        };

        audit_log!(
            "webhook_event",
            event_id = %event.id,
            event_type = %event.event_type,
            object_id = event.object_id().unwrap_or_default(),
            amount = ?event.amount(),
            currency = event.currency().unwrap_or_default(),
            "EVENT_LOG"
        );

        Ok(outcome)
    }
}
